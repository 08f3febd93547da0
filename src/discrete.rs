//! Discretization of GLT expressions and evaluation of their symbols.
use crate::ast::GeneratedModule;
use crate::cache::{Artifact, ArtifactCache, ContentTag};
use crate::error::{ArgumentMismatch, BackendError, ConstructionError, GltError, RuntimeError};
use crate::evaluation::{ArraySubKernels, MappingInfo, SubKernelProvider};
use crate::interface::{GltInterface, InterfaceRole};
use crate::kernel::{output_name, physical_coordinate_name, GltKernel, KernelSettings};
use crate::printer::print_module;
use crate::runtime::{CompiledModule, Interpreter, NdArray, Toolchain, Value};
use glt_splines::{CollocationBasisValues, DiscreteDomain, FemField, SplineMapping, SplineSpace};
use glt_symbolic::{GltEngine, GltExpr, MappingDecl, SymbolicEngine};
use log::info;
use nalgebra::DMatrix;
use num::complex::Complex64;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Collaborators and settings used to turn GLT expressions into callable routines.
///
/// A cache should only be shared between discretizations using the same engine, provider and
/// toolchain, since these are not part of the content tag.
#[derive(Clone)]
pub struct Discretization {
    engine: Arc<dyn SymbolicEngine>,
    provider: Arc<dyn SubKernelProvider>,
    toolchain: Arc<dyn Toolchain>,
    cache: Arc<ArtifactCache>,
    settings: KernelSettings,
}

impl Default for Discretization {
    fn default() -> Self {
        Self {
            engine: Arc::new(GltEngine),
            provider: Arc::new(ArraySubKernels),
            toolchain: Arc::new(Interpreter),
            cache: Arc::new(ArtifactCache::new()),
            settings: KernelSettings::default(),
        }
    }
}

impl std::fmt::Debug for Discretization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discretization")
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Identity of a space as far as generated code is concerned.
fn space_key(space: &SplineSpace) -> (String, Vec<usize>, Vec<usize>) {
    (space.name().to_string(), space.degree(), space.ncells())
}

impl Discretization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: Arc<dyn SymbolicEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn SubKernelProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_toolchain(mut self, toolchain: Arc<dyn Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ArtifactCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_settings(mut self, settings: KernelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Generates, compiles and caches the routines evaluating the symbol of `expr` on `domain`
    /// discretized with the test and trial spaces `spaces`.
    pub fn discretize(
        &self,
        expr: &GltExpr,
        domain: &DiscreteDomain,
        spaces: (Arc<SplineSpace>, Arc<SplineSpace>),
    ) -> Result<DiscreteGltExpr, GltError> {
        if domain.ldim() != expr.ldim() {
            return Err(ConstructionError::Unsupported {
                reason: format!(
                    "{}-dimensional expression on a {}-dimensional domain",
                    expr.ldim(),
                    domain.ldim()
                ),
            }
            .into());
        }
        let mapping = domain.mapping().map(|mapping| MappingInfo {
            decl: MappingDecl::new(mapping.name(), mapping.ldim()),
            is_rational: mapping.is_rational(),
        });

        let tag = ContentTag::of(&(
            expr,
            space_key(&spaces.0),
            space_key(&spaces.1),
            &mapping,
            &self.settings,
        ));
        let artifact = self
            .cache
            .get_or_try_insert_with(&tag, || self.build(&tag, expr, spaces.clone(), mapping.as_ref()))?;

        Ok(DiscreteGltExpr {
            expr: expr.clone(),
            mapping: domain.mapping().cloned(),
            spaces,
            artifact,
        })
    }

    fn build(
        &self,
        tag: &ContentTag,
        expr: &GltExpr,
        spaces: (Arc<SplineSpace>, Arc<SplineSpace>),
        mapping: Option<&MappingInfo>,
    ) -> Result<Artifact, GltError> {
        let settings = &self.settings;
        let kernel = Arc::new(GltKernel::build(
            tag.as_str(),
            expr,
            spaces,
            mapping,
            settings,
            self.engine.as_ref(),
            self.provider.as_ref(),
        )?);
        let interface = GltInterface::build(Arc::clone(&kernel), settings);

        let mut functions = kernel.functions();
        functions.push(interface.func().clone());
        let module = GeneratedModule {
            name: format!("glt_{}", tag),
            functions,
        };
        let source = print_module(&module);
        let compiled = self
            .toolchain
            .compile(&module, &source, &settings.backend)
            .map_err(|report| BackendError {
                backend: settings.backend.name.clone(),
                report,
            })?;
        info!(
            "Compiled module {} with {} routines for backend {}",
            module.name,
            module.functions.len(),
            settings.backend.name
        );

        Ok(Artifact {
            tag: tag.clone(),
            kernel,
            interface,
            module,
            source,
            compiled,
        })
    }
}

/// Named arguments of [`DiscreteGltExpr::evaluate`].
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: FxHashMap<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_field(self, name: impl Into<String>, field: FemField) -> Self {
        self.with_value(name, Value::object(field))
    }

    pub fn with_constant(self, name: impl Into<String>, value: f64) -> Self {
        self.with_value(name, Value::Real(value))
    }

    /// Physical coordinates along the given axis.
    pub fn with_coordinates(self, axis: usize, coordinates: Vec<f64>) -> Self {
        let len = coordinates.len();
        self.with_value(
            physical_coordinate_name(axis),
            Value::array(NdArray::from_real(&[len], coordinates)),
        )
    }

    /// An output buffer for the cell `(row, col)` of the symbol, updated in place.
    pub fn with_output(self, row: usize, col: usize, buffer: Rc<RefCell<NdArray>>) -> Self {
        self.with_value(output_name(row, col), Value::Array(buffer))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Values of a symbol on a grid, one buffer per cell.
#[derive(Debug, Clone)]
pub struct GltOutput {
    rows: usize,
    cols: usize,
    cells: Vec<Rc<RefCell<NdArray>>>,
}

impl GltOutput {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// The buffer of cell `(row, col)`, shared with the routine that filled it.
    pub fn buffer(&self, row: usize, col: usize) -> &Rc<RefCell<NdArray>> {
        &self.cells[row * self.cols + col]
    }

    pub fn cell(&self, row: usize, col: usize) -> NdArray {
        self.buffer(row, col).borrow().clone()
    }

    /// Value of cell `(row, col)` at the given grid point.
    pub fn value(&self, row: usize, col: usize, point: &[usize]) -> Result<Complex64, RuntimeError> {
        let value = self.buffer(row, col).borrow().get(point)?;
        value.as_complex().ok_or(RuntimeError::TypeMismatch {
            expected: "number".to_string(),
            found: value.type_name(),
        })
    }

    /// The symbol matrix at the given grid point.
    pub fn to_dmatrix(&self, point: &[usize]) -> Result<DMatrix<Complex64>, RuntimeError> {
        let mut matrix = DMatrix::zeros(self.rows, self.cols);
        for i in 0..self.rows {
            for j in 0..self.cols {
                matrix[(i, j)] = self.value(i, j, point)?;
            }
        }
        Ok(matrix)
    }
}

/// A GLT expression discretized on a domain, ready to be evaluated.
#[derive(Debug, Clone)]
pub struct DiscreteGltExpr {
    expr: GltExpr,
    mapping: Option<Arc<SplineMapping>>,
    spaces: (Arc<SplineSpace>, Arc<SplineSpace>),
    artifact: Arc<Artifact>,
}

impl DiscreteGltExpr {
    /// Discretizes with the default collaborators and a private cache.
    pub fn new(
        expr: &GltExpr,
        domain: &DiscreteDomain,
        spaces: (Arc<SplineSpace>, Arc<SplineSpace>),
        settings: KernelSettings,
    ) -> Result<Self, GltError> {
        Discretization::default()
            .with_settings(settings)
            .discretize(expr, domain, spaces)
    }

    pub fn expr(&self) -> &GltExpr {
        &self.expr
    }

    pub fn spaces(&self) -> &(Arc<SplineSpace>, Arc<SplineSpace>) {
        &self.spaces
    }

    pub fn kernel(&self) -> &Arc<GltKernel> {
        &self.artifact.kernel
    }

    pub fn interface(&self) -> &GltInterface {
        &self.artifact.interface
    }

    pub fn module(&self) -> &GeneratedModule {
        &self.artifact.module
    }

    pub fn source(&self) -> &str {
        &self.artifact.source
    }

    pub fn artifact(&self) -> &Arc<Artifact> {
        &self.artifact
    }

    pub fn compiled(&self) -> &Arc<dyn CompiledModule> {
        &self.artifact.compiled
    }

    /// Evaluates the symbol on the tensor grid of the frequencies `t`.
    ///
    /// Constants, physical coordinates and fields must be supplied in `arguments`; output
    /// buffers may be supplied and are allocated otherwise. Other entries are ignored.
    pub fn evaluate(&self, t: &[Vec<f64>], arguments: Arguments) -> Result<GltOutput, GltError> {
        let kernel = self.kernel();
        let interface = self.interface();
        if t.len() != kernel.ldim() {
            return Err(ArgumentMismatch::WrongCoordinateCount {
                expected: kernel.ldim(),
                found: t.len(),
            }
            .into());
        }

        let trial_space = &self.spaces.1;
        let mut values = Vec::with_capacity(interface.arguments().len());
        for argument in interface.arguments() {
            let name = argument.name();
            let value = match argument.role {
                InterfaceRole::Coordinate => {
                    let axis = values.len();
                    Value::array(NdArray::from_real(&[t[axis].len()], t[axis].clone()))
                }
                InterfaceRole::Space => Value::object(Arc::clone(trial_space)),
                InterfaceRole::BasisValues => {
                    let grid: Vec<&[f64]> = t.iter().map(Vec::as_slice).collect();
                    Value::object(CollocationBasisValues::new(&grid, trial_space, kernel.max_nderiv()))
                }
                InterfaceRole::Mapping => match &self.mapping {
                    Some(mapping) => Value::object(Arc::clone(mapping)),
                    None => return Err(ArgumentMismatch::Missing { name: name.to_string() }.into()),
                },
                InterfaceRole::Constant | InterfaceRole::PhysicalCoordinate | InterfaceRole::Field => arguments
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ArgumentMismatch::Missing { name: name.to_string() })?,
                InterfaceRole::Output => arguments.get(name).cloned().unwrap_or(Value::None),
            };
            values.push(value);
        }

        let result = self.compiled().call(interface.name(), values)?;
        let (rows, cols) = kernel.shape();
        let buffers = match result {
            Value::Tuple(items) => items,
            single => vec![single],
        };
        let cells = buffers
            .into_iter()
            .map(|buffer| match buffer {
                Value::Array(array) => Ok(array),
                other => Err(RuntimeError::TypeMismatch {
                    expected: "array".to_string(),
                    found: other.type_name(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GltOutput { rows, cols, cells })
    }
}
