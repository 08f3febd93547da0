//! Construction of GLT kernels.
//!
//! A kernel evaluates the reduced symbol of a bilinear form on a tensor grid of frequencies. It
//! works on flat numeric buffers only: coordinates, degrees and basis tables, coefficient arrays
//! of fields and mapping, one output buffer per cell of the symbol and the constants.
use crate::ast::{Argument, CodeExpr, Dtype, FunctionDef, Import, Stmt, Variable};
use crate::backend::BackendConfig;
use crate::error::ConstructionError;
use crate::evaluation::{grid_variables, FieldGroup, MappingInfo, SubKernel, SubKernelKind, SubKernelProvider};
use crate::evaluation::WEIGHTS_LABEL;
use crate::interface::{BASIS_VALUES_ARGUMENT, MAPPING_ARGUMENT, SPACE_ARGUMENT};
use crate::lowering::{lower, DET_JACOBIAN_NAME};
use glt_splines::SplineSpace;
use glt_symbolic::{
    AtomKind, DiscretizationParams, Expr, FieldAtom, GltExpr, GltSymbol, MathFunction, SymbolicEngine,
    FREQUENCY_SYMBOLS, SPACE_SYMBOLS,
};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelSettings {
    /// Add to the output buffers instead of overwriting them.
    #[serde(default)]
    pub accumulate: bool,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// A unit of generated code.
pub trait CodegenUnit: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn func(&self) -> &FunctionDef;

    /// Short description of the kind of unit, e.g. `kernel`.
    fn kind(&self) -> &'static str;

    fn into_kernel(self: Arc<Self>) -> Option<Arc<GltKernel>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentRole {
    Coordinate,
    PhysicalCoordinate,
    Degree,
    Spans,
    Basis,
    FieldCoeffs,
    MappingCoeffs,
    Output,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelArgument {
    pub variable: Variable,
    pub role: ArgumentRole,
    /// The field whose coefficients the argument holds.
    pub field: Option<String>,
}

/// Names the generated routines use for their own purposes.
const RESERVED_NAMES: &[&str] = &[
    "zeros", "len", "range", "float", "complex", "int", "None", "True", "False", "and", "or", "not", "is", "in",
    "if", "else", "for", "def", "return", "pass", "lambda", "import", "from",
];

/// Prefixes and suffixes of the argument, local and routine names of generated code.
const RESERVED_PREFIXES: &[&str] = &[
    "arr_", "coeff_", "c_", "spans_", "basis_", "symbol_", "kernel_", "eval_", "interface_",
];
const RESERVED_SUFFIX: &str = "_values";

/// Whether `name` can name a field or constant of a kernel.
///
/// Rejected are non-identifiers, the loop, length, degree and coordinate variables (`i1`, `k2`,
/// `p1`, `t3`, `x1`, ...), names of the coefficient and value families, derivative labels such as
/// `F_s1` and the remaining identifiers of the generated routines.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let identifier = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !identifier {
        return false;
    }

    let mut chars = name.chars();
    let indexed = matches!(chars.next(), Some('t' | 'x' | 'k' | 'i' | 'j' | 'p'))
        && !chars.as_str().is_empty()
        && chars.all(|c| c.is_ascii_digit());
    let derivative_label = name.split('_').skip(1).any(|segment| {
        segment.strip_prefix('s').map_or(false, |rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    });
    let reserved = RESERVED_NAMES.contains(&name)
        || [WEIGHTS_LABEL, DET_JACOBIAN_NAME, SPACE_ARGUMENT, BASIS_VALUES_ARGUMENT, MAPPING_ARGUMENT].contains(&name)
        || MathFunction::all().iter().any(|f| f.name() == name)
        || RESERVED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        || name.ends_with(RESERVED_SUFFIX);
    !(indexed || derivative_label || reserved)
}

pub fn coordinate_name(axis: usize) -> String {
    format!("arr_t{}", axis + 1)
}

pub fn physical_coordinate_name(axis: usize) -> String {
    format!("arr_x{}", axis + 1)
}

pub fn output_name(row: usize, col: usize) -> String {
    format!("symbol_{}{}", row + 1, col + 1)
}

fn length_name(axis: usize) -> String {
    format!("k{}", axis + 1)
}

fn index_name(axis: usize) -> String {
    format!("i{}", axis + 1)
}

/// Prelude binding `k<axis> = len(<arrays[axis]>)` for every axis.
pub(crate) fn length_prelude(ldim: usize) -> Vec<Stmt> {
    (0..ldim)
        .map(|k| {
            Stmt::assign(
                CodeExpr::var(length_name(k)),
                CodeExpr::Len(Box::new(CodeExpr::var(coordinate_name(k)))),
            )
        })
        .collect()
}

/// The shape `(k1, ..., kd)` of a grid.
pub(crate) fn grid_shape(ldim: usize) -> Vec<CodeExpr> {
    (0..ldim).map(|k| CodeExpr::var(length_name(k))).collect()
}

/// Coordinate symbols of the reduced symbol and their names in generated code.
fn renames() -> Vec<(&'static str, &'static str)> {
    let frequencies = FREQUENCY_SYMBOLS.iter().zip(["t1", "t2", "t3"]);
    let coordinates = SPACE_SYMBOLS.iter().zip(["x1", "x2", "x3"]);
    frequencies
        .chain(coordinates)
        .map(|(old, new)| (*old, new))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GltKernel {
    tag: String,
    expr: GltExpr,
    spaces: (Arc<SplineSpace>, Arc<SplineSpace>),
    mapping: Option<MappingInfo>,
    symbol: GltSymbol,
    dtypes: Vec<Dtype>,
    sub_kernels: Vec<SubKernel>,
    arguments: Vec<KernelArgument>,
    max_nderiv: usize,
    constants: Vec<String>,
    func: FunctionDef,
}

impl GltKernel {
    /// Builds the kernel `kernel_<tag>` evaluating the symbol of `expr`.
    ///
    /// The symbol is reduced with the element counts and degrees of the test space `spaces.0`.
    pub fn build(
        tag: &str,
        expr: &GltExpr,
        spaces: (Arc<SplineSpace>, Arc<SplineSpace>),
        mapping: Option<&MappingInfo>,
        settings: &KernelSettings,
        engine: &dyn SymbolicEngine,
        provider: &dyn SubKernelProvider,
    ) -> Result<Self, ConstructionError> {
        let ldim = expr.ldim();
        let test_space = &spaces.0;
        let params = DiscretizationParams::new(&test_space.ncells(), &test_space.degree());
        let symbol = engine.reduce(expr, &params, mapping.map(|m| &m.decl))?;

        let form = expr.form();
        let expected = (form.test_components(), form.trial_components());
        if symbol.shape() != expected {
            return Err(ConstructionError::MalformedShape {
                expected,
                found: symbol.shape(),
            });
        }

        let renames = renames();
        let symbol = symbol.map(|entry| entry.rename_symbols(&renames));
        let entries = symbol.entries();
        let dtypes: Vec<Dtype> = entries
            .iter()
            .map(|e| {
                if engine.atoms(e, &[AtomKind::ImaginaryUnit]).is_empty() {
                    Dtype::Real
                } else {
                    Dtype::Complex
                }
            })
            .collect();

        let scan = |kinds: &[AtomKind]| -> BTreeSet<Expr> {
            entries.iter().flat_map(|e| engine.atoms(e, kinds)).collect()
        };
        let symbols: BTreeSet<String> = scan(&[AtomKind::Symbol])
            .into_iter()
            .filter_map(|e| match e {
                Expr::Symbol(name) => Some(name),
                _ => None,
            })
            .collect();
        let physical_coordinates: Vec<String> = (1..=ldim)
            .map(|k| format!("x{}", k))
            .filter(|x| symbols.contains(x))
            .collect();
        let constants: Vec<String> = scan(&[AtomKind::Constant])
            .into_iter()
            .filter_map(|e| match e {
                Expr::Constant(name) => Some(name),
                _ => None,
            })
            .collect();
        if let Some(name) = constants.iter().find(|c| !is_valid_name(c)) {
            return Err(ConstructionError::ReservedName { name: name.clone() });
        }
        let uses_det = !scan(&[AtomKind::DetJacobian]).is_empty();
        let uses_mapping = !scan(&[AtomKind::Mapping]).is_empty() || uses_det;

        let mut groups: BTreeMap<String, BTreeSet<FieldAtom>> = BTreeMap::new();
        for atom in scan(&[AtomKind::Field]) {
            if let Expr::Field(atom) = atom {
                if !is_valid_name(atom.name()) {
                    return Err(ConstructionError::ReservedName {
                        name: atom.name().to_string(),
                    });
                }
                let space = expr
                    .field_space(atom.name())
                    .ok_or_else(|| ConstructionError::DependencyResolution {
                        field: atom.name().to_string(),
                    })?;
                groups.entry(space.to_string()).or_default().insert(atom);
            }
        }

        // With a mapping, physical coordinates are the values of the mapping
        let mapping = match mapping {
            Some(mapping) if uses_mapping || !physical_coordinates.is_empty() => Some(mapping),
            None if uses_mapping => {
                return Err(ConstructionError::Unsupported {
                    reason: "mapping atoms in the symbol of an unmapped domain".to_string(),
                })
            }
            _ => None,
        };

        let max_nderiv = entries
            .iter()
            .map(|e| engine.max_derivative_order(e))
            .max()
            .unwrap_or(0)
            .max(1);

        let backend = &settings.backend;
        let mut sub_kernels = Vec::new();
        if let Some(mapping) = mapping {
            let name = format!("eval_mapping_{}", tag);
            sub_kernels.push(provider.mapping(mapping, max_nderiv, &name, backend)?);
        }
        let mut field_names = Vec::new();
        for (k, (space, atoms)) in groups.into_iter().enumerate() {
            let group = FieldGroup {
                space,
                atoms: atoms.into_iter().collect(),
            };
            let name = format!("eval_field_{}_{}", tag, k);
            let sub_kernel = provider.field(&group, ldim, &name, backend)?;
            let fields = group.fields();
            if sub_kernel.coeffs().len() != fields.len() {
                return Err(ConstructionError::Unsupported {
                    reason: format!(
                        "sub-kernel {} takes {} coefficient arrays for {} fields",
                        name,
                        sub_kernel.coeffs().len(),
                        fields.len()
                    ),
                });
            }
            sub_kernels.push(sub_kernel);
            field_names.push(fields);
        }

        let arguments = Self::signature(
            ldim,
            mapping.is_none() && !physical_coordinates.is_empty(),
            &sub_kernels,
            &field_names,
            &symbol,
            &dtypes,
            &constants,
        );
        let name = format!("kernel_{}", tag);
        let body = Self::body(
            ldim,
            mapping.is_none() && !physical_coordinates.is_empty(),
            &arguments,
            &sub_kernels,
            &symbol,
            mapping.filter(|_| uses_det),
            settings,
        );

        let mut imports = Vec::new();
        if !sub_kernels.is_empty() {
            imports.push(Import::new("numpy", "zeros"));
        }
        let functions: BTreeSet<_> = entries.iter().flat_map(|e| engine.math_functions(e)).collect();
        imports.extend(functions.iter().map(|f| Import::new("numpy", f.name())));
        imports.extend(backend.kind.imports());

        let declared: Vec<Argument> = arguments
            .iter()
            .map(|a| Argument::required(a.variable.clone()))
            .collect();
        let func = FunctionDef {
            metadata: backend.kind.metadata(&name, &declared),
            name,
            arguments: declared,
            body,
            imports,
        };
        debug!(
            "Built kernel {} with {} arguments and {} sub-kernels",
            func.name,
            func.arguments.len(),
            sub_kernels.len()
        );

        Ok(Self {
            tag: tag.to_string(),
            expr: expr.clone(),
            spaces,
            mapping: mapping.cloned(),
            symbol,
            dtypes,
            sub_kernels,
            arguments,
            max_nderiv,
            constants,
            func,
        })
    }

    /// `field_names[k]` names the fields whose coefficients the `k`-th field sub-kernel takes.
    fn signature(
        ldim: usize,
        physical_coordinates: bool,
        sub_kernels: &[SubKernel],
        field_names: &[Vec<String>],
        symbol: &GltSymbol,
        dtypes: &[Dtype],
        constants: &[String],
    ) -> Vec<KernelArgument> {
        let argument = |variable, role| KernelArgument {
            variable,
            role,
            field: None,
        };
        let mut arguments: Vec<KernelArgument> = (0..ldim)
            .map(|k| argument(Variable::new(coordinate_name(k), Dtype::Real, 1), ArgumentRole::Coordinate))
            .collect();
        if physical_coordinates {
            arguments.extend((0..ldim).map(|k| {
                argument(
                    Variable::new(physical_coordinate_name(k), Dtype::Real, 1),
                    ArgumentRole::PhysicalCoordinate,
                )
            }));
        }
        if !sub_kernels.is_empty() {
            arguments.extend(grid_variables(ldim).into_iter().map(|v| {
                let role = match v.rank {
                    0 => ArgumentRole::Degree,
                    1 => ArgumentRole::Spans,
                    _ => ArgumentRole::Basis,
                };
                argument(v, role)
            }));
        }
        let of_kind = |kind: SubKernelKind| sub_kernels.iter().filter(move |s| s.kind() == kind);
        for (sub_kernel, fields) in of_kind(SubKernelKind::Field).zip(field_names) {
            arguments.extend(sub_kernel.coeffs().iter().zip(fields).map(|(v, field)| KernelArgument {
                variable: v.clone(),
                role: ArgumentRole::FieldCoeffs,
                field: Some(field.clone()),
            }));
        }
        arguments.extend(
            of_kind(SubKernelKind::Mapping)
                .flat_map(|s| s.coeffs().iter().cloned())
                .map(|v| argument(v, ArgumentRole::MappingCoeffs)),
        );

        let (rows, cols) = symbol.shape();
        arguments.extend(
            (0..rows)
                .cartesian_product(0..cols)
                .zip(dtypes)
                .map(|((i, j), dtype)| argument(Variable::new(output_name(i, j), *dtype, ldim), ArgumentRole::Output)),
        );
        arguments.extend(
            constants
                .iter()
                .map(|c| argument(Variable::scalar(c.clone(), Dtype::Real), ArgumentRole::Constant)),
        );
        arguments
    }

    fn body(
        ldim: usize,
        physical_coordinates: bool,
        arguments: &[KernelArgument],
        sub_kernels: &[SubKernel],
        symbol: &GltSymbol,
        det_mapping: Option<&MappingInfo>,
        settings: &KernelSettings,
    ) -> Vec<Stmt> {
        let outputs: Vec<&Variable> = arguments
            .iter()
            .filter(|a| a.role == ArgumentRole::Output)
            .map(|a| &a.variable)
            .collect();

        let mut body = length_prelude(ldim);
        if !settings.accumulate {
            body.extend(
                outputs
                    .iter()
                    .map(|v| Stmt::assign(v.expr().full_slice(ldim), CodeExpr::real(0.0))),
            );
        }
        for values in sub_kernels.iter().flat_map(SubKernel::values) {
            let zeros = CodeExpr::Zeros {
                shape: grid_shape(ldim),
                dtype: values.dtype,
            };
            body.push(Stmt::assign(values.expr(), zeros));
        }
        body.extend(sub_kernels.iter().map(SubKernel::call));

        let indices: Vec<String> = (0..ldim).map(index_name).collect();
        let mut point = Vec::new();
        for axis in 0..ldim {
            let at = &indices[axis..=axis];
            if physical_coordinates {
                let arr_x = Variable::new(physical_coordinate_name(axis), Dtype::Real, 1);
                point.push(Stmt::assign(CodeExpr::var(format!("x{}", axis + 1)), arr_x.at(at)));
            }
            let arr_t = Variable::new(coordinate_name(axis), Dtype::Real, 1);
            point.push(Stmt::assign(CodeExpr::var(format!("t{}", axis + 1)), arr_t.at(at)));
        }
        for sub_kernel in sub_kernels {
            for (element, values) in sub_kernel.elements().iter().zip(sub_kernel.values()) {
                point.push(Stmt::assign(lower(element), values.at(&indices)));
            }
        }
        if let Some(mapping) = det_mapping {
            point.push(Stmt::assign(
                CodeExpr::var(DET_JACOBIAN_NAME),
                lower(&mapping.decl.det_jacobian_expr()),
            ));
        }
        for (output, entry) in outputs.iter().zip(symbol.entries()) {
            let target = output.at(&indices);
            let value = lower(entry);
            point.push(if settings.accumulate {
                Stmt::aug_assign(target, value)
            } else {
                Stmt::assign(target, value)
            });
        }

        let stops = grid_shape(ldim);
        body.extend(Stmt::loop_nest(&indices, &stops, point));
        body
    }

    pub fn name(&self) -> &str {
        &self.func.name
    }

    /// Suffix shared by the names of the kernel, its sub-kernels and its interface.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn expr(&self) -> &GltExpr {
        &self.expr
    }

    pub fn ldim(&self) -> usize {
        self.expr.ldim()
    }

    pub fn spaces(&self) -> &(Arc<SplineSpace>, Arc<SplineSpace>) {
        &self.spaces
    }

    /// The mapping, if the symbol depends on it.
    pub fn mapping(&self) -> Option<&MappingInfo> {
        self.mapping.as_ref()
    }

    /// The reduced symbol, in the coordinates `t1, t2, t3` and `x1, x2, x3`.
    pub fn symbol(&self) -> &GltSymbol {
        &self.symbol
    }

    pub fn shape(&self) -> (usize, usize) {
        self.symbol.shape()
    }

    /// Element types of the output buffers, row-major.
    pub fn dtypes(&self) -> &[Dtype] {
        &self.dtypes
    }

    /// Sub-kernels called by the kernel, the mapping sub-kernel first.
    pub fn dependencies(&self) -> &[SubKernel] {
        &self.sub_kernels
    }

    pub fn is_dependent(&self) -> bool {
        !self.sub_kernels.is_empty()
    }

    pub fn arguments(&self) -> &[KernelArgument] {
        &self.arguments
    }

    pub fn arguments_with_role(&self, role: ArgumentRole) -> impl Iterator<Item = &Variable> {
        self.arguments
            .iter()
            .filter(move |a| a.role == role)
            .map(|a| &a.variable)
    }

    /// Coefficient arrays of the fields, with the names of their fields.
    pub fn field_coefficients(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.arguments
            .iter()
            .filter_map(|a| a.field.as_deref().map(|field| (field, &a.variable)))
    }

    pub fn outputs(&self) -> Vec<&Variable> {
        self.arguments_with_role(ArgumentRole::Output).collect()
    }

    /// Number of derivatives the basis tables passed to the kernel must contain.
    pub fn max_nderiv(&self) -> usize {
        self.max_nderiv
    }

    pub fn constants(&self) -> &[String] {
        &self.constants
    }

    pub fn has_physical_coordinates(&self) -> bool {
        self.arguments_with_role(ArgumentRole::PhysicalCoordinate)
            .next()
            .is_some()
    }

    pub fn func(&self) -> &FunctionDef {
        &self.func
    }

    /// The sub-kernels followed by the kernel.
    pub fn functions(&self) -> Vec<FunctionDef> {
        self.sub_kernels
            .iter()
            .map(|s| s.func().clone())
            .chain(std::iter::once(self.func.clone()))
            .collect()
    }
}

impl CodegenUnit for GltKernel {
    fn name(&self) -> &str {
        &self.func.name
    }

    fn func(&self) -> &FunctionDef {
        &self.func
    }

    fn kind(&self) -> &'static str {
        "kernel"
    }

    fn into_kernel(self: Arc<Self>) -> Option<Arc<GltKernel>> {
        Some(self)
    }
}

impl CodegenUnit for SubKernel {
    fn name(&self) -> &str {
        SubKernel::name(self)
    }

    fn func(&self) -> &FunctionDef {
        SubKernel::func(self)
    }

    fn kind(&self) -> &'static str {
        match self.kind() {
            SubKernelKind::Field => "field sub-kernel",
            SubKernelKind::Mapping => "mapping sub-kernel",
        }
    }
}
