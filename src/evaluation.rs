//! Sub-kernels evaluating fields and mappings on tensor grids.
//!
//! A sub-kernel receives the degrees, spans and basis tables of the grid, one coefficient array
//! per field (or mapping component) and one output array per evaluated quantity. The kernel
//! declares and passes these under the same names, see [`grid_variables`].
use crate::ast::{Argument, BinaryOp, CodeExpr, Dtype, FunctionDef, IndexItem, Stmt, Variable};
use crate::backend::BackendConfig;
use crate::error::ConstructionError;
use glt_symbolic::{Expr, FieldAtom, MappingAtom, MappingDecl};
use itertools::Itertools;

pub fn degree_name(axis: usize) -> String {
    format!("p{}", axis + 1)
}

pub fn spans_name(axis: usize) -> String {
    format!("spans_{}", axis + 1)
}

pub fn basis_name(axis: usize) -> String {
    format!("basis_{}", axis + 1)
}

pub fn coeff_name(label: &str) -> String {
    format!("coeff_{}", label)
}

pub fn values_name(label: &str) -> String {
    format!("{}_values", label)
}

/// Label of the weights of a rational mapping.
pub const WEIGHTS_LABEL: &str = "w";

/// Degrees, spans and basis tables along each axis, in this order.
pub fn grid_variables(ldim: usize) -> Vec<Variable> {
    let degrees = (0..ldim).map(|k| Variable::scalar(degree_name(k), Dtype::Int));
    let spans = (0..ldim).map(|k| Variable::new(spans_name(k), Dtype::Int, 1));
    let basis = (0..ldim).map(|k| Variable::new(basis_name(k), Dtype::Real, 3));
    degrees.chain(spans).chain(basis).collect()
}

/// Field atoms living in the same space, evaluated by a single sub-kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldGroup {
    pub space: String,
    /// Sorted and without duplicates.
    pub atoms: Vec<FieldAtom>,
}

impl FieldGroup {
    /// Names of the fields of the group, sorted.
    pub fn fields(&self) -> Vec<String> {
        self.atoms.iter().map(|a| a.name().to_string()).dedup().collect()
    }
}

/// A symbolic mapping together with whether its discrete counterpart is rational.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingInfo {
    pub decl: MappingDecl,
    pub is_rational: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubKernelKind {
    Field,
    Mapping,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubKernel {
    kind: SubKernelKind,
    func: FunctionDef,
    elements: Vec<Expr>,
    coeffs: Vec<Variable>,
    values: Vec<Variable>,
}

impl SubKernel {
    /// `values[i]` holds the values of `elements[i]`.
    pub fn new(
        kind: SubKernelKind,
        func: FunctionDef,
        elements: Vec<Expr>,
        coeffs: Vec<Variable>,
        values: Vec<Variable>,
    ) -> Self {
        assert_eq!(elements.len(), values.len(), "Every element needs a value array.");
        Self {
            kind,
            func,
            elements,
            coeffs,
            values,
        }
    }

    pub fn kind(&self) -> SubKernelKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.func.name
    }

    pub fn func(&self) -> &FunctionDef {
        &self.func
    }

    /// The declared arguments of the routine.
    pub fn arguments(&self) -> Vec<Variable> {
        self.func.arguments.iter().map(|a| a.variable.clone()).collect()
    }

    /// Arguments of a call to the routine, followed by `extra`.
    pub fn build_arguments(&self, extra: &[Variable]) -> Vec<Variable> {
        let mut arguments = self.arguments();
        arguments.extend_from_slice(extra);
        arguments
    }

    /// The evaluated quantities: field atoms, or mapping atoms of all orders up to `nderiv`.
    pub fn elements(&self) -> &[Expr] {
        &self.elements
    }

    /// Coefficient arrays, in declaration order.
    pub fn coeffs(&self) -> &[Variable] {
        &self.coeffs
    }

    /// Value arrays, in declaration order.
    pub fn values(&self) -> &[Variable] {
        &self.values
    }

    /// A statement calling the routine with the variables of the same name.
    pub fn call(&self) -> Stmt {
        Stmt::Expr(CodeExpr::Call(
            self.func.name.clone(),
            self.build_arguments(&[]).iter().map(Variable::expr).collect(),
        ))
    }
}

/// Provides the routines evaluating fields and mappings on the grid of a kernel.
pub trait SubKernelProvider: Send + Sync {
    /// A routine evaluating every atom of the group.
    fn field(
        &self,
        group: &FieldGroup,
        ldim: usize,
        name: &str,
        backend: &BackendConfig,
    ) -> Result<SubKernel, ConstructionError>;

    /// A routine evaluating all derivatives up to order `nderiv` of every component of the mapping.
    fn mapping(
        &self,
        mapping: &MappingInfo,
        nderiv: usize,
        name: &str,
        backend: &BackendConfig,
    ) -> Result<SubKernel, ConstructionError>;
}

fn point_indices(ldim: usize) -> Vec<String> {
    (1..=ldim).map(|k| format!("i{}", k)).collect()
}

fn basis_indices(ldim: usize) -> Vec<String> {
    (1..=ldim).map(|k| format!("j{}", k)).collect()
}

/// `coeff[spans_1[i1] - p1 + j1, ...]`
fn coefficient_entry(coeff: &Variable, ldim: usize) -> CodeExpr {
    let items = (0..ldim)
        .map(|k| {
            let span = Variable::new(spans_name(k), Dtype::Int, 1).at(&point_indices(ldim)[k..=k]);
            let first = CodeExpr::binary(BinaryOp::Sub, span, CodeExpr::var(degree_name(k)));
            IndexItem::At(first + CodeExpr::var(&basis_indices(ldim)[k]))
        })
        .collect();
    CodeExpr::Index(Box::new(coeff.expr()), items)
}

/// `basis_1[i1, j1, d1]*basis_2[i2, j2, d2]*...` for the derivative multi-index `d`.
fn basis_product(derivatives: &[u8], ldim: usize) -> CodeExpr {
    let (points, functions) = (point_indices(ldim), basis_indices(ldim));
    CodeExpr::fold(
        BinaryOp::Mul,
        (0..ldim).map(|k| {
            let derivative = derivatives.get(k).copied().unwrap_or(0);
            CodeExpr::Index(
                Box::new(CodeExpr::var(basis_name(k))),
                vec![
                    IndexItem::At(CodeExpr::var(&points[k])),
                    IndexItem::At(CodeExpr::var(&functions[k])),
                    IndexItem::At(CodeExpr::Int(derivative as i64)),
                ],
            )
        }),
        CodeExpr::real(1.0),
    )
}

/// Loops over all grid points and the non-vanishing basis functions at each point.
///
/// `init` runs once per point before, `accumulate` once per basis function and `finalize`
/// once per point after the inner loops.
fn tensor_evaluation(ldim: usize, init: Vec<Stmt>, accumulate: Vec<Stmt>, finalize: Vec<Stmt>) -> Vec<Stmt> {
    let lengths: Vec<String> = (1..=ldim).map(|k| format!("k{}", k)).collect();
    let mut body: Vec<Stmt> = lengths
        .iter()
        .enumerate()
        .map(|(k, length)| Stmt::assign(CodeExpr::var(length), CodeExpr::Len(Box::new(CodeExpr::var(spans_name(k))))))
        .collect();

    let basis_stops: Vec<CodeExpr> = (0..ldim)
        .map(|k| CodeExpr::var(degree_name(k)) + CodeExpr::Int(1))
        .collect();
    let mut point_body = init;
    point_body.extend(Stmt::loop_nest(&basis_indices(ldim), &basis_stops, accumulate));
    point_body.extend(finalize);

    let point_stops: Vec<CodeExpr> = lengths.iter().map(CodeExpr::var).collect();
    body.extend(Stmt::loop_nest(&point_indices(ldim), &point_stops, point_body));
    body
}

fn local(label: &str) -> CodeExpr {
    CodeExpr::var(label)
}

fn local_coeff(label: &str) -> String {
    format!("c_{}", label)
}

/// Multi-indices of total order at most `nderiv`, by increasing order, `s1` before `s2`.
fn multi_indices(ldim: usize, nderiv: usize) -> Vec<Vec<u8>> {
    (0..ldim)
        .map(|_| 0..=nderiv as u8)
        .multi_cartesian_product()
        .filter(|index| index.iter().map(|&d| d as usize).sum::<usize>() <= nderiv)
        .sorted_by_key(|index| {
            let order: usize = index.iter().map(|&d| d as usize).sum();
            (order, index.iter().rev().copied().collect::<Vec<_>>())
        })
        .collect()
}

fn function_def(name: &str, arguments: Vec<Variable>, body: Vec<Stmt>, backend: &BackendConfig) -> FunctionDef {
    let arguments: Vec<Argument> = arguments.into_iter().map(Argument::required).collect();
    FunctionDef {
        name: name.to_string(),
        metadata: backend.kind.metadata(name, &arguments),
        imports: backend.kind.imports(),
        arguments,
        body,
    }
}

/// Sub-kernels evaluating tensor-product splines by direct summation over the non-vanishing
/// basis functions of every grid point.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArraySubKernels;

impl SubKernelProvider for ArraySubKernels {
    fn field(
        &self,
        group: &FieldGroup,
        ldim: usize,
        name: &str,
        backend: &BackendConfig,
    ) -> Result<SubKernel, ConstructionError> {
        let fields = group.fields();
        let coeffs: Vec<Variable> = fields
            .iter()
            .map(|f| Variable::new(coeff_name(f), Dtype::Real, ldim))
            .collect();
        let values: Vec<Variable> = group
            .atoms
            .iter()
            .map(|a| Variable::new(values_name(&a.label()), Dtype::Real, ldim))
            .collect();

        let init = group
            .atoms
            .iter()
            .map(|a| Stmt::assign(local(&a.label()), CodeExpr::real(0.0)))
            .collect();
        let mut accumulate: Vec<Stmt> = fields
            .iter()
            .zip(&coeffs)
            .map(|(field, coeff)| Stmt::assign(local(&local_coeff(field)), coefficient_entry(coeff, ldim)))
            .collect();
        accumulate.extend(group.atoms.iter().map(|atom| {
            let term = local(&local_coeff(atom.name())) * basis_product(atom.derivatives(), ldim);
            Stmt::aug_assign(local(&atom.label()), term)
        }));
        let finalize = group
            .atoms
            .iter()
            .zip(&values)
            .map(|(atom, value)| Stmt::assign(value.at(&point_indices(ldim)), local(&atom.label())))
            .collect();

        let arguments = grid_variables(ldim)
            .into_iter()
            .chain(coeffs.iter().cloned())
            .chain(values.iter().cloned())
            .collect();
        let body = tensor_evaluation(ldim, init, accumulate, finalize);
        Ok(SubKernel::new(
            SubKernelKind::Field,
            function_def(name, arguments, body, backend),
            group.atoms.iter().cloned().map(Expr::Field).collect(),
            coeffs,
            values,
        ))
    }

    fn mapping(
        &self,
        mapping: &MappingInfo,
        nderiv: usize,
        name: &str,
        backend: &BackendConfig,
    ) -> Result<SubKernel, ConstructionError> {
        if mapping.is_rational && nderiv > 1 {
            return Err(ConstructionError::Unsupported {
                reason: format!("derivatives of order {} of rational mappings", nderiv),
            });
        }

        let ldim = mapping.decl.ldim();
        let derivatives = multi_indices(ldim, nderiv);
        let atoms: Vec<MappingAtom> = (0..ldim)
            .cartesian_product(&derivatives)
            .map(|(c, d)| MappingAtom::new(mapping.decl.name(), c, d))
            .collect();
        let components: Vec<String> = (1..=ldim).map(|c| format!("x{}", c)).collect();
        let mut coeff_labels = components.clone();
        if mapping.is_rational {
            coeff_labels.push(WEIGHTS_LABEL.to_string());
        }
        let coeffs: Vec<Variable> = coeff_labels
            .iter()
            .map(|label| Variable::new(coeff_name(label), Dtype::Real, ldim))
            .collect();
        let values: Vec<Variable> = atoms
            .iter()
            .map(|a| Variable::new(values_name(&a.label()), Dtype::Real, ldim))
            .collect();
        let weight_labels: Vec<String> = derivatives
            .iter()
            .map(|d| FieldAtom::new(WEIGHTS_LABEL, d).label())
            .collect();

        let mut init: Vec<Stmt> = atoms
            .iter()
            .map(|a| Stmt::assign(local(&a.label()), CodeExpr::real(0.0)))
            .collect();
        let mut accumulate: Vec<Stmt> = coeff_labels
            .iter()
            .zip(&coeffs)
            .map(|(label, coeff)| Stmt::assign(local(&local_coeff(label)), coefficient_entry(coeff, ldim)))
            .collect();
        for atom in &atoms {
            let mut coefficient = local(&local_coeff(&components[atom.component()]));
            if mapping.is_rational {
                coefficient = coefficient * local(&local_coeff(WEIGHTS_LABEL));
            }
            let term = coefficient * basis_product(atom.derivatives(), ldim);
            accumulate.push(Stmt::aug_assign(local(&atom.label()), term));
        }

        let points = point_indices(ldim);
        let finalize: Vec<Stmt> = if mapping.is_rational {
            init.extend(weight_labels.iter().map(|w| Stmt::assign(local(w), CodeExpr::real(0.0))));
            accumulate.extend(derivatives.iter().zip(&weight_labels).map(|(d, w)| {
                Stmt::aug_assign(local(w), local(&local_coeff(WEIGHTS_LABEL)) * basis_product(d, ldim))
            }));
            // x = X / w and d(x) = (d(X) - x d(w)) / w, with X the weighted sums
            let weight = || local(WEIGHTS_LABEL);
            atoms
                .iter()
                .zip(&values)
                .map(|(atom, value)| {
                    let ratio = CodeExpr::binary(BinaryOp::Div, local(&atom.label()), weight());
                    let expr = match atom.derivatives().iter().position(|&d| d == 1) {
                        None => ratio,
                        Some(axis) => {
                            let mut unit = vec![0; axis + 1];
                            unit[axis] = 1;
                            let position = MappingAtom::new(mapping.decl.name(), atom.component(), &[]);
                            let w_derivative = local(&FieldAtom::new(WEIGHTS_LABEL, &unit).label());
                            let position = CodeExpr::binary(BinaryOp::Div, local(&position.label()), weight());
                            let numerator = CodeExpr::binary(BinaryOp::Sub, local(&atom.label()), position * w_derivative);
                            CodeExpr::binary(BinaryOp::Div, numerator, weight())
                        }
                    };
                    Stmt::assign(value.at(&points), expr)
                })
                .collect()
        } else {
            atoms
                .iter()
                .zip(&values)
                .map(|(atom, value)| Stmt::assign(value.at(&points), local(&atom.label())))
                .collect()
        };

        let arguments = grid_variables(ldim)
            .into_iter()
            .chain(coeffs.iter().cloned())
            .chain(values.iter().cloned())
            .collect();
        let body = tensor_evaluation(ldim, init, accumulate, finalize);
        Ok(SubKernel::new(
            SubKernelKind::Mapping,
            function_def(name, arguments, body, backend),
            atoms.into_iter().map(Expr::Mapping).collect(),
            coeffs,
            values,
        ))
    }
}
