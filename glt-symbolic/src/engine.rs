//! The narrow symbolic capability consumed by the code generators.
use crate::expr::{AtomKind, Expr, GltSymbol, MathFunction};
use crate::form::GltExpr;
use crate::mapping::MappingDecl;
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Discretization data a symbol is parameterized by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscretizationParams {
    pub ncells: Vec<usize>,
    pub degree: Vec<usize>,
}

impl DiscretizationParams {
    pub fn new(ncells: &[usize], degree: &[usize]) -> Self {
        Self {
            ncells: ncells.to_vec(),
            degree: degree.to_vec(),
        }
    }

    /// Checks that there is exactly one element count and one degree per axis.
    pub fn check_dimension(&self, ldim: usize) -> Result<(), ReductionError> {
        if self.ncells.len() != ldim || self.degree.len() != ldim || self.ncells.contains(&0) {
            Err(ReductionError::InvalidParameters {
                ldim,
                ncells: self.ncells.clone(),
                degree: self.degree.clone(),
            })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReductionError {
    /// Element counts or degrees do not match the dimension of the form.
    InvalidParameters {
        ldim: usize,
        ncells: Vec<usize>,
        degree: Vec<usize>,
    },
    /// The form refers to axes or components that do not exist.
    MalformedForm(String),
    /// The symbol of a term has no closed form for the given degree.
    NotClosedForm { axis: usize, degree: usize, order: usize },
    /// The form uses a feature the engine cannot reduce.
    Unsupported(String),
}

impl Display for ReductionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ReductionError::InvalidParameters { ldim, ncells, degree } => write!(
                f,
                "Invalid discretization for a {}-dimensional form: ncells = {:?}, degree = {:?}",
                ldim, ncells, degree
            ),
            ReductionError::MalformedForm(reason) => write!(f, "Malformed bilinear form: {}", reason),
            ReductionError::NotClosedForm { axis, degree, order } => write!(
                f,
                "No closed form for derivative order {} along axis {} with degree {}",
                order, axis, degree
            ),
            ReductionError::Unsupported(reason) => write!(f, "Unsupported form: {}", reason),
        }
    }
}

impl std::error::Error for ReductionError {}

/// Symbolic capability required to build GLT kernels.
///
/// Only [`reduce`](Self::reduce) has to be provided; the remaining methods default to
/// plain traversals of [`Expr`].
pub trait SymbolicEngine: Send + Sync {
    /// Reduces the symbol of a form to a closed-form, expanded expression in the
    /// frequency symbols `tx, ty, tz`.
    fn reduce(
        &self,
        expr: &GltExpr,
        params: &DiscretizationParams,
        mapping: Option<&MappingDecl>,
    ) -> Result<GltSymbol, ReductionError>;

    fn atoms(&self, expr: &Expr, kinds: &[AtomKind]) -> Vec<Expr> {
        expr.atoms(kinds)
    }

    fn max_derivative_order(&self, expr: &Expr) -> usize {
        expr.max_derivative_order()
    }

    fn math_functions(&self, expr: &Expr) -> BTreeSet<MathFunction> {
        expr.math_functions()
    }
}
