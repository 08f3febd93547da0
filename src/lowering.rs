//! Lowering of symbolic expressions to code expressions.
use crate::ast::{BinaryOp, CodeExpr};
use glt_symbolic::Expr;

/// Name of the local variable holding the Jacobian determinant of the mapping.
pub const DET_JACOBIAN_NAME: &str = "det_jac";

/// Returns `-expr` if `expr` carries a negative numeric coefficient.
fn negated(expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::Number(x) if x.0 < 0.0 => Some(Expr::num(-x.0)),
        Expr::Mul(factors) => match factors.first().and_then(Expr::as_number) {
            Some(c) if c < 0.0 => Some(Expr::product(
                std::iter::once(Expr::num(-c)).chain(factors[1..].iter().cloned()),
            )),
            _ => None,
        },
        _ => None,
    }
}

/// Lowers a symbolic expression.
///
/// Atoms become variables named after their labels (fields `F_s1`, mapping components `x1_s2`,
/// the determinant [`DET_JACOBIAN_NAME`]); symbols and constants keep their names.
pub fn lower(expr: &Expr) -> CodeExpr {
    match expr {
        Expr::Number(x) => CodeExpr::real(x.0),
        Expr::ImaginaryUnit => CodeExpr::ImaginaryUnit,
        Expr::Symbol(name) | Expr::Constant(name) => CodeExpr::var(name),
        Expr::Field(atom) => CodeExpr::var(atom.label()),
        Expr::Mapping(atom) => CodeExpr::var(atom.label()),
        Expr::DetJacobian(_) => CodeExpr::var(DET_JACOBIAN_NAME),
        Expr::Pow(base, n) => CodeExpr::binary(BinaryOp::Pow, lower(base), CodeExpr::Int(*n as i64)),
        Expr::Func(function, argument) => CodeExpr::Call(function.name().to_string(), vec![lower(argument)]),
        Expr::Mul(factors) => CodeExpr::fold(BinaryOp::Mul, factors.iter().map(lower), CodeExpr::real(1.0)),
        Expr::Add(terms) => {
            let mut terms = terms.iter();
            let first = match terms.next() {
                Some(first) => lower(first),
                None => return CodeExpr::real(0.0),
            };
            terms.fold(first, |acc, term| match negated(term) {
                Some(positive) => CodeExpr::binary(BinaryOp::Sub, acc, lower(&positive)),
                None => CodeExpr::binary(BinaryOp::Add, acc, lower(term)),
            })
        }
    }
}
