//! Reduction of bilinear forms on uniform tensor-product B-spline spaces to their GLT symbols.
//!
//! Along a single axis with `n` elements and degree `p`, the matrix with entries
//! $\int D^a B_i \, D^b B_j$ has the symbol
//!
//! $$ \sigma_{a,b}(\theta) = n^{a+b-1} (-1)^a \sum_{k=-p}^{p} \phi^{(a+b)}_{2p+1}(p+1+k) e^{ik\theta}, $$
//!
//! where $\phi_q$ is the cardinal B-spline of degree $q$. Even orders give cosine series,
//! odd orders give $i$ times a sine series. Multi-dimensional symbols are products over axes.
use crate::engine::{DiscretizationParams, ReductionError, SymbolicEngine};
use crate::expr::{Expr, GltSymbol};
use crate::form::{FormTerm, GltExpr, Operator};
use crate::mapping::MappingDecl;
use itertools::Itertools;
use log::debug;

/// Frequency symbols along each axis.
pub const FREQUENCY_SYMBOLS: [&str; 3] = ["tx", "ty", "tz"];

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Values $\phi_d(x - j)$ of the cardinal B-spline of degree `d` for `j = 0, ..., count - 1`,
/// computed with the Cox-de Boor recursion on the integer knots.
fn cardinal_bspline_shifts(degree: usize, x: f64, count: usize) -> Vec<f64> {
    let len = count + degree;
    let mut values: Vec<f64> = (0..len)
        .map(|j| if (0.0..1.0).contains(&(x - j as f64)) { 1.0 } else { 0.0 })
        .collect();
    for d in 1..=degree {
        values = (0..len - d)
            .map(|j| {
                let y = x - j as f64;
                (y * values[j] + (d as f64 + 1.0 - y) * values[j + 1]) / d as f64
            })
            .collect();
    }
    values
}

/// Evaluates the `derivative`-th derivative of the cardinal B-spline of the given degree,
/// supported on `[0, degree + 1]`.
///
/// # Panics
///
/// Panics if `derivative >= degree`, in which case the derivative is discontinuous at the knots.
pub fn cardinal_bspline_derivative(degree: usize, derivative: usize, x: f64) -> f64 {
    assert!(derivative < degree, "Derivative order must be smaller than the degree.");
    // D^r phi_q(x) = sum_j (-1)^j binom(r, j) phi_{q-r}(x - j)
    cardinal_bspline_shifts(degree - derivative, x, derivative + 1)
        .into_iter()
        .enumerate()
        .map(|(j, value)| {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            sign * binomial(derivative, j) * value
        })
        .sum()
}

/// Fourier coefficients $c_k = \phi^{(a+b)}_{2p+1}(p+1+k)$ for $k = 0, \dots, p$.
pub fn symbol_coefficients(degree: usize, order: usize) -> Vec<f64> {
    let q = 2 * degree + 1;
    (0..=degree)
        .map(|k| cardinal_bspline_derivative(q, order, (degree + 1 + k) as f64))
        .collect()
}

/// The one-dimensional symbol for `a` derivatives on the test and `b` on the trial function.
fn axis_symbol(
    axis: usize,
    degree: usize,
    ncells: usize,
    a: usize,
    b: usize,
) -> Result<Expr, ReductionError> {
    let order = a + b;
    if order > 2 * degree {
        return Err(ReductionError::NotClosedForm { axis, degree, order });
    }

    let theta = Expr::symbol(FREQUENCY_SYMBOLS[axis]);
    let scaling = (ncells as f64).powi(order as i32 - 1) * if a % 2 == 0 { 1.0 } else { -1.0 };
    let c = symbol_coefficients(degree, order);

    let series = if order % 2 == 0 {
        let harmonics = (1..=degree).map(|k| {
            Expr::num(2.0 * c[k]) * Expr::cos(Expr::num(k as f64) * theta.clone())
        });
        Expr::sum(std::iter::once(Expr::num(c[0])).chain(harmonics))
    } else {
        // c_{-k} = -c_k for odd orders, so the series collapses into sines
        let harmonics = (1..=degree).map(|k| {
            Expr::num(2.0 * c[k]) * Expr::sin(Expr::num(k as f64) * theta.clone())
        });
        Expr::imaginary_unit() * Expr::sum(harmonics)
    };
    Ok(Expr::num(scaling) * series)
}

/// Symbol of `coefficient * D^alpha v * D^beta u` with logical multi-indices.
fn logical_term_symbol(
    coefficient: Expr,
    test_index: &[u8],
    trial_index: &[u8],
    params: &DiscretizationParams,
) -> Result<Expr, ReductionError> {
    let mut factors = vec![coefficient];
    for axis in 0..params.ncells.len() {
        factors.push(axis_symbol(
            axis,
            params.degree[axis],
            params.ncells[axis],
            test_index[axis] as usize,
            trial_index[axis] as usize,
        )?);
    }
    Ok(Expr::product(factors))
}

/// Pull-back of a first-order operator to logical derivatives,
/// as pairs of (adjugate factor, logical multi-index).
fn pulled_back(operator: Operator, mapping: &MappingDecl) -> Result<Vec<(Expr, Vec<u8>)>, ReductionError> {
    let dim = mapping.ldim();
    match operator {
        Operator::Identity => Ok(vec![(Expr::one(), vec![0; dim])]),
        // d/dx_i = sum_k adj(J)_{k i} / det(J) d/ds_k
        Operator::Partial(i) => Ok((0..dim)
            .map(|k| (mapping.adjugate_entry(k, i), Operator::Partial(k).multi_index(dim)))
            .collect()),
        Operator::SecondPartial(_, _) => Err(ReductionError::Unsupported(
            "second order derivatives on a mapped domain".to_string(),
        )),
    }
}

fn check_term(term: &FormTerm, expr: &GltExpr) -> Result<(), ReductionError> {
    let form = expr.form();
    let dim = form.ldim();
    if let Some(axis) = term.test.axes().into_iter().chain(term.trial.axes()).find(|&a| a >= dim) {
        return Err(ReductionError::MalformedForm(format!(
            "derivative along axis {} in a {}-dimensional form",
            axis, dim
        )));
    }
    if term.test_component >= form.test_components() || term.trial_component >= form.trial_components() {
        return Err(ReductionError::MalformedForm(format!(
            "block ({}, {}) outside of a {}x{} system",
            term.test_component,
            term.trial_component,
            form.test_components(),
            form.trial_components()
        )));
    }
    Ok(())
}

/// Closed-form reduction for forms on uniform B-spline spaces with maximal regularity.
#[derive(Debug, Clone, Copy, Default)]
pub struct GltEngine;

impl GltEngine {
    fn reduce_term(
        &self,
        term: &FormTerm,
        params: &DiscretizationParams,
        mapping: Option<&MappingDecl>,
    ) -> Result<Expr, ReductionError> {
        let dim = params.ncells.len();
        let mapping = match mapping {
            None => {
                return logical_term_symbol(
                    term.coefficient.clone(),
                    &term.test.multi_index(dim),
                    &term.trial.multi_index(dim),
                    params,
                );
            }
            Some(mapping) => mapping,
        };

        // int c D_i v D_j u dx = int c det(J)^(1 - n) (adj-weighted logical derivatives) ds,
        // where n is the number of physical first derivatives in the term
        let derivative_count = (term.test.order() + term.trial.order()) as i32;
        let det_factor = Expr::pow(mapping.det_jacobian(), 1 - derivative_count);

        let test = pulled_back(term.test, mapping)?;
        let trial = pulled_back(term.trial, mapping)?;
        let contributions = test
            .iter()
            .cartesian_product(trial.iter())
            .map(|((test_factor, test_index), (trial_factor, trial_index))| {
                let coefficient = Expr::product([
                    term.coefficient.clone(),
                    det_factor.clone(),
                    test_factor.clone(),
                    trial_factor.clone(),
                ]);
                logical_term_symbol(coefficient, test_index, trial_index, params)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::sum(contributions))
    }
}

impl SymbolicEngine for GltEngine {
    fn reduce(
        &self,
        expr: &GltExpr,
        params: &DiscretizationParams,
        mapping: Option<&MappingDecl>,
    ) -> Result<GltSymbol, ReductionError> {
        let form = expr.form();
        params.check_dimension(form.ldim())?;
        if let Some(mapping) = mapping {
            if mapping.ldim() != form.ldim() {
                return Err(ReductionError::MalformedForm(format!(
                    "mapping {} is {}-dimensional but the form is {}-dimensional",
                    mapping.name(),
                    mapping.ldim(),
                    form.ldim()
                )));
            }
        }

        let (rows, cols) = (form.test_components(), form.trial_components());
        if rows == 0 || cols == 0 {
            return Err(ReductionError::MalformedForm("vector functions without components".to_string()));
        }

        let mut cells = vec![Vec::new(); rows * cols];
        for term in form.terms() {
            check_term(term, expr)?;
            let symbol = self.reduce_term(term, params, mapping)?;
            cells[term.test_component * cols + term.trial_component].push(symbol);
        }

        let entries: Vec<_> = cells.into_iter().map(|terms| Expr::sum(terms).expand()).collect();
        debug!(
            "Reduced {}x{} symbol with {} terms in total",
            rows,
            cols,
            entries.iter().map(|e| e.summands().len()).sum::<usize>()
        );

        if form.test_components() == 1 && form.trial_components() == 1 {
            Ok(GltSymbol::Scalar(entries.into_iter().next().unwrap_or_else(Expr::zero)))
        } else {
            Ok(GltSymbol::matrix(rows, cols, entries))
        }
    }
}
