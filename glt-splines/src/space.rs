use crate::bspline::{basis_funs_all_ders, find_span, greville_abscissae, num_basis, open_uniform_knots};
use itertools::Itertools;
use nalgebra::DMatrix;
use std::sync::Arc;

/// A univariate spline space with an open uniform knot vector on `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineSpace1d {
    degree: usize,
    ncells: usize,
    knots: Vec<f64>,
}

impl SplineSpace1d {
    pub fn new(ncells: usize, degree: usize) -> Self {
        Self {
            degree,
            ncells,
            knots: open_uniform_knots(ncells, degree),
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn ncells(&self) -> usize {
        self.ncells
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn nbasis(&self) -> usize {
        num_basis(&self.knots, self.degree)
    }

    pub fn greville(&self) -> Vec<f64> {
        greville_abscissae(&self.knots, self.degree)
    }

    /// Span index and `ders[k][j]` tables at `x`, see [`basis_funs_all_ders`].
    pub fn evaluate_basis(&self, x: f64, nderiv: usize) -> (usize, Vec<Vec<f64>>) {
        let span = find_span(&self.knots, self.degree, x);
        (span, basis_funs_all_ders(&self.knots, self.degree, x, span, nderiv))
    }
}

/// A tensor-product spline space on the unit cube.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineSpace {
    name: String,
    axes: Vec<SplineSpace1d>,
}

impl SplineSpace {
    /// # Panics
    ///
    /// Panics if `ncells` and `degree` have different lengths or the dimension is not 1, 2 or 3.
    pub fn new(name: impl Into<String>, ncells: &[usize], degree: &[usize]) -> Self {
        assert_eq!(ncells.len(), degree.len(), "ncells and degree must have the same length.");
        assert!((1..=3).contains(&ncells.len()), "Only 1, 2 and 3 dimensions are supported.");
        Self {
            name: name.into(),
            axes: ncells
                .iter()
                .zip(degree)
                .map(|(&n, &p)| SplineSpace1d::new(n, p))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ldim(&self) -> usize {
        self.axes.len()
    }

    pub fn axis(&self, axis: usize) -> &SplineSpace1d {
        &self.axes[axis]
    }

    pub fn axes(&self) -> &[SplineSpace1d] {
        &self.axes
    }

    pub fn degree(&self) -> Vec<usize> {
        self.axes.iter().map(SplineSpace1d::degree).collect()
    }

    pub fn ncells(&self) -> Vec<usize> {
        self.axes.iter().map(SplineSpace1d::ncells).collect()
    }

    /// Number of basis functions along each axis, i.e. the shape of coefficient arrays.
    pub fn nbasis(&self) -> Vec<usize> {
        self.axes.iter().map(SplineSpace1d::nbasis).collect()
    }

    /// Evaluates `sum_i coeffs[i] * d^alpha B_i(point)` for the row-major coefficient array.
    pub fn evaluate(&self, coeffs: &[f64], point: &[f64], derivatives: &[usize]) -> f64 {
        assert_eq!(point.len(), self.ldim());
        assert_eq!(coeffs.len(), self.nbasis().iter().product::<usize>());
        let tables: Vec<_> = self
            .axes
            .iter()
            .enumerate()
            .map(|(k, axis)| {
                let nderiv = derivatives.get(k).copied().unwrap_or(0);
                axis.evaluate_basis(point[k], nderiv)
            })
            .collect();
        let shape = self.nbasis();

        let mut value = 0.0;
        for local in self
            .axes
            .iter()
            .map(|axis| 0..=axis.degree())
            .multi_cartesian_product()
        {
            let mut flat = 0;
            let mut weight = 1.0;
            for (k, &j) in local.iter().enumerate() {
                let (span, ders) = &tables[k];
                let d = derivatives.get(k).copied().unwrap_or(0);
                let index = span - self.axes[k].degree() + j;
                flat = flat * shape[k] + index;
                weight *= ders[d][j];
            }
            value += coeffs[flat] * weight;
        }
        value
    }
}

/// A scalar spline field: a space together with a row-major coefficient array.
#[derive(Debug, Clone, PartialEq)]
pub struct FemField {
    space: Arc<SplineSpace>,
    coeffs: Vec<f64>,
}

impl FemField {
    pub fn zeros(space: Arc<SplineSpace>) -> Self {
        let n = space.nbasis().iter().product();
        Self {
            space,
            coeffs: vec![0.0; n],
        }
    }

    pub fn from_coefficients(space: Arc<SplineSpace>, coeffs: Vec<f64>) -> Self {
        assert_eq!(
            coeffs.len(),
            space.nbasis().iter().product::<usize>(),
            "Number of coefficients must match the dimension of the space."
        );
        Self { space, coeffs }
    }

    pub fn space(&self) -> &Arc<SplineSpace> {
        &self.space
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn coeffs_mut(&mut self) -> &mut [f64] {
        &mut self.coeffs
    }

    /// Shape of the coefficient array.
    pub fn shape(&self) -> Vec<usize> {
        self.space.nbasis()
    }

    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.space.evaluate(&self.coeffs, point, &[])
    }

    pub fn evaluate_derivative(&self, point: &[f64], derivatives: &[usize]) -> f64 {
        self.space.evaluate(&self.coeffs, point, derivatives)
    }
}

/// A spline (or NURBS, if weights are present) mapping from the unit cube.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineMapping {
    name: String,
    components: Vec<FemField>,
    weights: Option<FemField>,
}

impl SplineMapping {
    /// The mapping whose control points are `f` evaluated at the Greville abscissae.
    ///
    /// This reproduces `f` exactly whenever `f` is affine.
    pub fn from_control_point_fn(
        name: impl Into<String>,
        space: Arc<SplineSpace>,
        f: impl Fn(&[f64]) -> Vec<f64>,
    ) -> Self {
        let dim = space.ldim();
        let greville: Vec<_> = space.axes().iter().map(SplineSpace1d::greville).collect();
        let mut components = vec![Vec::new(); dim];
        for point in greville.iter().map(|g| g.iter().copied()).multi_cartesian_product() {
            let image = f(&point);
            assert_eq!(image.len(), dim, "Control points must have one entry per dimension.");
            for (component, value) in components.iter_mut().zip(image) {
                component.push(value);
            }
        }
        Self {
            name: name.into(),
            components: components
                .into_iter()
                .map(|c| FemField::from_coefficients(space.clone(), c))
                .collect(),
            weights: None,
        }
    }

    pub fn identity(space: Arc<SplineSpace>) -> Self {
        Self::from_control_point_fn("identity", space, |p| p.to_vec())
    }

    /// Turns the mapping into a rational mapping with the given weights.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        let space = self.space().clone();
        self.weights = Some(FemField::from_coefficients(space, weights));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ldim(&self) -> usize {
        self.components.len()
    }

    pub fn space(&self) -> &Arc<SplineSpace> {
        self.components[0].space()
    }

    pub fn components(&self) -> &[FemField] {
        &self.components
    }

    pub fn weights(&self) -> Option<&FemField> {
        self.weights.as_ref()
    }

    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    pub fn evaluate(&self, point: &[f64]) -> Vec<f64> {
        match &self.weights {
            None => self.components.iter().map(|c| c.evaluate(point)).collect(),
            Some(w) => {
                let space = self.space();
                let weighted: Vec<f64> = self
                    .components
                    .iter()
                    .map(|c| {
                        let products: Vec<f64> = c.coeffs().iter().zip(w.coeffs()).map(|(x, w)| x * w).collect();
                        space.evaluate(&products, point, &[])
                    })
                    .collect();
                let w_value = w.evaluate(point);
                weighted.into_iter().map(|x| x / w_value).collect()
            }
        }
    }

    /// The Jacobian `J[(c, k)] = d x_c / d s_k` at a logical point.
    pub fn jacobian(&self, point: &[f64]) -> DMatrix<f64> {
        let dim = self.ldim();
        let unit = |k: usize| {
            let mut d = vec![0; dim];
            d[k] = 1;
            d
        };
        match &self.weights {
            None => DMatrix::from_fn(dim, dim, |c, k| {
                self.components[c].evaluate_derivative(point, &unit(k))
            }),
            Some(w) => {
                let space = self.space();
                let w_value = w.evaluate(point);
                let values = self.evaluate(point);
                DMatrix::from_fn(dim, dim, |c, k| {
                    let products: Vec<f64> = self.components[c]
                        .coeffs()
                        .iter()
                        .zip(w.coeffs())
                        .map(|(x, w)| x * w)
                        .collect();
                    let numerator_derivative = space.evaluate(&products, point, &unit(k));
                    let w_derivative = w.evaluate_derivative(point, &unit(k));
                    (numerator_derivative - values[c] * w_derivative) / w_value
                })
            }
        }
    }
}

/// The discrete computational domain, possibly carrying a geometric mapping.
#[derive(Debug, Clone)]
pub struct DiscreteDomain {
    ldim: usize,
    mapping: Option<Arc<SplineMapping>>,
}

impl DiscreteDomain {
    /// The unit cube, without mapping.
    pub fn unit(ldim: usize) -> Self {
        Self { ldim, mapping: None }
    }

    pub fn mapped(mapping: Arc<SplineMapping>) -> Self {
        Self {
            ldim: mapping.ldim(),
            mapping: Some(mapping),
        }
    }

    pub fn ldim(&self) -> usize {
        self.ldim
    }

    pub fn mapping(&self) -> Option<&Arc<SplineMapping>> {
        self.mapping.as_ref()
    }
}
