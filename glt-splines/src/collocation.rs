use crate::space::SplineSpace;

/// Span indices and basis function derivatives of a spline space at a tensor grid of points.
///
/// For axis `k`, `basis(k)` is a flat array of shape `(npts, p + 1, nderiv + 1)` in row-major
/// order, holding derivative `d` of the `j`-th non-vanishing basis function at point `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollocationBasisValues {
    nderiv: usize,
    spans: Vec<Vec<usize>>,
    basis: Vec<Vec<f64>>,
    shapes: Vec<[usize; 3]>,
}

impl CollocationBasisValues {
    /// # Panics
    ///
    /// Panics if the number of point arrays does not match the dimension of the space.
    pub fn new(grid: &[&[f64]], space: &SplineSpace, nderiv: usize) -> Self {
        assert_eq!(grid.len(), space.ldim(), "Need one array of points per axis.");
        let mut spans = Vec::with_capacity(grid.len());
        let mut basis = Vec::with_capacity(grid.len());
        let mut shapes = Vec::with_capacity(grid.len());

        for (axis, points) in space.axes().iter().zip(grid) {
            let p = axis.degree();
            let mut axis_spans = Vec::with_capacity(points.len());
            let mut axis_basis = Vec::with_capacity(points.len() * (p + 1) * (nderiv + 1));
            for &x in points.iter() {
                let (span, ders) = axis.evaluate_basis(x, nderiv);
                axis_spans.push(span);
                for j in 0..=p {
                    axis_basis.extend((0..=nderiv).map(|d| ders[d][j]));
                }
            }
            spans.push(axis_spans);
            basis.push(axis_basis);
            shapes.push([points.len(), p + 1, nderiv + 1]);
        }

        Self {
            nderiv,
            spans,
            basis,
            shapes,
        }
    }

    pub fn nderiv(&self) -> usize {
        self.nderiv
    }

    pub fn ldim(&self) -> usize {
        self.spans.len()
    }

    pub fn spans(&self, axis: usize) -> &[usize] {
        &self.spans[axis]
    }

    pub fn basis(&self, axis: usize) -> &[f64] {
        &self.basis[axis]
    }

    /// Shape `(npts, p + 1, nderiv + 1)` of the basis table along the given axis.
    pub fn basis_shape(&self, axis: usize) -> [usize; 3] {
        self.shapes[axis]
    }
}
