use glt_splines::{CollocationBasisValues, SplineSpace};
use matrixcompare::assert_scalar_eq;

#[test]
fn collocation_tables_have_expected_shape() {
    let space = SplineSpace::new("V", &[8, 4], &[2, 3]);
    let t1 = [0.0, 0.25, 0.5];
    let t2 = [0.1, 0.9];
    let values = CollocationBasisValues::new(&[&t1, &t2], &space, 1);

    assert_eq!(values.ldim(), 2);
    assert_eq!(values.nderiv(), 1);
    assert_eq!(values.basis_shape(0), [3, 3, 2]);
    assert_eq!(values.basis_shape(1), [2, 4, 2]);
    assert_eq!(values.basis(0).len(), 3 * 3 * 2);
    assert_eq!(values.spans(0), &[2, 4, 6]);
    assert_eq!(values.spans(1).len(), 2);
}

#[test]
fn collocation_values_sum_to_one_at_every_point() {
    let space = SplineSpace::new("V", &[5], &[3]);
    let t = [0.0, 0.13, 0.5, 0.77, 1.0];
    let values = CollocationBasisValues::new(&[&t], &space, 2);
    let [npts, nbasis, nders] = values.basis_shape(0);
    let basis = values.basis(0);
    for i in 0..npts {
        let value: f64 = (0..nbasis).map(|j| basis[(i * nbasis + j) * nders]).sum();
        let derivative: f64 = (0..nbasis).map(|j| basis[(i * nbasis + j) * nders + 1]).sum();
        assert_scalar_eq!(value, 1.0, comp = abs, tol = 1e-13);
        assert_scalar_eq!(derivative, 0.0, comp = abs, tol = 1e-10);
    }
}
