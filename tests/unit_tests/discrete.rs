use super::same_spaces;
use glt_codegen::ast::Dtype;
use glt_codegen::backend::BackendConfig;
use glt_codegen::discrete::{Arguments, DiscreteGltExpr, GltOutput};
use glt_codegen::error::{ArgumentMismatch, GltError};
use glt_codegen::glt_splines::{DiscreteDomain, FemField, SplineMapping, SplineSpace};
use glt_codegen::glt_symbolic::{BilinearForm, Expr, GltExpr, Operator};
use glt_codegen::kernel::KernelSettings;
use glt_codegen::runtime::NdArray;
use itertools::Itertools;
use matrixcompare::assert_scalar_eq;
use num::complex::Complex64;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

fn discretize(
    form: BilinearForm,
    domain: &DiscreteDomain,
    spaces: (Arc<SplineSpace>, Arc<SplineSpace>),
) -> DiscreteGltExpr {
    DiscreteGltExpr::new(&GltExpr::new(form), domain, spaces, KernelSettings::default()).unwrap()
}

/// 1D mass symbol of linear splines on `ncells` cells.
fn linear_mass(ncells: usize, t: f64) -> f64 {
    (2.0 / 3.0 + t.cos() / 3.0) / ncells as f64
}

fn assert_outputs_eq(a: &GltOutput, b: &GltOutput, points: &[Vec<usize>]) {
    assert_eq!(a.shape(), b.shape());
    for point in points {
        let (x, y) = (a.value(0, 0, point).unwrap(), b.value(0, 0, point).unwrap());
        assert_scalar_eq!(x.re, y.re, comp = abs, tol = 1e-10);
        assert_scalar_eq!(x.im, y.im, comp = abs, tol = 1e-10);
    }
}

fn assert_missing(err: GltError, argument: &str) {
    match err {
        GltError::Arguments(ArgumentMismatch::Missing { name }) => assert_eq!(name, argument),
        other => panic!("Expected a missing argument, got {:?}", other),
    }
}

fn grid_points(shape: &[usize]) -> Vec<Vec<usize>> {
    shape.iter().map(|&n| 0..n).multi_cartesian_product().collect()
}

#[test]
fn poisson_symbol_in_two_dimensions() {
    let poisson = discretize(
        BilinearForm::new(2).grad_dot_grad(Expr::one()),
        &DiscreteDomain::unit(2),
        same_spaces(&[8, 8], &[2, 2]),
    );
    let output = poisson.evaluate(&[vec![0.51], vec![0.21]], Arguments::new()).unwrap();

    assert_eq!(output.shape(), (1, 1));
    assert_eq!(output.cell(0, 0).shape(), &[1, 1]);
    assert_eq!(output.cell(0, 0).dtype(), Dtype::Real);
    let value = output.value(0, 0, &[0, 0]).unwrap();
    assert_scalar_eq!(value.re, 0.2819065744042024, comp = abs, tol = 1e-10);
    assert_eq!(value.im, 0.0);
}

#[test]
fn unit_field_reduces_to_constant_term() {
    let spaces = same_spaces(&[8, 8], &[2, 2]);
    let with_field = discretize(
        BilinearForm::new(2)
            .grad_dot_grad(Expr::one())
            .mass(Expr::field("F"))
            .with_field("F", "V"),
        &DiscreteDomain::unit(2),
        spaces.clone(),
    );
    let constant = discretize(
        BilinearForm::new(2).grad_dot_grad(Expr::one()).mass(Expr::one()),
        &DiscreteDomain::unit(2),
        spaces.clone(),
    );

    let t = [vec![0.05, 0.31, 0.77], vec![0.12, 0.9]];
    let n = spaces.1.nbasis().iter().product();
    let field = FemField::from_coefficients(spaces.1.clone(), vec![1.0; n]);
    let a = with_field
        .evaluate(&t, Arguments::new().with_field("F", field))
        .unwrap();
    let b = constant.evaluate(&t, Arguments::new()).unwrap();
    assert_outputs_eq(&a, &b, &grid_points(&[3, 2]));
}

/// Real parts of the single cell of `expr` on the grid `t`, row-major.
fn real_values(expr: &DiscreteGltExpr, t: &[Vec<f64>], arguments: Arguments) -> Vec<f64> {
    let output = expr.evaluate(t, arguments).unwrap();
    output.cell(0, 0).to_complex_vec().iter().map(|z| z.re).collect()
}

#[test]
fn field_with_greville_coefficients_is_the_coordinate() {
    let spaces = same_spaces(&[5], &[2]);
    let domain = DiscreteDomain::unit(1);
    let plain = discretize(BilinearForm::new(1).mass(Expr::one()), &domain, spaces.clone());
    let with_value = discretize(
        BilinearForm::new(1).mass(Expr::field("F")).with_field("F", "V"),
        &domain,
        spaces.clone(),
    );
    let with_derivative = discretize(
        BilinearForm::new(1)
            .mass(Expr::field_derivative("F", &[1]))
            .with_field("F", "V"),
        &domain,
        spaces.clone(),
    );

    // F(s) = s
    let field = FemField::from_coefficients(spaces.1.clone(), spaces.1.axis(0).greville());
    let t = [vec![0.05, 0.3, 0.55, 0.95]];
    let mass = real_values(&plain, &t, Arguments::new());
    let value = real_values(&with_value, &t, Arguments::new().with_field("F", field.clone()));
    let derivative = real_values(&with_derivative, &t, Arguments::new().with_field("F", field));
    for (i, &s) in t[0].iter().enumerate() {
        assert_scalar_eq!(value[i], s * mass[i], comp = abs, tol = 1e-12);
        assert_scalar_eq!(derivative[i], mass[i], comp = abs, tol = 1e-12);
    }
}

#[test]
fn non_constant_field_matches_direct_evaluation() {
    let spaces = same_spaces(&[4, 5], &[2, 3]);
    let domain = DiscreteDomain::unit(2);
    let plain = discretize(BilinearForm::new(2).mass(Expr::one()), &domain, spaces.clone());
    let coefficient = Expr::field("F") + Expr::num(2.0) * Expr::field_derivative("F", &[0, 1]);
    let expr = discretize(
        BilinearForm::new(2).mass(coefficient).with_field("F", "V"),
        &domain,
        spaces.clone(),
    );

    let n: usize = spaces.1.nbasis().iter().product();
    let coeffs = (0..n).map(|i| ((7 * i) % 11) as f64 / 10.0 - 0.3).collect();
    let field = FemField::from_coefficients(spaces.1.clone(), coeffs);
    let t = [vec![0.1, 0.42, 0.87], vec![0.05, 0.6]];
    let mass = real_values(&plain, &t, Arguments::new());
    let values = real_values(&expr, &t, Arguments::new().with_field("F", field.clone()));

    for (flat, point) in grid_points(&[3, 2]).into_iter().enumerate() {
        let s = [t[0][point[0]], t[1][point[1]]];
        let expected = field.evaluate(&s) + 2.0 * field.evaluate_derivative(&s, &[0, 1]);
        assert_scalar_eq!(values[flat], expected * mass[flat], comp = abs, tol = 1e-12);
    }
}

#[test]
fn affine_mapping_scales_mass_and_stiffness() {
    let spaces = same_spaces(&[6], &[2]);
    let mapping = Arc::new(SplineMapping::from_control_point_fn("M", spaces.1.clone(), |s| {
        vec![2.0 * s[0] + 1.0]
    }));
    let unit = DiscreteDomain::unit(1);
    let mapped = DiscreteDomain::mapped(mapping);
    let mass = || BilinearForm::new(1).mass(Expr::one());
    let stiffness = || BilinearForm::new(1).grad_dot_grad(Expr::one());
    let weighted_mass = || BilinearForm::new(1).mass(Expr::symbol("x"));

    let t = [vec![0.15, 0.5, 0.8]];
    let plain_mass = real_values(&discretize(mass(), &unit, spaces.clone()), &t, Arguments::new());
    let plain_stiffness = real_values(&discretize(stiffness(), &unit, spaces.clone()), &t, Arguments::new());
    let mapped_mass = real_values(&discretize(mass(), &mapped, spaces.clone()), &t, Arguments::new());
    let mapped_stiffness = real_values(&discretize(stiffness(), &mapped, spaces.clone()), &t, Arguments::new());
    let physical = real_values(&discretize(weighted_mass(), &mapped, spaces.clone()), &t, Arguments::new());

    for (i, &s) in t[0].iter().enumerate() {
        assert_scalar_eq!(mapped_mass[i], 2.0 * plain_mass[i], comp = abs, tol = 1e-12);
        assert_scalar_eq!(mapped_stiffness[i], 0.5 * plain_stiffness[i], comp = abs, tol = 1e-12);
        assert_scalar_eq!(physical[i], (2.0 * s + 1.0) * 2.0 * plain_mass[i], comp = abs, tol = 1e-12);
    }

    // det J = 6 for (2 s1 + 1, 3 s2)
    let spaces = same_spaces(&[4, 5], &[2, 2]);
    let mapping = Arc::new(SplineMapping::from_control_point_fn("M", spaces.1.clone(), |s| {
        vec![2.0 * s[0] + 1.0, 3.0 * s[1]]
    }));
    let form = || BilinearForm::new(2).mass(Expr::one());
    let t = [vec![0.2, 0.7], vec![0.35, 0.9]];
    let plain = real_values(&discretize(form(), &DiscreteDomain::unit(2), spaces.clone()), &t, Arguments::new());
    let mapped = real_values(&discretize(form(), &DiscreteDomain::mapped(mapping), spaces), &t, Arguments::new());
    for (a, b) in mapped.iter().zip(&plain) {
        assert_scalar_eq!(*a, 6.0 * b, comp = abs, tol = 1e-12);
    }
}

#[test]
fn rational_mapping_matches_direct_evaluation() {
    let spaces = same_spaces(&[4], &[2]);
    let weights = vec![1.0, 0.8, 1.3, 0.9, 1.1, 1.0];
    let mapping = Arc::new(
        SplineMapping::from_control_point_fn("M", spaces.1.clone(), |s| vec![2.0 * s[0] + 1.0]).with_weights(weights),
    );
    let unit = DiscreteDomain::unit(1);
    let mapped = DiscreteDomain::mapped(mapping.clone());
    let mass = || BilinearForm::new(1).mass(Expr::symbol("x"));
    let stiffness = || BilinearForm::new(1).grad_dot_grad(Expr::one());

    let t = [vec![0.1, 0.45, 0.7, 0.95]];
    let plain_mass = real_values(
        &discretize(BilinearForm::new(1).mass(Expr::one()), &unit, spaces.clone()),
        &t,
        Arguments::new(),
    );
    let plain_stiffness = real_values(&discretize(stiffness(), &unit, spaces.clone()), &t, Arguments::new());
    let mapped_mass = real_values(&discretize(mass(), &mapped, spaces.clone()), &t, Arguments::new());
    let mapped_stiffness = real_values(&discretize(stiffness(), &mapped, spaces), &t, Arguments::new());

    for (i, &s) in t[0].iter().enumerate() {
        let x = mapping.evaluate(&[s])[0];
        let jacobian = mapping.jacobian(&[s])[(0, 0)];
        // Non-uniform weights bend the affine control polygon
        assert!((x - (2.0 * s + 1.0)).abs() > 1e-6);
        assert_scalar_eq!(mapped_mass[i], x * jacobian * plain_mass[i], comp = abs, tol = 1e-12);
        assert_scalar_eq!(mapped_stiffness[i], plain_stiffness[i] / jacobian, comp = abs, tol = 1e-12);
    }
}

#[test]
fn missing_field_is_reported() {
    let expr = discretize(
        BilinearForm::new(1).mass(Expr::field("F")).with_field("F", "V"),
        &DiscreteDomain::unit(1),
        same_spaces(&[4], &[2]),
    );
    let err = expr.evaluate(&[vec![0.5]], Arguments::new()).unwrap_err();
    assert_missing(err, "F");
}

#[test]
fn wrong_number_of_coordinate_arrays_is_reported() {
    let expr = discretize(
        BilinearForm::new(2).mass(Expr::one()),
        &DiscreteDomain::unit(2),
        same_spaces(&[4, 4], &[1, 1]),
    );
    let err = expr.evaluate(&[vec![0.5]], Arguments::new()).unwrap_err();
    assert!(matches!(
        err,
        GltError::Arguments(ArgumentMismatch::WrongCoordinateCount { expected: 2, found: 1 })
    ));
}

#[test]
fn identity_mapping_leaves_symbol_unchanged() {
    let spaces = same_spaces(&[6, 6], &[2, 2]);
    let form = || BilinearForm::new(2).grad_dot_grad(Expr::one()).mass(Expr::num(2.0));
    let plain = discretize(form(), &DiscreteDomain::unit(2), spaces.clone());
    let identity = Arc::new(SplineMapping::identity(spaces.1.clone()));
    let mapped = discretize(form(), &DiscreteDomain::mapped(identity.clone()), spaces.clone());
    assert_eq!(mapped.kernel().dependencies().len(), 1);

    let n = spaces.1.nbasis().iter().product();
    let rational = Arc::new(SplineMapping::identity(spaces.1.clone()).with_weights(vec![1.0; n]));
    let rational = discretize(form(), &DiscreteDomain::mapped(rational), spaces);
    assert!(rational.source().contains("coeff_w"));

    let t = [vec![0.1, 0.45, 0.8], vec![0.3, 0.65]];
    let expected = plain.evaluate(&t, Arguments::new()).unwrap();
    let points = grid_points(&[3, 2]);
    assert_outputs_eq(&mapped.evaluate(&t, Arguments::new()).unwrap(), &expected, &points);
    assert_outputs_eq(&rational.evaluate(&t, Arguments::new()).unwrap(), &expected, &points);
}

#[test]
fn accumulating_into_supplied_buffers() {
    let settings = KernelSettings {
        accumulate: true,
        backend: BackendConfig::default(),
    };
    let expr = DiscreteGltExpr::new(
        &GltExpr::new(BilinearForm::new(1).mass(Expr::one())),
        &DiscreteDomain::unit(1),
        same_spaces(&[4], &[1]),
        settings,
    )
    .unwrap();

    let t = [vec![0.7, 1.9]];
    let buffer = Rc::new(RefCell::new(NdArray::zeros(&[2], Dtype::Real).unwrap()));
    for _ in 0..2 {
        let output = expr
            .evaluate(&t, Arguments::new().with_output(0, 0, Rc::clone(&buffer)))
            .unwrap();
        assert!(Rc::ptr_eq(output.buffer(0, 0), &buffer));
    }

    let values = buffer.borrow().to_complex_vec();
    assert_scalar_eq!(values[0].re, 2.0 * linear_mass(4, 0.7), comp = abs, tol = 1e-12);
    assert_scalar_eq!(values[1].re, 2.0 * linear_mass(4, 1.9), comp = abs, tol = 1e-12);
}

#[test]
fn constants_and_physical_coordinates() {
    let expr = discretize(
        BilinearForm::new(1).mass(Expr::constant("kappa") * Expr::symbol("x")),
        &DiscreteDomain::unit(1),
        same_spaces(&[4], &[1]),
    );
    let t = [vec![0.7, 2.0]];

    let err = expr
        .evaluate(&t, Arguments::new().with_coordinates(0, vec![0.25, 0.5]))
        .unwrap_err();
    assert_missing(err, "kappa");

    let arguments = Arguments::new()
        .with_constant("kappa", 3.0)
        .with_coordinates(0, vec![0.25, 0.5]);
    let output = expr.evaluate(&t, arguments).unwrap();
    let values = output.cell(0, 0).to_complex_vec();
    assert_scalar_eq!(values[0].re, 3.0 * 0.25 * linear_mass(4, 0.7), comp = abs, tol = 1e-12);
    assert_scalar_eq!(values[1].re, 3.0 * 0.5 * linear_mass(4, 2.0), comp = abs, tol = 1e-12);
}

#[test]
fn matrix_symbols_evaluate_cell_by_cell() {
    let form = BilinearForm::new(2)
        .with_components(2, 2)
        .block_term(0, 0, Expr::one(), Operator::Partial(0), Operator::Partial(0))
        .block_term(0, 1, Expr::num(0.5), Operator::Identity, Operator::Identity)
        .block_term(1, 1, Expr::one(), Operator::Identity, Operator::Partial(1));
    let expr = discretize(form, &DiscreteDomain::unit(2), same_spaces(&[4, 4], &[2, 2]));
    let t = [vec![0.4, 1.2], vec![2.5]];
    let output = expr.evaluate(&t, Arguments::new()).unwrap();
    assert_eq!(output.shape(), (2, 2));

    let symbol = expr.kernel().symbol();
    for (i1, &t1) in t[0].iter().enumerate() {
        let env = |e: &Expr| match e {
            Expr::Symbol(name) if name == "t1" => Some(Complex64::new(t1, 0.0)),
            Expr::Symbol(name) if name == "t2" => Some(Complex64::new(t[1][0], 0.0)),
            _ => None,
        };
        let matrix = output.to_dmatrix(&[i1, 0]).unwrap();
        for row in 0..2 {
            for col in 0..2 {
                let expected = symbol.entry(row, col).evaluate(&env).unwrap();
                assert_scalar_eq!(matrix[(row, col)].re, expected.re, comp = abs, tol = 1e-12);
                assert_scalar_eq!(matrix[(row, col)].im, expected.im, comp = abs, tol = 1e-12);
            }
        }
        assert_eq!(matrix[(1, 0)], Complex64::new(0.0, 0.0));
        assert!(matrix[(1, 1)].im.abs() > 0.0);
    }
}

#[test]
fn mass_symbol_is_separable_in_three_dimensions() {
    let expr = discretize(
        BilinearForm::new(3).mass(Expr::one()),
        &DiscreteDomain::unit(3),
        same_spaces(&[4, 5, 6], &[1, 1, 1]),
    );
    let t = [vec![0.2, 1.0], vec![2.2], vec![0.6, 3.0]];
    let output = expr.evaluate(&t, Arguments::new()).unwrap();
    assert_eq!(output.cell(0, 0).shape(), &[2, 1, 2]);

    for point in grid_points(&[2, 1, 2]) {
        let expected = linear_mass(4, t[0][point[0]])
            * linear_mass(5, t[1][point[1]])
            * linear_mass(6, t[2][point[2]]);
        let value = output.value(0, 0, &point).unwrap();
        assert_scalar_eq!(value.re, expected, comp = abs, tol = 1e-12);
    }
}
