use glt_symbolic::*;
use matrixcompare::assert_scalar_eq;
use num::complex::Complex64;

/// Binds the Jacobian entry atoms to the given matrix.
fn bind_jacobian(jacobian: &[[f64; 3]; 3]) -> impl Fn(&Expr) -> Option<Complex64> + '_ {
    move |e| match e {
        Expr::Mapping(atom) if atom.order() == 1 => {
            let axis = (0..3).find(|&k| atom.derivative(k) == 1)?;
            Some(Complex64::new(jacobian[atom.component()][axis], 0.0))
        }
        _ => None,
    }
}

#[test]
fn jacobian_entries_are_first_derivatives() {
    let mapping = MappingDecl::new("M", 2);
    assert_eq!(mapping.jacobian_entry(1, 0), Expr::mapping("M", 1, &[1, 0]));
    assert_eq!(mapping.jacobian_entry(1, 0).to_string(), "x2_s1");
    assert_eq!(mapping.det_jacobian(), Expr::det_jacobian("M"));
}

#[test]
fn determinant_and_adjugate_match_numeric_values() {
    let jacobian = [[2.0, 1.0, 0.5], [0.0, 3.0, 1.0], [1.0, 0.0, 4.0]];
    let env = bind_jacobian(&jacobian);
    let mapping = MappingDecl::new("M", 3);

    let det = mapping.det_jacobian_expr().evaluate(&env).unwrap().re;
    // 2*(12 - 0) - 1*(0 - 1) + 0.5*(0 - 3)
    assert_scalar_eq!(det, 23.5, comp = abs, tol = 1e-13);

    // adj(J) * J = det(J) * I
    for row in 0..3 {
        for col in 0..3 {
            let value: f64 = (0..3)
                .map(|k| mapping.adjugate_entry(row, k).evaluate(&env).unwrap().re * jacobian[k][col])
                .sum();
            let expected = if row == col { det } else { 0.0 };
            assert_scalar_eq!(value, expected, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn one_dimensional_adjugate_is_one() {
    let mapping = MappingDecl::new("M", 1);
    assert_eq!(mapping.adjugate_entry(0, 0), Expr::one());
    assert_eq!(mapping.det_jacobian_expr(), Expr::mapping("M", 0, &[1]));
}
