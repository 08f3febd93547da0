//! Symbolic geometric mappings.
use crate::expr::Expr;

/// A symbolic mapping from the logical domain to the physical domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingDecl {
    name: String,
    ldim: usize,
}

impl MappingDecl {
    pub fn new(name: impl Into<String>, ldim: usize) -> Self {
        assert!((1..=3).contains(&ldim), "Only 1, 2 and 3 dimensions are supported.");
        Self { name: name.into(), ldim }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ldim(&self) -> usize {
        self.ldim
    }

    /// The entry `d x_component / d s_axis` of the Jacobian.
    pub fn jacobian_entry(&self, component: usize, axis: usize) -> Expr {
        let mut derivatives = vec![0; self.ldim];
        derivatives[axis] = 1;
        Expr::mapping(self.name.clone(), component, &derivatives)
    }

    pub fn jacobian(&self) -> Vec<Vec<Expr>> {
        (0..self.ldim)
            .map(|c| (0..self.ldim).map(|k| self.jacobian_entry(c, k)).collect())
            .collect()
    }

    /// The determinant of the Jacobian as an opaque atom.
    pub fn det_jacobian(&self) -> Expr {
        Expr::det_jacobian(self.name.clone())
    }

    /// The determinant of the Jacobian expanded in terms of its entries.
    pub fn det_jacobian_expr(&self) -> Expr {
        determinant(&self.jacobian()).expand()
    }

    /// Entry `(row, col)` of the adjugate of the Jacobian, so that `J^{-1} = adj(J) / det(J)`.
    pub fn adjugate_entry(&self, row: usize, col: usize) -> Expr {
        let jacobian = self.jacobian();
        if self.ldim == 1 {
            return Expr::one();
        }
        let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
        Expr::num(sign) * determinant(&minor(&jacobian, col, row))
    }
}

fn minor(matrix: &[Vec<Expr>], row: usize, col: usize) -> Vec<Vec<Expr>> {
    matrix
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != row)
        .map(|(_, r)| {
            r.iter()
                .enumerate()
                .filter(|(j, _)| *j != col)
                .map(|(_, e)| e.clone())
                .collect()
        })
        .collect()
}

/// Cofactor expansion along the first row.
fn determinant(matrix: &[Vec<Expr>]) -> Expr {
    match matrix.len() {
        0 => Expr::one(),
        1 => matrix[0][0].clone(),
        _ => Expr::sum(matrix[0].iter().enumerate().map(|(j, entry)| {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            Expr::product([Expr::num(sign), entry.clone(), determinant(&minor(matrix, 0, j))])
        })),
    }
}
