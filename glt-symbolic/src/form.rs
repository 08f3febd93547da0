//! Symbolic description of bilinear forms.
use crate::expr::Expr;
use std::collections::BTreeSet;

/// Names of the physical coordinates along each axis.
pub const SPACE_SYMBOLS: [&str; 3] = ["x", "y", "z"];

/// A differential operator applied to a test or trial function.
///
/// Axes are physical axes; on a domain without mapping they coincide with the logical axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Identity,
    Partial(usize),
    SecondPartial(usize, usize),
}

impl Operator {
    pub fn order(&self) -> usize {
        match self {
            Operator::Identity => 0,
            Operator::Partial(_) => 1,
            Operator::SecondPartial(_, _) => 2,
        }
    }

    pub fn axes(&self) -> Vec<usize> {
        match *self {
            Operator::Identity => vec![],
            Operator::Partial(i) => vec![i],
            Operator::SecondPartial(i, j) => vec![i, j],
        }
    }

    /// Number of derivatives along each of the `dim` axes.
    pub fn multi_index(&self, dim: usize) -> Vec<u8> {
        let mut index = vec![0; dim];
        for axis in self.axes() {
            index[axis] += 1;
        }
        index
    }
}

/// One term `coefficient * test_op(v)[test_component] * trial_op(u)[trial_component]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormTerm {
    pub coefficient: Expr,
    pub test: Operator,
    pub trial: Operator,
    pub test_component: usize,
    pub trial_component: usize,
}

/// A scalar field appearing in coefficients, together with the space it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldDecl {
    pub name: String,
    pub space: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BilinearForm {
    ldim: usize,
    test_components: usize,
    trial_components: usize,
    fields: Vec<FieldDecl>,
    terms: Vec<FormTerm>,
}

impl BilinearForm {
    /// A form over scalar test and trial functions on a `ldim`-dimensional domain.
    pub fn new(ldim: usize) -> Self {
        assert!((1..=3).contains(&ldim), "Only 1, 2 and 3 dimensions are supported.");
        Self {
            ldim,
            test_components: 1,
            trial_components: 1,
            fields: Vec::new(),
            terms: Vec::new(),
        }
    }

    /// Sets the number of components of vector-valued test and trial functions.
    pub fn with_components(mut self, test_components: usize, trial_components: usize) -> Self {
        self.test_components = test_components;
        self.trial_components = trial_components;
        self
    }

    /// Declares a scalar field living in the named space.
    pub fn with_field(mut self, name: impl Into<String>, space: impl Into<String>) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            space: space.into(),
        });
        self
    }

    pub fn term(self, coefficient: Expr, test: Operator, trial: Operator) -> Self {
        self.block_term(0, 0, coefficient, test, trial)
    }

    pub fn block_term(
        mut self,
        test_component: usize,
        trial_component: usize,
        coefficient: Expr,
        test: Operator,
        trial: Operator,
    ) -> Self {
        self.terms.push(FormTerm {
            coefficient,
            test,
            trial,
            test_component,
            trial_component,
        });
        self
    }

    /// Adds `coefficient * dot(grad(v), grad(u))`.
    pub fn grad_dot_grad(self, coefficient: Expr) -> Self {
        (0..self.ldim).fold(self, |form, axis| {
            form.term(coefficient.clone(), Operator::Partial(axis), Operator::Partial(axis))
        })
    }

    /// Adds `coefficient * v * u`.
    pub fn mass(self, coefficient: Expr) -> Self {
        self.term(coefficient, Operator::Identity, Operator::Identity)
    }

    /// Adds `coefficient * v * du/dx_axis`.
    pub fn advection(self, coefficient: Expr, axis: usize) -> Self {
        self.term(coefficient, Operator::Identity, Operator::Partial(axis))
    }

    pub fn ldim(&self) -> usize {
        self.ldim
    }

    pub fn test_components(&self) -> usize {
        self.test_components
    }

    pub fn trial_components(&self) -> usize {
        self.trial_components
    }

    pub fn terms(&self) -> &[FormTerm] {
        &self.terms
    }

    pub fn declared_fields(&self) -> &[FieldDecl] {
        &self.fields
    }
}

/// The GLT symbol of a bilinear form, prior to discretization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GltExpr {
    form: BilinearForm,
}

impl GltExpr {
    pub fn new(form: BilinearForm) -> Self {
        Self { form }
    }

    pub fn form(&self) -> &BilinearForm {
        &self.form
    }

    pub fn ldim(&self) -> usize {
        self.form.ldim
    }

    fn coefficient_atoms<T: Ord>(&self, f: impl Fn(&Expr) -> Vec<T>) -> BTreeSet<T> {
        self.form.terms.iter().flat_map(|t| f(&t.coefficient)).collect()
    }

    /// Names of all fields appearing in the coefficients, sorted.
    pub fn field_names(&self) -> Vec<String> {
        self.coefficient_atoms(|e| e.field_atoms().into_iter().map(|a| a.name().to_string()).collect())
            .into_iter()
            .collect()
    }

    /// Declarations of the fields appearing in the coefficients, sorted by name.
    ///
    /// Fields used without a declaration are omitted.
    pub fn fields(&self) -> Vec<&FieldDecl> {
        self.field_names()
            .iter()
            .filter_map(|name| self.field(name))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.form.fields.iter().find(|decl| decl.name == name)
    }

    pub fn field_space(&self, name: &str) -> Option<&str> {
        self.field(name).map(|decl| decl.space.as_str())
    }

    /// Names of the constants appearing in the coefficients, sorted.
    pub fn constants(&self) -> Vec<String> {
        self.coefficient_atoms(|e| e.constant_names().into_iter().collect())
            .into_iter()
            .collect()
    }

    /// Physical coordinate symbols (`x`, `y`, `z`) appearing in the coefficients.
    pub fn space_variables(&self) -> Vec<String> {
        let used = self.coefficient_atoms(|e| e.symbol_names().into_iter().collect());
        SPACE_SYMBOLS[..self.ldim()]
            .iter()
            .filter(|s| used.contains(**s))
            .map(|s| s.to_string())
            .collect()
    }
}
