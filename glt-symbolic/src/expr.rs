//! Symbolic expressions appearing in GLT symbols.
//!
//! Expressions are immutable trees. The constructors [`Expr::sum`], [`Expr::product`],
//! [`Expr::pow`] and [`Expr::func`] keep expressions in a flattened form with all numeric
//! factors folded, so that structurally equal expressions compare equal.
use itertools::{iproduct, Itertools};
use num::complex::Complex64;
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::iter::repeat;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Named mathematical functions that may appear in a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MathFunction {
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Abs,
}

impl MathFunction {
    pub fn all() -> [MathFunction; 7] {
        use MathFunction::*;
        [Sqrt, Sin, Cos, Tan, Exp, Log, Abs]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqrt => "sqrt",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Abs => "abs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|f| f.name() == name)
    }

    pub fn apply_real(&self, x: f64) -> f64 {
        match self {
            Self::Sqrt => x.sqrt(),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Abs => x.abs(),
        }
    }

    pub fn apply(&self, z: Complex64) -> Complex64 {
        match self {
            Self::Sqrt => z.sqrt(),
            Self::Sin => z.sin(),
            Self::Cos => z.cos(),
            Self::Tan => z.tan(),
            Self::Exp => z.exp(),
            Self::Log => z.ln(),
            Self::Abs => Complex64::new(z.norm(), 0.0),
        }
    }
}

/// Strips trailing zeros so that e.g. `[1, 0]` and `[1]` denote the same derivative.
fn normalize_multi_index(index: &[u8]) -> Vec<u8> {
    let mut index = index.to_vec();
    while index.last() == Some(&0) {
        index.pop();
    }
    index
}

/// Label suffix of a logical derivative, e.g. `s1s1s2` for the multi-index `[2, 1]`.
fn derivative_suffix(index: &[u8]) -> String {
    index
        .iter()
        .enumerate()
        .flat_map(|(axis, &count)| repeat(axis + 1).take(count as usize))
        .map(|axis| format!("s{}", axis))
        .collect()
}

/// A scalar field, possibly decorated with logical partial derivatives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldAtom {
    name: String,
    derivatives: Vec<u8>,
}

impl FieldAtom {
    pub fn new(name: impl Into<String>, derivatives: &[u8]) -> Self {
        Self {
            name: name.into(),
            derivatives: normalize_multi_index(derivatives),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn derivatives(&self) -> &[u8] {
        &self.derivatives
    }

    /// Number of derivatives taken along the given logical axis.
    pub fn derivative(&self, axis: usize) -> u8 {
        self.derivatives.get(axis).copied().unwrap_or(0)
    }

    pub fn order(&self) -> usize {
        self.derivatives.iter().map(|&d| d as usize).sum()
    }

    /// Identifier used for this atom in generated code, e.g. `F` or `F_s1s2`.
    pub fn label(&self) -> String {
        if self.derivatives.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, derivative_suffix(&self.derivatives))
        }
    }
}

/// A component of a geometric mapping, possibly decorated with logical partial derivatives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingAtom {
    mapping: String,
    component: usize,
    derivatives: Vec<u8>,
}

impl MappingAtom {
    pub fn new(mapping: impl Into<String>, component: usize, derivatives: &[u8]) -> Self {
        Self {
            mapping: mapping.into(),
            component,
            derivatives: normalize_multi_index(derivatives),
        }
    }

    pub fn mapping(&self) -> &str {
        &self.mapping
    }

    /// Zero-based index of the physical component.
    pub fn component(&self) -> usize {
        self.component
    }

    pub fn derivatives(&self) -> &[u8] {
        &self.derivatives
    }

    pub fn derivative(&self, axis: usize) -> u8 {
        self.derivatives.get(axis).copied().unwrap_or(0)
    }

    pub fn order(&self) -> usize {
        self.derivatives.iter().map(|&d| d as usize).sum()
    }

    /// Identifier used for this atom in generated code, e.g. `x2` or `x2_s1`.
    pub fn label(&self) -> String {
        if self.derivatives.is_empty() {
            format!("x{}", self.component + 1)
        } else {
            format!("x{}_{}", self.component + 1, derivative_suffix(&self.derivatives))
        }
    }
}

/// Classification of the leaves of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomKind {
    /// Coordinates, frequencies and other free symbols.
    Symbol,
    /// Named constants supplied by the caller.
    Constant,
    Field,
    Mapping,
    DetJacobian,
    ImaginaryUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expr {
    Number(OrderedFloat<f64>),
    ImaginaryUnit,
    Symbol(String),
    Constant(String),
    Field(FieldAtom),
    Mapping(MappingAtom),
    /// Jacobian determinant of the named mapping.
    DetJacobian(String),
    Pow(Box<Expr>, i32),
    Func(MathFunction, Box<Expr>),
    Mul(Vec<Expr>),
    Add(Vec<Expr>),
}

/// Error returned when numerically evaluating an expression with an unbound atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundAtom(pub String);

impl Display for UnboundAtom {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "No value bound to atom {}", self.0)
    }
}

impl std::error::Error for UnboundAtom {}

impl Expr {
    pub fn num(value: f64) -> Self {
        Expr::Number(OrderedFloat(value))
    }

    pub fn zero() -> Self {
        Expr::num(0.0)
    }

    pub fn one() -> Self {
        Expr::num(1.0)
    }

    pub fn imaginary_unit() -> Self {
        Expr::ImaginaryUnit
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Expr::Constant(name.into())
    }

    pub fn field(name: impl Into<String>) -> Self {
        Expr::Field(FieldAtom::new(name, &[]))
    }

    /// A field decorated with logical derivatives, given as a multi-index over the axes.
    pub fn field_derivative(name: impl Into<String>, derivatives: &[u8]) -> Self {
        Expr::Field(FieldAtom::new(name, derivatives))
    }

    pub fn mapping(name: impl Into<String>, component: usize, derivatives: &[u8]) -> Self {
        Expr::Mapping(MappingAtom::new(name, component, derivatives))
    }

    pub fn det_jacobian(mapping: impl Into<String>) -> Self {
        Expr::DetJacobian(mapping.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Number(x) => Some(x.0),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number() == Some(0.0)
    }

    pub fn atom_kind(&self) -> Option<AtomKind> {
        match self {
            Expr::Symbol(_) => Some(AtomKind::Symbol),
            Expr::Constant(_) => Some(AtomKind::Constant),
            Expr::Field(_) => Some(AtomKind::Field),
            Expr::Mapping(_) => Some(AtomKind::Mapping),
            Expr::DetJacobian(_) => Some(AtomKind::DetJacobian),
            Expr::ImaginaryUnit => Some(AtomKind::ImaginaryUnit),
            _ => None,
        }
    }

    /// Builds a flattened sum, folding all numeric terms into a single leading number.
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Expr {
        fn push(term: Expr, constant: &mut f64, rest: &mut Vec<Expr>) {
            match term {
                Expr::Number(x) => *constant += x.0,
                Expr::Add(inner) => inner.into_iter().for_each(|t| push(t, constant, rest)),
                other => rest.push(other),
            }
        }

        let mut constant = 0.0;
        let mut rest = Vec::new();
        for term in terms {
            push(term, &mut constant, &mut rest);
        }

        if rest.is_empty() {
            return Expr::num(constant);
        }
        if constant != 0.0 {
            rest.insert(0, Expr::num(constant));
        }
        if rest.len() == 1 {
            rest.swap_remove(0)
        } else {
            Expr::Add(rest)
        }
    }

    /// Builds a flattened product with sorted factors, a single leading numeric coefficient
    /// and powers of the imaginary unit reduced modulo 4.
    pub fn product<I: IntoIterator<Item = Expr>>(factors: I) -> Expr {
        fn push(factor: Expr, coefficient: &mut f64, imaginary: &mut u32, rest: &mut Vec<Expr>) {
            match factor {
                Expr::Number(x) => *coefficient *= x.0,
                Expr::ImaginaryUnit => *imaginary += 1,
                Expr::Mul(inner) => inner
                    .into_iter()
                    .for_each(|f| push(f, coefficient, imaginary, rest)),
                other => rest.push(other),
            }
        }

        let mut coefficient = 1.0;
        let mut imaginary = 0;
        let mut rest = Vec::new();
        for factor in factors {
            push(factor, &mut coefficient, &mut imaginary, &mut rest);
        }

        if coefficient == 0.0 {
            return Expr::zero();
        }
        match imaginary % 4 {
            1 => rest.push(Expr::ImaginaryUnit),
            2 => coefficient = -coefficient,
            3 => {
                coefficient = -coefficient;
                rest.push(Expr::ImaginaryUnit);
            }
            _ => {}
        }
        rest.sort();

        if rest.is_empty() {
            return Expr::num(coefficient);
        }
        if coefficient != 1.0 {
            rest.insert(0, Expr::num(coefficient));
        }
        if rest.len() == 1 {
            rest.swap_remove(0)
        } else {
            Expr::Mul(rest)
        }
    }

    pub fn pow(base: Expr, exponent: i32) -> Expr {
        match (base, exponent) {
            (_, 0) => Expr::one(),
            (base, 1) => base,
            (Expr::Number(x), n) => Expr::num(x.0.powi(n)),
            (Expr::ImaginaryUnit, n) if n > 0 => Expr::product(repeat(Expr::ImaginaryUnit).take(n as usize)),
            (Expr::Pow(inner, m), n) => Expr::pow(*inner, m * n),
            (base, n) => Expr::Pow(Box::new(base), n),
        }
    }

    /// Applies a named function, folding it when the argument is a number with a finite image.
    pub fn func(function: MathFunction, argument: Expr) -> Expr {
        if let Some(x) = argument.as_number() {
            let y = function.apply_real(x);
            if y.is_finite() {
                return Expr::num(y);
            }
        }
        Expr::Func(function, Box::new(argument))
    }

    pub fn cos(argument: Expr) -> Expr {
        Expr::func(MathFunction::Cos, argument)
    }

    pub fn sin(argument: Expr) -> Expr {
        Expr::func(MathFunction::Sin, argument)
    }

    pub fn sqrt(argument: Expr) -> Expr {
        Expr::func(MathFunction::Sqrt, argument)
    }

    /// The terms of a sum, or the expression itself.
    pub fn summands(&self) -> Vec<Expr> {
        match self {
            Expr::Add(terms) => terms.clone(),
            other => vec![other.clone()],
        }
    }

    /// Splits a term into its numeric coefficient and the remaining monomial.
    fn split_coefficient(&self) -> (f64, Expr) {
        match self {
            Expr::Number(x) => (x.0, Expr::one()),
            Expr::Mul(factors) => match factors.first().and_then(Expr::as_number) {
                Some(c) => (c, Expr::product(factors[1..].iter().cloned())),
                None => (1.0, self.clone()),
            },
            other => (1.0, other.clone()),
        }
    }

    /// Combines terms of a sum that only differ in their numeric coefficient.
    fn collect_terms(self) -> Expr {
        match self {
            Expr::Add(terms) => {
                let mut monomials = BTreeMap::new();
                for term in &terms {
                    let (coefficient, monomial) = term.split_coefficient();
                    *monomials.entry(monomial).or_insert(0.0) += coefficient;
                }
                Expr::sum(
                    monomials
                        .into_iter()
                        .map(|(monomial, coefficient)| Expr::product([Expr::num(coefficient), monomial])),
                )
            }
            other => other,
        }
    }

    /// Distributes products over sums and collects like terms.
    pub fn expand(&self) -> Expr {
        let expanded = match self {
            Expr::Add(terms) => Expr::sum(terms.iter().map(Expr::expand)),
            Expr::Mul(factors) => {
                let mut summands = vec![Expr::one()];
                for factor in factors {
                    let factor_terms = factor.expand().summands();
                    summands = iproduct!(summands.iter(), factor_terms.iter())
                        .map(|(a, b)| Expr::product([a.clone(), b.clone()]))
                        .collect();
                }
                Expr::sum(summands)
            }
            Expr::Pow(base, n) if *n > 1 => {
                let base = base.expand();
                if matches!(base, Expr::Add(_)) {
                    Expr::product(repeat(base).take(*n as usize)).expand()
                } else {
                    Expr::pow(base, *n)
                }
            }
            Expr::Pow(base, n) => Expr::pow(base.expand(), *n),
            Expr::Func(function, argument) => Expr::func(*function, argument.expand()),
            leaf => leaf.clone(),
        };
        expanded.collect_terms()
    }

    /// Rebuilds the expression, replacing every sub-expression for which `f` returns a value.
    pub fn replace<F>(&self, f: &F) -> Expr
    where
        F: Fn(&Expr) -> Option<Expr>,
    {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Expr::Add(terms) => Expr::sum(terms.iter().map(|t| t.replace(f))),
            Expr::Mul(factors) => Expr::product(factors.iter().map(|t| t.replace(f))),
            Expr::Pow(base, n) => Expr::pow(base.replace(f), *n),
            Expr::Func(function, argument) => Expr::func(*function, argument.replace(f)),
            leaf => leaf.clone(),
        }
    }

    /// Renames free symbols according to the given `(old, new)` pairs.
    pub fn rename_symbols(&self, renames: &[(&str, &str)]) -> Expr {
        self.replace(&|e| match e {
            Expr::Symbol(name) => renames
                .iter()
                .find(|(old, _)| old == name)
                .map(|(_, new)| Expr::symbol(*new)),
            _ => None,
        })
    }

    /// Visits every sub-expression in pre-order.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&Expr),
    {
        f(self);
        match self {
            Expr::Add(children) | Expr::Mul(children) => children.iter().for_each(|c| c.visit(f)),
            Expr::Pow(base, _) => base.visit(f),
            Expr::Func(_, argument) => argument.visit(f),
            _ => {}
        }
    }

    /// All distinct atoms of the given kinds, in canonical order.
    pub fn atoms(&self, kinds: &[AtomKind]) -> Vec<Expr> {
        let mut atoms = BTreeSet::new();
        self.visit(&mut |e| {
            if e.atom_kind().map_or(false, |kind| kinds.contains(&kind)) {
                atoms.insert(e.clone());
            }
        });
        atoms.into_iter().collect()
    }

    pub fn field_atoms(&self) -> Vec<FieldAtom> {
        self.atoms(&[AtomKind::Field])
            .into_iter()
            .filter_map(|e| match e {
                Expr::Field(atom) => Some(atom),
                _ => None,
            })
            .collect()
    }

    pub fn mapping_atoms(&self) -> Vec<MappingAtom> {
        self.atoms(&[AtomKind::Mapping])
            .into_iter()
            .filter_map(|e| match e {
                Expr::Mapping(atom) => Some(atom),
                _ => None,
            })
            .collect()
    }

    pub fn symbol_names(&self) -> BTreeSet<String> {
        self.atoms(&[AtomKind::Symbol])
            .into_iter()
            .filter_map(|e| match e {
                Expr::Symbol(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn constant_names(&self) -> BTreeSet<String> {
        self.atoms(&[AtomKind::Constant])
            .into_iter()
            .filter_map(|e| match e {
                Expr::Constant(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn has_imaginary_unit(&self) -> bool {
        !self.atoms(&[AtomKind::ImaginaryUnit]).is_empty()
    }

    /// The highest total derivative order over all field and mapping atoms.
    pub fn max_derivative_order(&self) -> usize {
        let mut order = 0;
        self.visit(&mut |e| match e {
            Expr::Field(atom) => order = order.max(atom.order()),
            Expr::Mapping(atom) => order = order.max(atom.order()),
            _ => {}
        });
        order
    }

    pub fn math_functions(&self) -> BTreeSet<MathFunction> {
        let mut functions = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Func(function, _) = e {
                functions.insert(*function);
            }
        });
        functions
    }

    /// Numerically evaluates the expression, looking up the value of every atom in `env`.
    pub fn evaluate<F>(&self, env: &F) -> Result<Complex64, UnboundAtom>
    where
        F: Fn(&Expr) -> Option<Complex64>,
    {
        match self {
            Expr::Number(x) => Ok(Complex64::new(x.0, 0.0)),
            Expr::ImaginaryUnit => Ok(Complex64::i()),
            Expr::Add(terms) => terms
                .iter()
                .try_fold(Complex64::new(0.0, 0.0), |acc, t| Ok(acc + t.evaluate(env)?)),
            Expr::Mul(factors) => factors
                .iter()
                .try_fold(Complex64::new(1.0, 0.0), |acc, t| Ok(acc * t.evaluate(env)?)),
            Expr::Pow(base, n) => Ok(base.evaluate(env)?.powi(*n)),
            Expr::Func(function, argument) => Ok(function.apply(argument.evaluate(env)?)),
            atom => env(atom).ok_or_else(|| UnboundAtom(atom.to_string())),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(_) => 1,
            Expr::Number(x) if x.0 < 0.0 => 1,
            Expr::Mul(_) => 2,
            Expr::Pow(_, _) => 3,
            _ => 4,
        }
    }
}

fn fmt_operand(f: &mut Formatter<'_>, operand: &Expr, min_precedence: u8) -> fmt::Result {
    if operand.precedence() < min_precedence {
        write!(f, "({})", operand)
    } else {
        write!(f, "{}", operand)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(x) => write!(f, "{:?}", x.0),
            Expr::ImaginaryUnit => write!(f, "I"),
            Expr::Symbol(name) | Expr::Constant(name) => write!(f, "{}", name),
            Expr::Field(atom) => write!(f, "{}", atom.label()),
            Expr::Mapping(atom) => write!(f, "{}", atom.label()),
            Expr::DetJacobian(mapping) => write!(f, "det_jacobian({})", mapping),
            Expr::Add(terms) => write!(f, "{}", terms.iter().join(" + ")),
            Expr::Mul(factors) => {
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    // A leading negative coefficient reads fine without parentheses
                    let min_precedence = if i == 0 { 1 } else { 2 };
                    fmt_operand(f, factor, min_precedence)?;
                }
                Ok(())
            }
            Expr::Pow(base, n) => {
                fmt_operand(f, base, 4)?;
                if *n < 0 {
                    write!(f, "**({})", n)
                } else {
                    write!(f, "**{}", n)
                }
            }
            Expr::Func(function, argument) => write!(f, "{}({})", function.name(), argument),
        }
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs])
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum([self, -rhs])
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::product([self, rhs])
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::product([self, Expr::pow(rhs, -1)])
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::product([Expr::num(-1.0), self])
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::num(value)
    }
}

/// A reduced symbol, either scalar or matrix-valued.
///
/// The shape of a symbol is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GltSymbol {
    Scalar(Expr),
    Matrix { rows: usize, cols: usize, entries: Vec<Expr> },
}

impl GltSymbol {
    /// Creates a matrix symbol from row-major entries.
    ///
    /// # Panics
    ///
    /// Panics if the number of entries does not match the shape.
    pub fn matrix(rows: usize, cols: usize, entries: Vec<Expr>) -> Self {
        assert_eq!(entries.len(), rows * cols, "Number of entries must match the shape.");
        GltSymbol::Matrix { rows, cols, entries }
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            GltSymbol::Scalar(_) => (1, 1),
            GltSymbol::Matrix { rows, cols, .. } => (*rows, *cols),
        }
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, GltSymbol::Matrix { .. })
    }

    /// Row-major entries; a scalar symbol has exactly one.
    pub fn entries(&self) -> &[Expr] {
        match self {
            GltSymbol::Scalar(expr) => std::slice::from_ref(expr),
            GltSymbol::Matrix { entries, .. } => entries,
        }
    }

    pub fn entry(&self, row: usize, col: usize) -> &Expr {
        let (_, cols) = self.shape();
        &self.entries()[row * cols + col]
    }

    /// Applies `f` to every entry, preserving the shape.
    pub fn map(&self, f: impl Fn(&Expr) -> Expr) -> GltSymbol {
        match self {
            GltSymbol::Scalar(expr) => GltSymbol::Scalar(f(expr)),
            GltSymbol::Matrix { rows, cols, entries } => GltSymbol::Matrix {
                rows: *rows,
                cols: *cols,
                entries: entries.iter().map(f).collect(),
            },
        }
    }
}
