//! A small AST for the generated routines.
//!
//! The AST only covers what the GLT code generators emit: scalar and array variables, loops over
//! ranges, indexed (augmented) assignments, calls and returns. The same tree is printed as
//! source by [`crate::printer`] and executed directly by [`crate::runtime::Interpreter`].
use ordered_float::OrderedFloat;
use std::ops::{Add, Mul};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    Int,
    Real,
    Complex,
    /// Opaque domain objects such as spaces and fields.
    Object,
}

impl Dtype {
    /// Name of the type as a dtype argument, e.g. `zeros(k1, dtype=float)`.
    pub fn python_name(&self) -> &'static str {
        match self {
            Dtype::Int => "int",
            Dtype::Real => "float",
            Dtype::Complex => "complex",
            Dtype::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub name: String,
    pub dtype: Dtype,
    pub rank: usize,
}

impl Variable {
    pub fn new(name: impl Into<String>, dtype: Dtype, rank: usize) -> Self {
        Self {
            name: name.into(),
            dtype,
            rank,
        }
    }

    pub fn scalar(name: impl Into<String>, dtype: Dtype) -> Self {
        Self::new(name, dtype, 0)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, Dtype::Object, 0)
    }

    pub fn expr(&self) -> CodeExpr {
        CodeExpr::var(&self.name)
    }

    /// `name[i1, i2, ...]` for the given index variables.
    pub fn at(&self, indices: &[String]) -> CodeExpr {
        CodeExpr::Index(
            Box::new(self.expr()),
            indices.iter().map(|i| IndexItem::At(CodeExpr::var(i))).collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexItem {
    At(CodeExpr),
    /// The full slice `:`.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodeExpr {
    None,
    Int(i64),
    Real(OrderedFloat<f64>),
    ImaginaryUnit,
    Var(String),
    Attribute(Box<CodeExpr>, String),
    Index(Box<CodeExpr>, Vec<IndexItem>),
    Binary(BinaryOp, Box<CodeExpr>, Box<CodeExpr>),
    Neg(Box<CodeExpr>),
    /// Call of a routine of the module or of an imported function.
    Call(String, Vec<CodeExpr>),
    Len(Box<CodeExpr>),
    Zeros { shape: Vec<CodeExpr>, dtype: Dtype },
    Tuple(Vec<CodeExpr>),
}

impl CodeExpr {
    pub fn var(name: impl Into<String>) -> Self {
        CodeExpr::Var(name.into())
    }

    pub fn real(value: f64) -> Self {
        CodeExpr::Real(OrderedFloat(value))
    }

    pub fn binary(op: BinaryOp, lhs: CodeExpr, rhs: CodeExpr) -> Self {
        CodeExpr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn attribute(self, name: impl Into<String>) -> Self {
        CodeExpr::Attribute(Box::new(self), name.into())
    }

    /// `self[i]` with a single integer index.
    pub fn item(self, index: usize) -> Self {
        CodeExpr::Index(Box::new(self), vec![IndexItem::At(CodeExpr::Int(index as i64))])
    }

    /// `self[:, ..., :]` covering `rank` axes.
    pub fn full_slice(self, rank: usize) -> Self {
        CodeExpr::Index(Box::new(self), vec![IndexItem::Full; rank])
    }

    /// Left-folds the operands with `op`, or returns `empty` if there are none.
    pub fn fold(op: BinaryOp, operands: impl IntoIterator<Item = CodeExpr>, empty: CodeExpr) -> CodeExpr {
        operands
            .into_iter()
            .reduce(|acc, operand| CodeExpr::binary(op, acc, operand))
            .unwrap_or(empty)
    }
}

impl Add for CodeExpr {
    type Output = CodeExpr;

    fn add(self, rhs: CodeExpr) -> CodeExpr {
        CodeExpr::binary(BinaryOp::Add, self, rhs)
    }
}

impl Mul for CodeExpr {
    type Output = CodeExpr;

    fn mul(self, rhs: CodeExpr) -> CodeExpr {
        CodeExpr::binary(BinaryOp::Mul, self, rhs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stmt {
    Assign { target: CodeExpr, value: CodeExpr },
    /// `target += value`
    AugAssign { target: CodeExpr, value: CodeExpr },
    /// `for index in range(stop):`
    For { index: String, stop: CodeExpr, body: Vec<Stmt> },
    /// `if name is None:`
    IfNone { name: String, body: Vec<Stmt> },
    Expr(CodeExpr),
    Return(CodeExpr),
}

impl Stmt {
    pub fn assign(target: CodeExpr, value: CodeExpr) -> Self {
        Stmt::Assign { target, value }
    }

    pub fn aug_assign(target: CodeExpr, value: CodeExpr) -> Self {
        Stmt::AugAssign { target, value }
    }

    /// Wraps `body` in loops over `indices`, outermost first.
    pub fn loop_nest(indices: &[String], stops: &[CodeExpr], body: Vec<Stmt>) -> Vec<Stmt> {
        assert_eq!(indices.len(), stops.len());
        indices.iter().zip(stops).rev().fold(body, |body, (index, stop)| {
            vec![Stmt::For {
                index: index.clone(),
                stop: stop.clone(),
                body,
            }]
        })
    }
}

/// `from module import name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Import {
    pub module: String,
    pub name: String,
}

impl Import {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decorator {
    pub name: String,
    pub arguments: Vec<String>,
}

/// Backend specific annotations of a routine. They never change its body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FunctionMetadata {
    pub decorators: Vec<Decorator>,
    /// A comment line printed right above the routine.
    pub header: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Argument {
    pub variable: Variable,
    /// Optional arguments default to `None`.
    pub optional: bool,
}

impl Argument {
    pub fn required(variable: Variable) -> Self {
        Self {
            variable,
            optional: false,
        }
    }

    pub fn optional(variable: Variable) -> Self {
        Self { variable, optional: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionDef {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub body: Vec<Stmt>,
    pub imports: Vec<Import>,
    pub metadata: FunctionMetadata,
}

impl FunctionDef {
    pub fn argument_names(&self) -> Vec<&str> {
        self.arguments.iter().map(|a| a.variable.name.as_str()).collect()
    }

    /// Names of the routines this routine calls.
    pub fn callees(&self) -> Vec<String> {
        fn visit(stmts: &[Stmt], callees: &mut Vec<String>) {
            for stmt in stmts {
                match stmt {
                    Stmt::Expr(CodeExpr::Call(name, _)) => callees.push(name.clone()),
                    Stmt::For { body, .. } | Stmt::IfNone { body, .. } => visit(body, callees),
                    _ => {}
                }
            }
        }
        let mut callees = Vec::new();
        visit(&self.body, &mut callees);
        callees
    }
}

/// The routines generated for one discrete expression, dependencies first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneratedModule {
    pub name: String,
    pub functions: Vec<FunctionDef>,
}

impl GeneratedModule {
    /// Imports of all routines, without duplicates, in order of first appearance.
    pub fn imports(&self) -> Vec<Import> {
        let mut imports: Vec<Import> = Vec::new();
        for import in self.functions.iter().flat_map(|f| &f.imports) {
            if !imports.contains(import) {
                imports.push(import.clone());
            }
        }
        imports
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }
}
