//! Printing of generated routines as Python-flavored source code.
use crate::ast::{BinaryOp, CodeExpr, FunctionDef, GeneratedModule, IndexItem, Stmt};
use itertools::Itertools;
use std::fmt;
use std::fmt::{Display, Formatter, Write};

const INDENT: &str = "    ";

impl CodeExpr {
    fn precedence(&self) -> u8 {
        match self {
            CodeExpr::Binary(op, _, _) => op.precedence(),
            CodeExpr::Neg(_) => 3,
            CodeExpr::Int(i) if *i < 0 => 3,
            CodeExpr::Real(x) if x.0 < 0.0 => 3,
            _ => 5,
        }
    }
}

fn fmt_operand(f: &mut Formatter<'_>, operand: &CodeExpr, parenthesize: bool) -> fmt::Result {
    if parenthesize {
        write!(f, "({})", operand)
    } else {
        write!(f, "{}", operand)
    }
}

impl Display for IndexItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IndexItem::At(expr) => write!(f, "{}", expr),
            IndexItem::Full => write!(f, ":"),
        }
    }
}

impl Display for CodeExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CodeExpr::None => write!(f, "None"),
            CodeExpr::Int(i) => write!(f, "{}", i),
            CodeExpr::Real(x) => write!(f, "{:?}", x.0),
            CodeExpr::ImaginaryUnit => write!(f, "1j"),
            CodeExpr::Var(name) => write!(f, "{}", name),
            CodeExpr::Attribute(object, name) => {
                fmt_operand(f, object, object.precedence() < 5)?;
                write!(f, ".{}", name)
            }
            CodeExpr::Index(base, items) => {
                fmt_operand(f, base, base.precedence() < 5)?;
                write!(f, "[{}]", items.iter().join(", "))
            }
            CodeExpr::Binary(op, lhs, rhs) => {
                let p = op.precedence();
                // Powers are right-associative, the other operators left-associative
                let (left_parens, right_parens) = match op {
                    BinaryOp::Pow => (lhs.precedence() <= p, rhs.precedence() < p),
                    BinaryOp::Add | BinaryOp::Mul => (lhs.precedence() < p, rhs.precedence() < p),
                    BinaryOp::Sub | BinaryOp::Div => (lhs.precedence() < p, rhs.precedence() <= p),
                };
                fmt_operand(f, lhs, left_parens)?;
                match op {
                    BinaryOp::Add | BinaryOp::Sub => write!(f, " {} ", op.symbol())?,
                    _ => write!(f, "{}", op.symbol())?,
                }
                fmt_operand(f, rhs, right_parens)
            }
            CodeExpr::Neg(operand) => {
                write!(f, "-")?;
                fmt_operand(f, operand, operand.precedence() < 4)
            }
            CodeExpr::Call(name, arguments) => write!(f, "{}({})", name, arguments.iter().join(", ")),
            CodeExpr::Len(operand) => write!(f, "len({})", operand),
            CodeExpr::Zeros { shape, dtype } => {
                if shape.len() == 1 {
                    write!(f, "zeros({}, dtype={})", shape[0], dtype.python_name())
                } else {
                    write!(f, "zeros(({}), dtype={})", shape.iter().join(", "), dtype.python_name())
                }
            }
            CodeExpr::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            CodeExpr::Tuple(items) => write!(f, "({})", items.iter().join(", ")),
        }
    }
}

fn print_block(out: &mut String, stmts: &[Stmt], level: usize) -> fmt::Result {
    let indent = INDENT.repeat(level);
    if stmts.is_empty() {
        return writeln!(out, "{}pass", indent);
    }
    for stmt in stmts {
        match stmt {
            Stmt::Assign { target, value } => writeln!(out, "{}{} = {}", indent, target, value)?,
            Stmt::AugAssign { target, value } => writeln!(out, "{}{} += {}", indent, target, value)?,
            Stmt::For { index, stop, body } => {
                writeln!(out, "{}for {} in range({}):", indent, index, stop)?;
                print_block(out, body, level + 1)?;
            }
            Stmt::IfNone { name, body } => {
                writeln!(out, "{}if {} is None:", indent, name)?;
                print_block(out, body, level + 1)?;
            }
            Stmt::Expr(expr) => writeln!(out, "{}{}", indent, expr)?,
            Stmt::Return(expr) => writeln!(out, "{}return {}", indent, expr)?,
        }
    }
    Ok(())
}

fn write_function(out: &mut String, function: &FunctionDef) -> fmt::Result {
    if let Some(header) = &function.metadata.header {
        writeln!(out, "{}", header)?;
    }
    for decorator in &function.metadata.decorators {
        if decorator.arguments.is_empty() {
            writeln!(out, "@{}", decorator.name)?;
        } else {
            writeln!(out, "@{}({})", decorator.name, decorator.arguments.join(", "))?;
        }
    }
    let arguments = function.arguments.iter().map(|a| {
        if a.optional {
            format!("{}=None", a.variable.name)
        } else {
            a.variable.name.clone()
        }
    });
    writeln!(out, "def {}({}):", function.name, arguments.format(", "))?;
    print_block(out, &function.body, 1)
}

/// Source of a single routine, without its imports.
pub fn print_function(function: &FunctionDef) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_function(&mut out, function);
    out
}

/// Source of a whole module: the imports followed by every routine.
pub fn print_module(module: &GeneratedModule) -> String {
    let mut sections = Vec::new();
    let imports = module.imports();
    if !imports.is_empty() {
        sections.push(
            imports
                .iter()
                .map(|i| format!("from {} import {}\n", i.module, i.name))
                .collect::<String>(),
        );
    }
    sections.extend(module.functions.iter().map(print_function));
    sections.join("\n\n")
}
