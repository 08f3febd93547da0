use crate::ast::{BinaryOp, CodeExpr, FunctionDef, GeneratedModule, IndexItem, Stmt};
use crate::backend::BackendConfig;
use crate::error::RuntimeError;
use crate::runtime::{CompiledModule, NdArray, Toolchain, Value};
use eyre::eyre;
use glt_symbolic::MathFunction;
use log::debug;
use num::complex::Complex64;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Executes generated modules directly from their AST.
///
/// Backend annotations are ignored, so the interpreter accepts modules for every backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Toolchain for Interpreter {
    fn compile(
        &self,
        module: &GeneratedModule,
        _source: &str,
        backend: &BackendConfig,
    ) -> eyre::Result<Arc<dyn CompiledModule>> {
        for function in &module.functions {
            for callee in function.callees() {
                if module.function(&callee).is_none() {
                    return Err(eyre!("{} calls undefined routine {}", function.name, callee));
                }
            }
        }
        debug!(
            "Loaded module {} with {} routines for backend {}",
            module.name,
            module.functions.len(),
            backend.name
        );
        Ok(Arc::new(InterpretedModule { module: module.clone() }))
    }
}

#[derive(Debug, Clone)]
pub struct InterpretedModule {
    module: GeneratedModule,
}

type Frame = FxHashMap<String, Value>;

enum Flow {
    Next,
    Return(Value),
}

fn type_mismatch(expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name(),
    }
}

fn to_index(value: &Value) -> Result<usize, RuntimeError> {
    match value {
        Value::Int(i) if *i >= 0 => Ok(*i as usize),
        other => Err(type_mismatch("non-negative int", other)),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    use BinaryOp::*;
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(match op {
            Add => Value::Int(a + b),
            Sub => Value::Int(a - b),
            Mul => Value::Int(a * b),
            Div => Value::Real(*a as f64 / *b as f64),
            Pow if *b >= 0 => Value::Int(a.pow(*b as u32)),
            Pow => Value::Real((*a as f64).powi(*b as i32)),
        }),
        (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
            let real = |v: &Value| v.as_complex().map_or(f64::NAN, |z| z.re);
            let (a, b) = (real(lhs), real(rhs));
            Ok(Value::Real(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Pow => match rhs {
                    Value::Int(n) => a.powi(*n as i32),
                    _ => a.powf(b),
                },
            }))
        }
        _ => {
            let a = lhs.as_complex().ok_or_else(|| type_mismatch("number", lhs))?;
            let b = rhs.as_complex().ok_or_else(|| type_mismatch("number", rhs))?;
            Ok(Value::Complex(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Pow => match rhs {
                    Value::Int(n) => a.powi(*n as i32),
                    _ => a.powc(b),
                },
            }))
        }
    }
}

fn apply_function(function: MathFunction, argument: &Value) -> Result<Value, RuntimeError> {
    match argument {
        Value::Int(i) => Ok(Value::Real(function.apply_real(*i as f64))),
        Value::Real(x) => Ok(Value::Real(function.apply_real(*x))),
        Value::Complex(z) => Ok(Value::Complex(function.apply(*z))),
        other => Err(type_mismatch("number", other)),
    }
}

impl InterpretedModule {
    fn function(&self, name: &str) -> Result<&FunctionDef, RuntimeError> {
        self.module
            .function(name)
            .ok_or_else(|| RuntimeError::UnknownRoutine(name.to_string()))
    }

    fn indices(&self, items: &[IndexItem], frame: &mut Frame) -> Result<Option<Vec<usize>>, RuntimeError> {
        if items.iter().all(|item| matches!(item, IndexItem::Full)) {
            return Ok(None);
        }
        items
            .iter()
            .map(|item| match item {
                IndexItem::At(expr) => to_index(&self.eval(expr, frame)?),
                IndexItem::Full => Err(RuntimeError::TypeMismatch {
                    expected: "index".to_string(),
                    found: "partial slice".to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn eval(&self, expr: &CodeExpr, frame: &mut Frame) -> Result<Value, RuntimeError> {
        match expr {
            CodeExpr::None => Ok(Value::None),
            CodeExpr::Int(i) => Ok(Value::Int(*i)),
            CodeExpr::Real(x) => Ok(Value::Real(x.0)),
            CodeExpr::ImaginaryUnit => Ok(Value::Complex(Complex64::i())),
            CodeExpr::Var(name) => frame
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::UnknownVariable(name.clone())),
            CodeExpr::Attribute(object, name) => match self.eval(object, frame)? {
                Value::Object(object) => object
                    .attribute(name)
                    .ok_or_else(|| RuntimeError::UnknownAttribute {
                        object: object.type_name().to_string(),
                        attribute: name.clone(),
                    }),
                other => Err(RuntimeError::UnknownAttribute {
                    object: other.type_name(),
                    attribute: name.clone(),
                }),
            },
            CodeExpr::Index(base, items) => {
                let base = self.eval(base, frame)?;
                let indices = self.indices(items, frame)?;
                match (base, indices) {
                    (Value::Array(array), Some(indices)) => {
                        let value = array.borrow().get(&indices);
                        value
                    }
                    (Value::Tuple(values), Some(indices)) if indices.len() == 1 => {
                        values
                            .get(indices[0])
                            .cloned()
                            .ok_or_else(|| RuntimeError::IndexOutOfBounds {
                                index: indices,
                                shape: vec![values.len()],
                            })
                    }
                    (other, _) => Err(type_mismatch("indexable value", &other)),
                }
            }
            CodeExpr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, frame)?;
                let rhs = self.eval(rhs, frame)?;
                arithmetic(*op, &lhs, &rhs)
            }
            CodeExpr::Neg(operand) => {
                let operand = self.eval(operand, frame)?;
                arithmetic(BinaryOp::Sub, &Value::Int(0), &operand)
            }
            CodeExpr::Call(name, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(|a| self.eval(a, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                match MathFunction::from_name(name) {
                    Some(function) if arguments.len() == 1 => apply_function(function, &arguments[0]),
                    _ => self.call(name, arguments),
                }
            }
            CodeExpr::Len(operand) => match self.eval(operand, frame)? {
                Value::Array(array) => {
                    let len = array.borrow().shape().first().copied().unwrap_or(0);
                    Ok(Value::Int(len as i64))
                }
                Value::Tuple(values) => Ok(Value::Int(values.len() as i64)),
                other => Err(type_mismatch("array", &other)),
            },
            CodeExpr::Zeros { shape, dtype } => {
                let shape = shape
                    .iter()
                    .map(|s| to_index(&self.eval(s, frame)?))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(NdArray::zeros(&shape, *dtype)?))
            }
            CodeExpr::Tuple(items) => Ok(Value::Tuple(
                items
                    .iter()
                    .map(|item| self.eval(item, frame))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }

    fn assign(&self, target: &CodeExpr, value: Value, frame: &mut Frame, augmented: bool) -> Result<(), RuntimeError> {
        match target {
            CodeExpr::Var(name) => {
                let value = if augmented {
                    let current = self.eval(target, frame)?;
                    arithmetic(BinaryOp::Add, &current, &value)?
                } else {
                    value
                };
                frame.insert(name.clone(), value);
                Ok(())
            }
            CodeExpr::Index(base, items) => {
                let array = match self.eval(base, frame)? {
                    Value::Array(array) => array,
                    other => return Err(type_mismatch("array", &other)),
                };
                let indices = self.indices(items, frame)?;
                let mut array = array.borrow_mut();
                match indices {
                    None if !augmented => array.fill(&value),
                    None => Err(RuntimeError::TypeMismatch {
                        expected: "index".to_string(),
                        found: "full slice".to_string(),
                    }),
                    Some(indices) => {
                        let value = if augmented {
                            arithmetic(BinaryOp::Add, &array.get(&indices)?, &value)?
                        } else {
                            value
                        };
                        array.set(&indices, &value)
                    }
                }
            }
            other => Err(RuntimeError::TypeMismatch {
                expected: "assignable target".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn exec(&self, stmts: &[Stmt], frame: &mut Frame) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match stmt {
                Stmt::Assign { target, value } => {
                    let value = self.eval(value, frame)?;
                    self.assign(target, value, frame, false)?;
                }
                Stmt::AugAssign { target, value } => {
                    let value = self.eval(value, frame)?;
                    self.assign(target, value, frame, true)?;
                }
                Stmt::For { index, stop, body } => {
                    let stop = to_index(&self.eval(stop, frame)?)?;
                    for i in 0..stop {
                        frame.insert(index.clone(), Value::Int(i as i64));
                        if let Flow::Return(value) = self.exec(body, frame)? {
                            return Ok(Flow::Return(value));
                        }
                    }
                }
                Stmt::IfNone { name, body } => {
                    let is_none = frame.get(name).map_or(true, Value::is_none);
                    if is_none {
                        if let Flow::Return(value) = self.exec(body, frame)? {
                            return Ok(Flow::Return(value));
                        }
                    }
                }
                Stmt::Expr(expr) => {
                    self.eval(expr, frame)?;
                }
                Stmt::Return(expr) => return Ok(Flow::Return(self.eval(expr, frame)?)),
            }
        }
        Ok(Flow::Next)
    }
}

impl CompiledModule for InterpretedModule {
    fn routines(&self) -> Vec<String> {
        self.module.functions.iter().map(|f| f.name.clone()).collect()
    }

    fn call(&self, routine: &str, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let function = self.function(routine)?;
        let required = function.arguments.iter().filter(|a| !a.optional).count();
        if arguments.len() < required || arguments.len() > function.arguments.len() {
            return Err(RuntimeError::WrongArgumentCount {
                routine: routine.to_string(),
                expected: function.arguments.len(),
                found: arguments.len(),
            });
        }

        let mut frame = Frame::default();
        let mut arguments = arguments.into_iter();
        for parameter in &function.arguments {
            let value = arguments.next().unwrap_or(Value::None);
            frame.insert(parameter.variable.name.clone(), value);
        }

        match self.exec(&function.body, &mut frame)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::None),
        }
    }
}
