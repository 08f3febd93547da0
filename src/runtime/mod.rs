//! Execution of generated modules.
//!
//! Generated modules are handed to a [`Toolchain`], which turns them into a [`CompiledModule`]
//! whose routines can be called with positional [`Value`]s. The [`Interpreter`] executes the
//! routines directly from their AST and is the default toolchain for every backend.
use crate::ast::GeneratedModule;
use crate::backend::BackendConfig;
use crate::error::RuntimeError;
use num::complex::Complex64;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::Arc;

mod array;
mod interpreter;

pub use array::*;
pub use interpreter::*;

/// A domain object passed opaquely through generated routines, which may only read its
/// attributes.
pub trait DomainObject: Debug {
    fn type_name(&self) -> &'static str;

    fn attribute(&self, name: &str) -> Option<Value>;
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Int(i64),
    Real(f64),
    Complex(Complex64),
    /// Arrays are shared, so that a routine writes into buffers supplied by its caller.
    Array(Rc<RefCell<NdArray>>),
    Tuple(Vec<Value>),
    Object(Rc<dyn DomainObject>),
}

impl Value {
    pub fn array(array: NdArray) -> Self {
        Value::Array(Rc::new(RefCell::new(array)))
    }

    pub fn object(object: impl DomainObject + 'static) -> Self {
        Value::Object(Rc::new(object))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Real(_) => "float".to_string(),
            Value::Complex(_) => "complex".to_string(),
            Value::Array(array) => format!("{}-array", array.borrow().dtype().python_name()),
            Value::Tuple(_) => "tuple".to_string(),
            Value::Object(object) => object.type_name().to_string(),
        }
    }

    /// The value of a numeric scalar as a complex number.
    pub fn as_complex(&self) -> Option<Complex64> {
        match self {
            Value::Int(x) => Some(Complex64::new(*x as f64, 0.0)),
            Value::Real(x) => Some(Complex64::new(*x, 0.0)),
            Value::Complex(z) => Some(*z),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Rc<RefCell<NdArray>>> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<Complex64> for Value {
    fn from(value: Complex64) -> Self {
        Value::Complex(value)
    }
}

impl From<NdArray> for Value {
    fn from(array: NdArray) -> Self {
        Value::array(array)
    }
}

/// A module whose routines can be called.
pub trait CompiledModule: Send + Sync {
    fn routines(&self) -> Vec<String>;

    fn call(&self, routine: &str, arguments: Vec<Value>) -> Result<Value, RuntimeError>;
}

/// Turns generated modules into callable modules for a backend.
pub trait Toolchain: Send + Sync {
    fn compile(
        &self,
        module: &GeneratedModule,
        source: &str,
        backend: &BackendConfig,
    ) -> eyre::Result<Arc<dyn CompiledModule>>;
}
