//! Error types for code generation, argument checking and execution of generated routines.
use glt_symbolic::ReductionError;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Failure while building a kernel or one of its sub-kernels.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConstructionError {
    /// The symbolic engine could not reduce the form.
    SymbolReduction(ReductionError),
    /// A field atom refers to a field that was never declared with a space.
    DependencyResolution { field: String },
    /// The reduced symbol does not have the shape of the form.
    MalformedShape { expected: (usize, usize), found: (usize, usize) },
    /// A feature the code generators do not handle.
    Unsupported { reason: String },
    /// A field or constant name collides with an identifier of the generated routines.
    ReservedName { name: String },
}

impl Display for ConstructionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::SymbolReduction(err) => write!(f, "Failed to reduce symbol: {}", err),
            ConstructionError::DependencyResolution { field } => {
                write!(f, "Field {} is used in the symbol but not declared with a space", field)
            }
            ConstructionError::MalformedShape { expected, found } => write!(
                f,
                "Symbol has shape {}x{}, expected {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            ConstructionError::Unsupported { reason } => write!(f, "Unsupported: {}", reason),
            ConstructionError::ReservedName { name } => write!(
                f,
                "Name {} is not a valid identifier or collides with an identifier of the generated code",
                name
            ),
        }
    }
}

impl Error for ConstructionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConstructionError::SymbolReduction(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReductionError> for ConstructionError {
    fn from(err: ReductionError) -> Self {
        ConstructionError::SymbolReduction(err)
    }
}

/// A code generation unit was used where a different kind of unit is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    ExpectedKernel { found: String },
}

impl Display for ContractViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::ExpectedKernel { found } => write!(f, "Expected a GLT kernel, found {}", found),
        }
    }
}

impl Error for ContractViolation {}

/// The arguments supplied at evaluation time do not match the interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentMismatch {
    /// A mandatory argument was not supplied.
    Missing { name: String },
    WrongCoordinateCount { expected: usize, found: usize },
}

impl Display for ArgumentMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentMismatch::Missing { name } => write!(f, "Missing mandatory argument {}", name),
            ArgumentMismatch::WrongCoordinateCount { expected, found } => write!(
                f,
                "Expected {} arrays of evaluation points, got {}",
                expected, found
            ),
        }
    }
}

impl Error for ArgumentMismatch {}

/// The toolchain of a backend rejected the generated module.
#[derive(Debug)]
pub struct BackendError {
    pub backend: String,
    pub report: eyre::Report,
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Backend {} failed: {:?}", self.backend, self.report)
    }
}

impl Error for BackendError {}

/// Failure while executing a generated routine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuntimeError {
    UnknownRoutine(String),
    UnknownVariable(String),
    UnknownAttribute { object: String, attribute: String },
    WrongArgumentCount { routine: String, expected: usize, found: usize },
    TypeMismatch { expected: String, found: String },
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnknownRoutine(name) => write!(f, "No routine named {}", name),
            RuntimeError::UnknownVariable(name) => write!(f, "Variable {} is not defined", name),
            RuntimeError::UnknownAttribute { object, attribute } => {
                write!(f, "Object of type {} has no attribute {}", object, attribute)
            }
            RuntimeError::WrongArgumentCount {
                routine,
                expected,
                found,
            } => write!(f, "{} takes {} arguments but {} were given", routine, expected, found),
            RuntimeError::TypeMismatch { expected, found } => write!(f, "Expected {}, found {}", expected, found),
            RuntimeError::IndexOutOfBounds { index, shape } => {
                write!(f, "Index {:?} is out of bounds for array of shape {:?}", index, shape)
            }
        }
    }
}

impl Error for RuntimeError {}

/// Any error raised by `glt-codegen`.
#[derive(Debug)]
pub enum GltError {
    Construction(ConstructionError),
    Contract(ContractViolation),
    Arguments(ArgumentMismatch),
    Backend(BackendError),
    Runtime(RuntimeError),
}

impl Display for GltError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GltError::Construction(err) => write!(f, "{}", err),
            GltError::Contract(err) => write!(f, "{}", err),
            GltError::Arguments(err) => write!(f, "{}", err),
            GltError::Backend(err) => write!(f, "{}", err),
            GltError::Runtime(err) => write!(f, "{}", err),
        }
    }
}

impl Error for GltError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GltError::Construction(err) => Some(err),
            GltError::Contract(err) => Some(err),
            GltError::Arguments(err) => Some(err),
            GltError::Backend(err) => Some(err),
            GltError::Runtime(err) => Some(err),
        }
    }
}

impl From<ConstructionError> for GltError {
    fn from(err: ConstructionError) -> Self {
        GltError::Construction(err)
    }
}

impl From<ReductionError> for GltError {
    fn from(err: ReductionError) -> Self {
        GltError::Construction(err.into())
    }
}

impl From<ContractViolation> for GltError {
    fn from(err: ContractViolation) -> Self {
        GltError::Contract(err)
    }
}

impl From<ArgumentMismatch> for GltError {
    fn from(err: ArgumentMismatch) -> Self {
        GltError::Arguments(err)
    }
}

impl From<BackendError> for GltError {
    fn from(err: BackendError) -> Self {
        GltError::Backend(err)
    }
}

impl From<RuntimeError> for GltError {
    fn from(err: RuntimeError) -> Self {
        GltError::Runtime(err)
    }
}
