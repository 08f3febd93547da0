//! Backend configuration and the backend specific annotations of low-level routines.
//!
//! All backends share the same routine bodies. A backend only decides which decorators or
//! headers a kernel carries, see [`BackendKind::metadata`].
use crate::ast::{Argument, Decorator, Dtype, FunctionMetadata, Import, Variable};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Plain source without annotations.
    Interpreted,
    /// Ahead-of-time compilation from type annotations (`@types(...)`).
    StaticTyped,
    /// Just-in-time compilation (`@jit`).
    Jit,
    /// Source-to-source translation driven by an export header.
    Transpiled,
}

fn default_folder() -> String {
    "__glt__".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub kind: BackendKind,
    /// Folder in which a toolchain may place generated sources and build products.
    #[serde(default = "default_folder")]
    pub folder: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "python".to_string(),
            kind: BackendKind::Interpreted,
            folder: default_folder(),
        }
    }
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            name: name.into(),
            kind,
            folder: default_folder(),
        }
    }

    /// The configuration of one of the known backends `python`, `pyccel`, `numba` and `pythran`.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "python" => BackendKind::Interpreted,
            "pyccel" => BackendKind::StaticTyped,
            "numba" => BackendKind::Jit,
            "pythran" => BackendKind::Transpiled,
            _ => return None,
        };
        Some(Self::new(name, kind))
    }
}

fn element_type(dtype: Dtype, kind: BackendKind) -> &'static str {
    match (dtype, kind) {
        (Dtype::Int, _) => "int",
        (Dtype::Real, BackendKind::Transpiled) => "float",
        (Dtype::Real, _) => "real",
        (Dtype::Complex, _) => "complex",
        (Dtype::Object, _) => "object",
    }
}

/// Type of a variable in annotation syntax, e.g. `real[:,:]`.
fn annotation(variable: &Variable, kind: BackendKind) -> String {
    let element = element_type(variable.dtype, kind);
    if variable.rank == 0 {
        element.to_string()
    } else {
        format!("{}[{}]", element, vec![":"; variable.rank].join(","))
    }
}

impl BackendKind {
    /// Annotations of a low-level routine with the given name and arguments.
    pub fn metadata(&self, name: &str, arguments: &[Argument]) -> FunctionMetadata {
        match self {
            BackendKind::Interpreted => FunctionMetadata::default(),
            BackendKind::StaticTyped => FunctionMetadata {
                decorators: vec![Decorator {
                    name: "types".to_string(),
                    arguments: arguments
                        .iter()
                        .map(|a| format!("'{}'", annotation(&a.variable, *self)))
                        .collect(),
                }],
                header: None,
            },
            BackendKind::Jit => FunctionMetadata {
                decorators: vec![Decorator {
                    name: "jit".to_string(),
                    arguments: vec![],
                }],
                header: None,
            },
            BackendKind::Transpiled => FunctionMetadata {
                decorators: vec![],
                header: Some(format!(
                    "#pythran export {}({})",
                    name,
                    arguments.iter().map(|a| annotation(&a.variable, *self)).join(", ")
                )),
            },
        }
    }

    /// Imports needed by the annotations of [`metadata`](Self::metadata).
    pub fn imports(&self) -> Vec<Import> {
        match self {
            BackendKind::StaticTyped => vec![Import::new("pyccel.decorators", "types")],
            BackendKind::Jit => vec![Import::new("numba", "jit")],
            BackendKind::Interpreted | BackendKind::Transpiled => vec![],
        }
    }
}
