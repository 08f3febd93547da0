//! Symbolic side of `glt-codegen`.
//!
//! This crate describes bilinear forms symbolically ([`BilinearForm`], [`GltExpr`]), defines the
//! [`SymbolicEngine`] capability the code generators rely on, and provides [`GltEngine`], which
//! reduces forms on uniform tensor-product B-spline spaces to closed-form GLT symbols.

mod engine;
mod expr;
mod form;
mod glt;
mod mapping;

pub use engine::*;
pub use expr::*;
pub use form::*;
pub use glt::*;
pub use mapping::*;
