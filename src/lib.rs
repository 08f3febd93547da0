//! Generation of evaluation kernels for GLT symbols of discretized bilinear forms.
//!
//! The pipeline reduces a [`GltExpr`](glt_symbolic::GltExpr) to a closed-form symbol, lowers the
//! symbol to a loop-based [`kernel::GltKernel`] working on flat buffers, wraps the kernel in an
//! [`interface::GltInterface`] adapting spline objects to the kernel arguments, and finally
//! compiles both with a [`runtime::Toolchain`]. [`discrete::DiscreteGltExpr`] ties these steps
//! together.

pub mod ast;
pub mod backend;
pub mod cache;
pub mod discrete;
pub mod error;
pub mod evaluation;
pub mod interface;
pub mod kernel;
pub mod lowering;
pub mod printer;
pub mod runtime;

mod objects;

pub extern crate glt_splines;
pub extern crate glt_symbolic;
pub extern crate nalgebra;
