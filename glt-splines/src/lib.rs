//! Tensor-product B-spline spaces, fields and mappings on the unit cube.
//!
//! These are the discrete objects that generated GLT interfaces consume at evaluation time.

pub mod bspline;

mod collocation;
mod space;

pub use collocation::*;
pub use space::*;

pub extern crate nalgebra;
