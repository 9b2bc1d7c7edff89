//! Mathematical utilities: least squares, descriptive statistics, grids.

pub mod grid;
pub mod ols;
pub mod stats;

pub use grid::*;
pub use ols::*;
pub use stats::*;
