//! Plotting: ASCII charts for the terminal and SVG chart exports.

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;
