//! Input/output helpers.
//!
//! - CSV ingest + typed row extraction (`ingest`)
//! - cleaned-table and comparison CSV exports (`export`)
//! - merit-order curve JSON (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
