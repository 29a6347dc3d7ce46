//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the in-memory `Table` every raw extract is loaded into
//! - typed rows (`OfferRow`, `SettlementRow`) and the dataset kinds they come from
//! - the market bounds table and the bound-kind inference rules
//! - validation/cleaning configuration and its JSON overrides

pub mod bounds;
pub mod config;
pub mod table;
pub mod types;

pub use bounds::*;
pub use config::*;
pub use table::*;
pub use types::*;
