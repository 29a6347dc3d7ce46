//! `merit-order` library crate.
//!
//! The binary (`merit`) is a thin wrapper around this library so that:
//!
//! - validation, cleaning and clearing are testable without spawning processes
//! - the clearing engine can be reused on already-typed offers
//! - code stays easy to navigate as the project grows

pub mod analysis;
pub mod app;
pub mod clean;
pub mod clearing;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod validate;
