//! Common infrastructure for the sipmedia crates
//!
//! - [`logging`]: tracing subscriber setup
//! - [`config`]: TOML configuration loading
//! - [`errors`]: error type shared by both

pub mod config;
pub mod errors;
pub mod logging;

pub use errors::types::{Error, Result};
