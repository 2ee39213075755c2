//! Logging setup built on `tracing-subscriber`

mod setup;

pub use setup::{setup_logging, try_setup_logging, LoggingConfig};
