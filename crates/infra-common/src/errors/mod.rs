//! Error handling for infrastructure components

pub mod types;
