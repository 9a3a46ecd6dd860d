//! Ptycho Core - Domain models, plugin registry, and configuration
//!
//! This crate contains the core domain types and port definitions shared by the
//! reconstruction pipeline and the automation subsystem.

pub mod config;
pub mod error;
pub mod models;
pub mod plugins;
pub mod ports;

pub use error::{panic_message, PtychoError, Result};
