//! Ptycho Store - Product repository, pattern store, and file adapters
//!
//! This crate holds the in-memory state the reconstruction pipeline reads from
//! and writes back into, plus JSON/CSV adapters for products, patterns, and scans.

pub mod io;
pub mod memory;
pub mod ports;
pub mod repository;

pub use memory::MemoryPatternStore;
pub use ports::{ProductEvent, ProductField, ProductRepositoryObserver};
pub use repository::ProductRepository;
