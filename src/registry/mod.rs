//! Identifier registry: scanning, per-file index, and the aggregate snapshot.
//!
//! This module provides:
//! - The `Registry` snapshot shared with every downstream consumer
//! - Identifier extraction from source text
//! - The per-file `FileIndex` and the `RegistryBuilder` state machine
//! - The builder service wiring file events to the broadcast hub

mod builder;
mod index;
mod model;
mod scanner;
mod service;

pub use builder::RegistryBuilder;
pub use index::{canonical_path, FileIndex};
pub use model::Registry;
pub use scanner::{extract_identifiers, scan_file};
pub use service::BuilderService;
