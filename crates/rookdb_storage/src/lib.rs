//! # RookDB Storage
//!
//! Storage engine contract for RookDB.
//!
//! This crate defines the boundary between the catalog core and the physical
//! persistence layer. The core never touches files itself; it describes data
//! sources with [`SourceDescriptor`] values and asks a [`StorageEngine`] to
//! open, persist, rename, or drop them.
//!
//! ## Design Principles
//!
//! - Engines receive descriptors, never the core's in-memory objects
//! - Every fallible call reports a [`StorageError`]; the core maps failures
//!   to its own error taxonomy
//! - Engines must be `Send + Sync`; the core calls them while holding only
//!   fine-grained per-object locks
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For testing and ephemeral databases

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod memory;

pub use engine::{SourceDescriptor, StorageEngine};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryEngine;
