//! Storage abstractions for Waypoint.
//!
//! Defines the `DocumentStore` port (one JSON document per key) and the
//! document key layout. The filesystem implementation lives in
//! waypoint-infra; `MemoryDocumentStore` is an in-process implementation.

pub mod document_store;
#[cfg(test)]
pub(crate) mod failing;
pub mod keys;
pub mod memory;

pub use document_store::{load_document, save_document, DocumentStore};
pub use memory::MemoryDocumentStore;
