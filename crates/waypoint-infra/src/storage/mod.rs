//! Storage backends for the `DocumentStore` port.

pub mod filesystem;

pub use filesystem::FileDocumentStore;
