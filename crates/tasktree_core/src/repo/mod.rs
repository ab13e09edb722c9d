//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable key-value slot contract used by the todo store.
//! - Isolate SQLite and serialization details from store orchestration.
//!
//! # Invariants
//! - A slot holds exactly one serialized task collection.
//! - Read paths reject malformed persisted state instead of masking it.

pub mod snapshot_repo;
