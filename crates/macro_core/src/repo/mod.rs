//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the keyed data access contract for macros.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Macro::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateAlias`)
//!   in addition to DB transport errors.

pub mod macro_repo;
