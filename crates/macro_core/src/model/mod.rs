//! Macro domain model.
//!
//! # Responsibility
//! - Define the macro record persisted by repositories.
//! - Define property type plugin descriptors served by the registry.
//!
//! # Invariants
//! - Every macro is identified by a stable `MacroId` and a unique alias.

pub mod macro_entity;
pub mod property_type;
