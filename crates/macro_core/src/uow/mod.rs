//! Unit-of-work contracts and providers.
//!
//! # Responsibility
//! - Group repository operations into one transactional context.
//! - Resolve repository handles bound to that context.
//!
//! # Invariants
//! - Writes become visible to other units of work only after `commit`.
//! - Dropping a unit of work without committing discards its writes.
//! - Every `macro_repository` call yields a fresh handle; handles hold no
//!   state beyond their borrow of the unit of work.

mod memory;
mod sqlite;

pub use memory::{InMemoryUnitOfWork, InMemoryUnitOfWorkProvider};
pub use sqlite::{SqliteUnitOfWork, SqliteUnitOfWorkProvider};

use crate::repo::macro_repo::{MacroRepository, RepoResult};

/// Transactional context grouping repository operations.
pub trait UnitOfWork {
    /// Resolves a macro repository bound to this unit of work.
    fn macro_repository(&self) -> RepoResult<Box<dyn MacroRepository + '_>>;

    /// Atomically applies every write made through this unit of work.
    fn commit(self) -> RepoResult<()>;
}

/// Source of fresh units of work.
pub trait UnitOfWorkProvider {
    type UnitOfWork<'a>: UnitOfWork
    where
        Self: 'a;

    fn unit_of_work(&self) -> RepoResult<Self::UnitOfWork<'_>>;
}
