//! SQLite-backed unit of work.
//!
//! Each unit of work is one deferred transaction on the provider's
//! connection. Transactions roll back on drop unless committed.

use super::{UnitOfWork, UnitOfWorkProvider};
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::repo::macro_repo::{MacroRepository, RepoResult, SqliteMacroRepository};
use log::debug;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

/// Unit-of-work provider over one migrated SQLite connection.
///
/// Units of work must not overlap: SQLite has no nested transactions, so
/// a second `unit_of_work` while one is alive fails with a DB error.
pub struct SqliteUnitOfWorkProvider {
    conn: Connection,
}

impl SqliteUnitOfWorkProvider {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    /// Opens (and migrates) a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    /// Wraps an existing connection. Schema readiness is checked when a
    /// repository is resolved.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl UnitOfWorkProvider for SqliteUnitOfWorkProvider {
    type UnitOfWork<'a> = SqliteUnitOfWork<'a>;

    fn unit_of_work(&self) -> RepoResult<SqliteUnitOfWork<'_>> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)?;
        Ok(SqliteUnitOfWork { tx })
    }
}

/// One SQLite transaction.
pub struct SqliteUnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn macro_repository(&self) -> RepoResult<Box<dyn MacroRepository + '_>> {
        Ok(Box::new(SqliteMacroRepository::try_new(&self.tx)?))
    }

    fn commit(self) -> RepoResult<()> {
        self.tx.commit()?;
        debug!("event=uow_commit module=uow status=ok backend=sqlite");
        Ok(())
    }
}
