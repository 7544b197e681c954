//! Macro repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide keyed CRUD APIs over `macros` and `macro_properties` storage.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Macro::validate()` before any SQL mutation.
//! - Lookup keys are forwarded verbatim; an unknown or malformed alias is
//!   simply absent.
//! - Multi-statement writes run inside a savepoint, so they are atomic with or
//!   without an enclosing transaction.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::macro_entity::{Macro, MacroId, MacroProperty, MacroValidationError};
use log::error;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const MACRO_SELECT_SQL: &str = "SELECT
    uuid,
    alias,
    name,
    use_in_editor,
    dont_render,
    cache_by_page,
    cache_by_member,
    cache_duration,
    control_type,
    control_assembly,
    xslt_path,
    script_path
FROM macros";

const WRITE_SAVEPOINT: &str = "macro_repo_write";

/// Aliases bound per `IN (...)` query; stays below SQLite's variable limit.
const FILTER_BATCH_SIZE: usize = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for macro persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Entity failed write-time validation.
    Validation(MacroValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No macro with this alias exists.
    NotFound(String),
    /// Another macro already owns this alias.
    DuplicateAlias(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid macro.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(alias) => write!(f, "macro not found: {alias}"),
            Self::DuplicateAlias(alias) => write!(f, "macro alias already in use: {alias}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "macro repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "macro repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "macro repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted macro data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MacroValidationError> for RepoError {
    fn from(value: MacroValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Keyed repository over macro entities.
///
/// The key is the macro alias.
pub trait MacroRepository {
    /// Returns the macro with `alias`, or `None`.
    fn get(&self, alias: &str) -> RepoResult<Option<Macro>>;
    /// Returns macros ordered by alias; an empty filter means all.
    fn get_all(&self, aliases: &[&str]) -> RepoResult<Vec<Macro>>;
    /// Inserts or replaces the macro identified by `entity.id`.
    fn add_or_update(&self, entity: &Macro) -> RepoResult<()>;
    /// Removes the macro and its properties.
    fn delete(&self, entity: &Macro) -> RepoResult<()>;
    fn exists(&self, alias: &str) -> RepoResult<bool>;
    fn count(&self) -> RepoResult<u64>;
}

/// SQLite-backed macro repository.
pub struct SqliteMacroRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMacroRepository<'conn> {
    /// Binds the repository to a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` on schema drift.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_macro_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl MacroRepository for SqliteMacroRepository<'_> {
    fn get(&self, alias: &str) -> RepoResult<Option<Macro>> {
        let row = self
            .conn
            .query_row(
                &format!("{MACRO_SELECT_SQL} WHERE alias = ?1;"),
                [alias],
                MacroRow::read,
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut entity = row.into_macro()?;
        entity.properties = load_properties(self.conn, entity.id)?;
        Ok(Some(entity))
    }

    fn get_all(&self, aliases: &[&str]) -> RepoResult<Vec<Macro>> {
        let mut macros = Vec::new();
        if aliases.is_empty() {
            let mut stmt = self
                .conn
                .prepare(&format!("{MACRO_SELECT_SQL} ORDER BY alias ASC;"))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                macros.push(MacroRow::read(row)?.into_macro()?);
            }
        } else {
            // Deduplicated so no macro is returned by two batches.
            let unique: Vec<&str> = aliases
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            for batch in unique.chunks(FILTER_BATCH_SIZE) {
                let placeholders = vec!["?"; batch.len()].join(", ");
                let mut stmt = self.conn.prepare(&format!(
                    "{MACRO_SELECT_SQL} WHERE alias IN ({placeholders});"
                ))?;
                let mut rows = stmt.query(params_from_iter(batch.iter()))?;
                while let Some(row) = rows.next()? {
                    macros.push(MacroRow::read(row)?.into_macro()?);
                }
            }
            macros.sort_by(|left, right| left.alias.cmp(&right.alias));
        }

        for entity in &mut macros {
            entity.properties = load_properties(self.conn, entity.id)?;
        }
        Ok(macros)
    }

    fn add_or_update(&self, entity: &Macro) -> RepoResult<()> {
        entity.validate()?;

        with_savepoint(self.conn, |conn| {
            let owner: Option<String> = conn
                .query_row(
                    "SELECT uuid FROM macros WHERE alias = ?1 AND uuid <> ?2;",
                    params![entity.alias, entity.id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if owner.is_some() {
                return Err(RepoError::DuplicateAlias(entity.alias.clone()));
            }

            conn.execute(
                "INSERT INTO macros (
                    uuid,
                    alias,
                    name,
                    use_in_editor,
                    dont_render,
                    cache_by_page,
                    cache_by_member,
                    cache_duration,
                    control_type,
                    control_assembly,
                    xslt_path,
                    script_path
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(uuid) DO UPDATE SET
                    alias = excluded.alias,
                    name = excluded.name,
                    use_in_editor = excluded.use_in_editor,
                    dont_render = excluded.dont_render,
                    cache_by_page = excluded.cache_by_page,
                    cache_by_member = excluded.cache_by_member,
                    cache_duration = excluded.cache_duration,
                    control_type = excluded.control_type,
                    control_assembly = excluded.control_assembly,
                    xslt_path = excluded.xslt_path,
                    script_path = excluded.script_path,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![
                    entity.id.to_string(),
                    entity.alias,
                    entity.name,
                    bool_to_int(entity.use_in_editor),
                    bool_to_int(entity.dont_render),
                    bool_to_int(entity.cache_by_page),
                    bool_to_int(entity.cache_by_member),
                    entity.cache_duration,
                    entity.control_type.as_deref(),
                    entity.control_assembly.as_deref(),
                    entity.xslt_path.as_deref(),
                    entity.script_path.as_deref(),
                ],
            )?;

            conn.execute(
                "DELETE FROM macro_properties WHERE macro_uuid = ?1;",
                [entity.id.to_string()],
            )?;
            let mut insert = conn.prepare(
                "INSERT INTO macro_properties (
                    macro_uuid,
                    alias,
                    name,
                    sort_order,
                    property_type_alias
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for property in &entity.properties {
                insert.execute(params![
                    entity.id.to_string(),
                    property.alias,
                    property.name,
                    property.sort_order,
                    property.property_type_alias,
                ])?;
            }
            Ok(())
        })
    }

    fn delete(&self, entity: &Macro) -> RepoResult<()> {
        with_savepoint(self.conn, |conn| {
            conn.execute(
                "DELETE FROM macro_properties WHERE macro_uuid = ?1;",
                [entity.id.to_string()],
            )?;
            let changed = conn.execute(
                "DELETE FROM macros WHERE uuid = ?1;",
                [entity.id.to_string()],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(entity.alias.clone()));
            }
            Ok(())
        })
    }

    fn exists(&self, alias: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM macros WHERE alias = ?1);",
            [alias],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn count(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM macros;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative macro count `{count}`")))
    }
}

fn with_savepoint<T>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {WRITE_SAVEPOINT};"))?;
    match body(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {WRITE_SAVEPOINT};"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute_batch(&format!(
                "ROLLBACK TO {WRITE_SAVEPOINT}; RELEASE {WRITE_SAVEPOINT};"
            )) {
                error!(
                    "event=macro_write_rollback module=repo status=error error={} cause={}",
                    rollback_err, err
                );
            }
            Err(err)
        }
    }
}

fn load_properties(conn: &Connection, id: MacroId) -> RepoResult<Vec<MacroProperty>> {
    let mut stmt = conn.prepare(
        "SELECT alias, name, sort_order, property_type_alias
         FROM macro_properties
         WHERE macro_uuid = ?1
         ORDER BY sort_order ASC, alias ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut properties = Vec::new();
    while let Some(row) = rows.next()? {
        properties.push(MacroProperty {
            alias: row.get("alias")?,
            name: row.get("name")?,
            sort_order: row.get("sort_order")?,
            property_type_alias: row.get("property_type_alias")?,
        });
    }
    Ok(properties)
}

/// Raw `macros` row before semantic decoding.
struct MacroRow {
    uuid: String,
    alias: String,
    name: String,
    use_in_editor: i64,
    dont_render: i64,
    cache_by_page: i64,
    cache_by_member: i64,
    cache_duration: i32,
    control_type: Option<String>,
    control_assembly: Option<String>,
    xslt_path: Option<String>,
    script_path: Option<String>,
}

impl MacroRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            uuid: row.get("uuid")?,
            alias: row.get("alias")?,
            name: row.get("name")?,
            use_in_editor: row.get("use_in_editor")?,
            dont_render: row.get("dont_render")?,
            cache_by_page: row.get("cache_by_page")?,
            cache_by_member: row.get("cache_by_member")?,
            cache_duration: row.get("cache_duration")?,
            control_type: row.get("control_type")?,
            control_assembly: row.get("control_assembly")?,
            xslt_path: row.get("xslt_path")?,
            script_path: row.get("script_path")?,
        })
    }

    fn into_macro(self) -> RepoResult<Macro> {
        let id = Uuid::parse_str(&self.uuid).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid value `{}` in macros.uuid", self.uuid))
        })?;

        Ok(Macro {
            id,
            alias: self.alias,
            name: self.name,
            use_in_editor: int_to_bool("use_in_editor", self.use_in_editor)?,
            dont_render: int_to_bool("dont_render", self.dont_render)?,
            cache_by_page: int_to_bool("cache_by_page", self.cache_by_page)?,
            cache_by_member: int_to_bool("cache_by_member", self.cache_by_member)?,
            cache_duration: self.cache_duration,
            control_type: self.control_type,
            control_assembly: self.control_assembly,
            xslt_path: self.xslt_path,
            script_path: self.script_path,
            properties: Vec::new(),
        })
    }
}

fn int_to_bool(column: &'static str, value: i64) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in macros.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_macro_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        (
            "macros",
            &[
                "uuid",
                "alias",
                "name",
                "use_in_editor",
                "dont_render",
                "cache_by_page",
                "cache_by_member",
                "cache_duration",
                "control_type",
                "control_assembly",
                "xslt_path",
                "script_path",
            ],
        ),
        (
            "macro_properties",
            &[
                "macro_uuid",
                "alias",
                "name",
                "sort_order",
                "property_type_alias",
            ],
        ),
    ];

    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
