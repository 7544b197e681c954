//! Core domain logic for the macro store.
//! Macros are persisted through unit-of-work scoped repositories and served
//! through `MacroService`.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;
pub mod uow;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::macro_entity::{Macro, MacroId, MacroProperty, MacroType, MacroValidationError};
pub use model::property_type::{builtin_property_types, MacroPropertyBaseType, MacroPropertyType};
pub use registry::{MacroPropertyTypeRegistry, RegistryError};
pub use repo::macro_repo::{MacroRepository, RepoError, RepoResult, SqliteMacroRepository};
pub use service::macro_service::MacroService;
pub use uow::{
    InMemoryUnitOfWork, InMemoryUnitOfWorkProvider, SqliteUnitOfWork, SqliteUnitOfWorkProvider,
    UnitOfWork, UnitOfWorkProvider,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
