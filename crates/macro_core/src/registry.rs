//! Macro property type plugin registry.
//!
//! # Responsibility
//! - Hold the ordered list of `MacroPropertyType` descriptors.
//! - Expose one process-wide registry, populated on first use.
//!
//! # Invariants
//! - Registration order is preserved; lookups return the first exact match.
//! - Duplicate aliases are accepted (a later plugin never shadows an earlier
//!   one).
//! - The process-wide registry is immutable once observed.

use crate::model::property_type::{builtin_property_types, MacroPropertyType};
use log::{info, warn};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

static CURRENT: OnceCell<Arc<MacroPropertyTypeRegistry>> = OnceCell::new();

/// Ordered registry of macro property type descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroPropertyTypeRegistry {
    entries: Vec<MacroPropertyType>,
}

impl MacroPropertyTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in descriptors.
    pub fn with_builtins() -> Self {
        Self {
            entries: builtin_property_types(),
        }
    }

    /// Appends one descriptor.
    pub fn register(&mut self, property_type: MacroPropertyType) -> Result<(), RegistryError> {
        if property_type.alias.trim().is_empty() {
            return Err(RegistryError::InvalidAlias(property_type.alias));
        }
        if self.find_by_alias(&property_type.alias).is_some() {
            warn!(
                "event=property_type_register module=registry status=duplicate alias={}",
                property_type.alias
            );
        }
        self.entries.push(property_type);
        Ok(())
    }

    pub fn all(&self) -> &[MacroPropertyType] {
        &self.entries
    }

    /// Returns the first descriptor whose alias equals `alias` exactly.
    pub fn find_by_alias(&self, alias: &str) -> Option<&MacroPropertyType> {
        self.entries.iter().find(|entry| entry.alias == alias)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Installs the process-wide registry.
///
/// Must run before the first `current()` call; afterwards the registry is
/// fixed and this returns `AlreadyInstalled`.
pub fn install_current(registry: MacroPropertyTypeRegistry) -> Result<(), RegistryError> {
    let count = registry.len();
    CURRENT
        .set(Arc::new(registry))
        .map_err(|_| RegistryError::AlreadyInstalled)?;
    info!("event=property_types_install module=registry status=ok count={count}");
    Ok(())
}

/// Returns the process-wide registry, populating built-ins on first use
/// when nothing was installed.
pub fn current() -> Arc<MacroPropertyTypeRegistry> {
    CURRENT
        .get_or_init(|| {
            let registry = MacroPropertyTypeRegistry::with_builtins();
            info!(
                "event=property_types_install module=registry status=ok source=builtin count={}",
                registry.len()
            );
            Arc::new(registry)
        })
        .clone()
}

/// Registry registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidAlias(String),
    AlreadyInstalled,
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAlias(value) => write!(f, "property type alias is invalid: `{value}`"),
            Self::AlreadyInstalled => {
                write!(f, "macro property type registry is already installed")
            }
        }
    }
}

impl Error for RegistryError {}
