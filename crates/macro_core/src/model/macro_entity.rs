//! Macro domain model.
//!
//! # Responsibility
//! - Define the canonical macro record and its parameter declarations.
//! - Derive the macro rendering kind from its configured source.
//!
//! # Invariants
//! - `id` is stable and never reused for another macro.
//! - `alias` is the unique lookup key used by repositories.
//! - `validate()` is enforced by repository write paths, not by the service.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static ALIAS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid alias regex"));

/// Stable identifier for a macro record.
pub type MacroId = Uuid;

/// Rendering kind derived from the configured macro source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroType {
    Xslt,
    Script,
    UserControl,
    CustomControl,
    Unknown,
}

/// One parameter declared by a macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroProperty {
    /// Parameter key, unique within its macro.
    pub alias: String,
    /// Display label.
    pub name: String,
    /// Position in editor forms, ascending.
    pub sort_order: i32,
    /// Alias of the `MacroPropertyType` plugin that edits this parameter.
    pub property_type_alias: String,
}

impl MacroProperty {
    pub fn new(
        alias: impl Into<String>,
        name: impl Into<String>,
        sort_order: i32,
        property_type_alias: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
            sort_order,
            property_type_alias: property_type_alias.into(),
        }
    }
}

/// Reusable content-insertion unit.
///
/// At most one rendering source is expected to be set; when several are
/// present `macro_type()` resolves them in a fixed precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub id: MacroId,
    pub alias: String,
    pub name: String,
    #[serde(default)]
    pub use_in_editor: bool,
    #[serde(default)]
    pub dont_render: bool,
    #[serde(default)]
    pub cache_by_page: bool,
    #[serde(default)]
    pub cache_by_member: bool,
    /// Output cache lifetime in seconds; `0` disables caching.
    #[serde(default)]
    pub cache_duration: i32,
    #[serde(default)]
    pub control_type: Option<String>,
    #[serde(default)]
    pub control_assembly: Option<String>,
    #[serde(default)]
    pub xslt_path: Option<String>,
    #[serde(default)]
    pub script_path: Option<String>,
    #[serde(default)]
    pub properties: Vec<MacroProperty>,
}

impl Macro {
    /// Creates a macro with a generated stable ID and no rendering source.
    pub fn new(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), alias, name)
    }

    /// Creates a macro with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(id: MacroId, alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            alias: alias.into(),
            name: name.into(),
            use_in_editor: false,
            dont_render: false,
            cache_by_page: false,
            cache_by_member: false,
            cache_duration: 0,
            control_type: None,
            control_assembly: None,
            xslt_path: None,
            script_path: None,
            properties: Vec::new(),
        }
    }

    /// Appends a parameter sorted after the existing ones.
    pub fn add_property(
        &mut self,
        alias: impl Into<String>,
        name: impl Into<String>,
        property_type_alias: impl Into<String>,
    ) {
        let sort_order = self
            .properties
            .iter()
            .map(|property| property.sort_order)
            .max()
            .map_or(0, |last| last.saturating_add(1));
        self.properties
            .push(MacroProperty::new(alias, name, sort_order, property_type_alias));
    }

    /// Returns the parameter with `alias`, if declared.
    pub fn property(&self, alias: &str) -> Option<&MacroProperty> {
        self.properties.iter().find(|property| property.alias == alias)
    }

    /// Resolves the rendering kind: xslt, then script, then `.ascx` user
    /// control, then custom control (type plus assembly).
    pub fn macro_type(&self) -> MacroType {
        if is_set(&self.xslt_path) {
            return MacroType::Xslt;
        }
        if is_set(&self.script_path) {
            return MacroType::Script;
        }
        if let Some(control_type) = self.control_type.as_deref().filter(|v| !v.trim().is_empty())
        {
            if control_type.to_ascii_lowercase().contains(".ascx") {
                return MacroType::UserControl;
            }
            if is_set(&self.control_assembly) {
                return MacroType::CustomControl;
            }
        }
        MacroType::Unknown
    }

    /// Validates persistence invariants.
    ///
    /// # Errors
    /// - Alias blank or outside `[A-Za-z0-9_.-]`.
    /// - Name blank.
    /// - Negative cache duration.
    /// - Blank, malformed or duplicated property aliases.
    /// - Property without a property type alias.
    pub fn validate(&self) -> Result<(), MacroValidationError> {
        if self.alias.trim().is_empty() {
            return Err(MacroValidationError::EmptyAlias);
        }
        if !ALIAS_RE.is_match(&self.alias) {
            return Err(MacroValidationError::InvalidAlias(self.alias.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(MacroValidationError::EmptyName);
        }
        if self.cache_duration < 0 {
            return Err(MacroValidationError::NegativeCacheDuration(
                self.cache_duration,
            ));
        }

        let mut seen = BTreeSet::new();
        for property in &self.properties {
            if property.alias.trim().is_empty() {
                return Err(MacroValidationError::EmptyPropertyAlias);
            }
            if !ALIAS_RE.is_match(&property.alias) {
                return Err(MacroValidationError::InvalidPropertyAlias(
                    property.alias.clone(),
                ));
            }
            if !seen.insert(property.alias.as_str()) {
                return Err(MacroValidationError::DuplicatePropertyAlias(
                    property.alias.clone(),
                ));
            }
            if property.property_type_alias.trim().is_empty() {
                return Err(MacroValidationError::MissingPropertyType(
                    property.alias.clone(),
                ));
            }
        }

        Ok(())
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Macro invariant violations detected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroValidationError {
    EmptyAlias,
    InvalidAlias(String),
    EmptyName,
    NegativeCacheDuration(i32),
    EmptyPropertyAlias,
    InvalidPropertyAlias(String),
    DuplicatePropertyAlias(String),
    MissingPropertyType(String),
}

impl Display for MacroValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAlias => write!(f, "macro alias must not be empty"),
            Self::InvalidAlias(value) => write!(f, "macro alias is invalid: {value}"),
            Self::EmptyName => write!(f, "macro name must not be empty"),
            Self::NegativeCacheDuration(value) => {
                write!(f, "macro cache duration must not be negative: {value}")
            }
            Self::EmptyPropertyAlias => write!(f, "macro property alias must not be empty"),
            Self::InvalidPropertyAlias(value) => {
                write!(f, "macro property alias is invalid: {value}")
            }
            Self::DuplicatePropertyAlias(value) => {
                write!(f, "macro property alias is duplicated: {value}")
            }
            Self::MissingPropertyType(value) => {
                write!(f, "macro property `{value}` has no property type")
            }
        }
    }
}

impl Error for MacroValidationError {}
