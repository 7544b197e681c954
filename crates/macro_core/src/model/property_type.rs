//! Macro property type plugin descriptors.
//!
//! A property type names the editor control used for one macro parameter and
//! the primitive type its value is stored as.

use serde::{Deserialize, Serialize};

const BUILTIN_RENDERING_ASSEMBLY: &str = "macro.renderings";

/// Primitive storage type of a macro parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroPropertyBaseType {
    Int32,
    Boolean,
    String,
}

/// Plugin descriptor for one macro parameter editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroPropertyType {
    /// Lookup key referenced by `MacroProperty::property_type_alias`.
    pub alias: String,
    pub rendering_assembly: String,
    pub rendering_type: String,
    pub base_type: MacroPropertyBaseType,
}

impl MacroPropertyType {
    pub fn new(
        alias: impl Into<String>,
        rendering_assembly: impl Into<String>,
        rendering_type: impl Into<String>,
        base_type: MacroPropertyBaseType,
    ) -> Self {
        Self {
            alias: alias.into(),
            rendering_assembly: rendering_assembly.into(),
            rendering_type: rendering_type.into(),
            base_type,
        }
    }

    fn builtin(alias: &str, rendering_type: &str, base_type: MacroPropertyBaseType) -> Self {
        Self::new(alias, BUILTIN_RENDERING_ASSEMBLY, rendering_type, base_type)
    }
}

/// Returns the built-in property type descriptors in registration order.
pub fn builtin_property_types() -> Vec<MacroPropertyType> {
    use MacroPropertyBaseType::{Boolean, Int32, String as Text};

    vec![
        MacroPropertyType::builtin("text", "text", Text),
        MacroPropertyType::builtin("textMultiLine", "textMultiple", Text),
        MacroPropertyType::builtin("bool", "yesNo", Boolean),
        MacroPropertyType::builtin("number", "numeric", Int32),
        MacroPropertyType::builtin("contentTree", "content", Int32),
        MacroPropertyType::builtin("contentPicker", "content", Int32),
        MacroPropertyType::builtin("contentType", "contentTypeSingle", Int32),
        MacroPropertyType::builtin("contentTypeMultiple", "contentTypeMultiple", Int32),
        MacroPropertyType::builtin("contentAll", "content", Int32),
        MacroPropertyType::builtin("tabPicker", "tabPicker", Text),
        MacroPropertyType::builtin("tabPickerMultiple", "tabPickerMultiple", Text),
        MacroPropertyType::builtin("propertyTypePicker", "propertyTypePicker", Text),
        MacroPropertyType::builtin(
            "propertyTypePickerMultiple",
            "propertyTypePickerMultiple",
            Text,
        ),
        MacroPropertyType::builtin("mediaCurrent", "media", Int32),
    ]
}
