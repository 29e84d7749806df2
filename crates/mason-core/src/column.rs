//! Warehouse column metadata used for schema-drift reconciliation.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Implied capacity of an unsized `text` column.
const TEXT_SIZE: u64 = 255;

/// A column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Declared data type
    pub data_type: String,

    /// `character_maximum_length`, when the type carries one
    pub char_size: Option<u64>,
}

impl Column {
    /// Create a new column record.
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        char_size: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            char_size,
        }
    }

    /// Whether this column belongs to the variable-length string family.
    pub fn is_string(&self) -> bool {
        matches!(
            self.data_type.to_ascii_lowercase().as_str(),
            "text" | "character varying" | "varchar" | "string"
        )
    }

    /// Declared capacity of a string column. `text` has an implied size of 255.
    pub fn string_size(&self) -> CoreResult<u64> {
        if !self.is_string() {
            return Err(CoreError::InvalidColumnType {
                column: self.name.clone(),
                message: format!("cannot take string size of type '{}'", self.data_type),
            });
        }

        if self.data_type.eq_ignore_ascii_case("text") {
            Ok(TEXT_SIZE)
        } else {
            self.char_size.ok_or_else(|| CoreError::InvalidColumnType {
                column: self.name.clone(),
                message: format!("type '{}' has no declared length", self.data_type),
            })
        }
    }

    /// Partial order for widening: this column can be expanded to match
    /// `other` iff both are string-typed and `other` is strictly wider.
    pub fn can_expand_to(&self, other: &Column) -> bool {
        if !self.is_string() || !other.is_string() {
            return false;
        }
        match (self.string_size(), other.string_size()) {
            (Ok(own), Ok(target)) => target > own,
            _ => false,
        }
    }

    /// Render the canonical widened string type for a given size.
    pub fn string_type(size: u64) -> String {
        format!("character varying({})", size)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.char_size {
            Some(size) => write!(f, "{} {}({})", self.name, self.data_type, size),
            None => write!(f, "{} {}", self.name, self.data_type),
        }
    }
}

#[cfg(test)]
#[path = "column_test.rs"]
mod tests;
