//! Document Model
//!
//! The host owns the document; the controller reads field values and asks for
//! mutations through [`DocumentStore`]. [`MemoryDocument`] is the in-process
//! implementation used by tests and the CLI.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single field value as the host framework stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Whether the field holds nothing worth keeping.
    ///
    /// An unchecked checkbox counts as empty; a numeric zero does not.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Number(_) => false,
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }

    /// Checkbox semantics: "checked" or any non-empty selection
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Empty => false,
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Text(s) => {
                let s = s.trim();
                !s.is_empty() && s != "0"
            }
        }
    }

    /// Text content, if this is a non-blank text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

/// Access to a host document.
///
/// `has_field` answers whether the field is provisioned on this deployment at
/// all; rules referencing unprovisioned fields are skipped.
pub trait DocumentStore {
    /// Document identifier, `None` while unsaved
    fn document_id(&self) -> Option<&str>;

    fn has_field(&self, field: &str) -> bool;

    /// Current value; `Empty` for a provisioned field with no value
    fn value(&self, field: &str) -> Option<FieldValue>;

    fn set_value(&mut self, field: &str, value: FieldValue);

    fn is_hidden(&self, field: &str) -> bool;

    fn set_hidden(&mut self, field: &str, hidden: bool);

    /// Truthiness of a field, false when missing
    fn is_checked(&self, field: &str) -> bool {
        self.value(field).map(|v| v.is_truthy()).unwrap_or(false)
    }

    /// Non-blank text value of a field
    fn text(&self, field: &str) -> Option<String> {
        self.value(field)
            .and_then(|v| v.as_text().map(|s| s.to_string()))
    }
}

/// One write issued against a [`MemoryDocument`], in issue order
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    Value { field: String, value: FieldValue },
    Hidden { field: String, hidden: bool },
}

/// In-memory document with a write log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Document name, `None` while unsaved
    #[serde(default)]
    pub name: Option<String>,
    /// Provisioned fields and their values
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Fields currently hidden
    #[serde(default)]
    pub hidden: BTreeSet<String>,
    #[serde(skip)]
    writes: Vec<StoreWrite>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Builder: provision a field with a value
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Builder: provision an empty field
    pub fn with_empty(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldValue::Empty);
        self
    }

    /// Parse from the JSON shape `{ "name": ..., "fields": { ... } }`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Writes issued since creation or the last [`take_writes`](Self::take_writes)
    pub fn writes(&self) -> &[StoreWrite] {
        &self.writes
    }

    pub fn take_writes(&mut self) -> Vec<StoreWrite> {
        std::mem::take(&mut self.writes)
    }
}

impl DocumentStore for MemoryDocument {
    fn document_id(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        self.fields.get(field).cloned()
    }

    fn set_value(&mut self, field: &str, value: FieldValue) {
        self.writes.push(StoreWrite::Value {
            field: field.to_string(),
            value: value.clone(),
        });
        self.fields.insert(field.to_string(), value);
    }

    fn is_hidden(&self, field: &str) -> bool {
        self.hidden.contains(field)
    }

    fn set_hidden(&mut self, field: &str, hidden: bool) {
        self.writes.push(StoreWrite::Hidden {
            field: field.to_string(),
            hidden,
        });
        if hidden {
            self.hidden.insert(field.to_string());
        } else {
            self.hidden.remove(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(FieldValue::Bool(true).is_truthy());
        assert!(!FieldValue::Bool(false).is_truthy());
        assert!(FieldValue::Number(1.0).is_truthy());
        assert!(!FieldValue::Number(0.0).is_truthy());
        assert!(FieldValue::text("Scope 1").is_truthy());
        assert!(!FieldValue::text("0").is_truthy());
        assert!(!FieldValue::text("  ").is_truthy());
        assert!(!FieldValue::Empty.is_truthy());
    }

    #[test]
    fn test_emptiness() {
        assert!(FieldValue::Empty.is_empty());
        assert!(FieldValue::text("").is_empty());
        assert!(FieldValue::Bool(false).is_empty());
        assert!(!FieldValue::Number(0.0).is_empty());
        assert!(!FieldValue::text("Absolute").is_empty());
    }

    #[test]
    fn test_parse_document_json() {
        let json = r#"{
            "name": "OF-0001",
            "fields": {
                "scopes_to_report_scope1": 1,
                "scopes_to_report_scope2": false,
                "industry_type": "Manufacturing",
                "sub_industry_type": null
            }
        }"#;

        let doc = MemoryDocument::from_json(json).unwrap();
        assert_eq!(doc.document_id(), Some("OF-0001"));
        assert!(doc.is_checked("scopes_to_report_scope1"));
        assert!(!doc.is_checked("scopes_to_report_scope2"));
        assert_eq!(doc.text("industry_type").as_deref(), Some("Manufacturing"));
        assert_eq!(doc.value("sub_industry_type"), Some(FieldValue::Empty));
        assert!(doc.value("gps_coordinates").is_none());
    }

    #[test]
    fn test_write_log_order() {
        let mut doc = MemoryDocument::new().with("a", "x");
        doc.set_hidden("a", true);
        doc.set_value("a", FieldValue::Empty);

        assert!(doc.is_hidden("a"));
        assert_eq!(
            doc.take_writes(),
            vec![
                StoreWrite::Hidden {
                    field: "a".to_string(),
                    hidden: true
                },
                StoreWrite::Value {
                    field: "a".to_string(),
                    value: FieldValue::Empty
                },
            ]
        );
        assert!(doc.writes().is_empty());
    }
}
