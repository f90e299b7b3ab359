//! Parameter schema
//!
//! Maps request query parameters onto extra fields of a signature record.
//! Loaded once at startup from JSON of the form:
//!
//! ```json
//! {
//!   "tag":        { "required": true,  "databaseField": "Tag", "retrievable": true },
//!   "source":     { "databaseField": "Source", "default": "web", "retrievable": true }
//! }
//! ```
//!
//! Entries are kept in name order so lookups and projections are stable.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{LedgerError, Result};

/// Record fields owned by the ledger itself; schema fields may not shadow them
pub const RESERVED_FIELDS: &[&str] = &["_id", "hash", "alg", "inserted", "sig", "ClientName"];

/// Full-width dollar sign stored in place of `$`
pub const FULLWIDTH_DOLLAR: char = '\u{ff04}';

/// Full-width full stop stored in place of `.`
pub const FULLWIDTH_DOT: char = '\u{ff0e}';

/// Descriptor for a single request parameter
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParamSpec {
    /// Sign requests without this parameter are rejected
    #[serde(default)]
    pub required: bool,

    /// Record field the value is stored under (not stored when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_field: Option<String>,

    /// Value stored when the request does not carry the parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,

    /// Whether the stored value may be read back through the params endpoint
    #[serde(default)]
    pub retrievable: bool,
}

/// Validated parameter schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    params: BTreeMap<String, ParamSpec>,
}

/// Replace the characters MongoDB treats as operators or path separators
///
/// Every occurrence is replaced, not just the first.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '$' => FULLWIDTH_DOLLAR,
            '.' => FULLWIDTH_DOT,
            other => other,
        })
        .collect()
}

fn sanitize_bson(value: Bson) -> Bson {
    match value {
        Bson::String(s) => Bson::String(sanitize(&s)),
        other => other,
    }
}

impl ParamSchema {
    /// Build a schema, rejecting field mappings the store cannot hold safely
    pub fn new(params: BTreeMap<String, ParamSpec>) -> Result<Self> {
        let mut seen_fields = HashSet::new();

        for (name, spec) in &params {
            if name.trim().is_empty() {
                return Err(LedgerError::Config("Parameter names must not be empty".into()));
            }

            match spec.database_field {
                Some(ref field) => {
                    if field.is_empty() {
                        return Err(LedgerError::Config(format!(
                            "Parameter '{name}' has an empty databaseField"
                        )));
                    }
                    if field.contains('$') || field.contains('.') {
                        return Err(LedgerError::Config(format!(
                            "Parameter '{name}': databaseField '{field}' may not contain '$' or '.'"
                        )));
                    }
                    if RESERVED_FIELDS.contains(&field.as_str()) {
                        return Err(LedgerError::Config(format!(
                            "Parameter '{name}': databaseField '{field}' is reserved"
                        )));
                    }
                    if !seen_fields.insert(field.as_str()) {
                        return Err(LedgerError::Config(format!(
                            "databaseField '{field}' is mapped by more than one parameter"
                        )));
                    }
                }
                None if spec.retrievable => {
                    return Err(LedgerError::Config(format!(
                        "Parameter '{name}' is retrievable but has no databaseField"
                    )));
                }
                None => {}
            }

            if let Some(ref default) = spec.default {
                bson::to_bson(default).map_err(|e| {
                    LedgerError::Config(format!("Parameter '{name}' has an unstorable default: {e}"))
                })?;
            }
        }

        Ok(Self { params })
    }

    /// Parse and validate a schema from its JSON form
    pub fn from_json(raw: &str) -> Result<Self> {
        let params: BTreeMap<String, ParamSpec> = serde_json::from_str(raw)
            .map_err(|e| LedgerError::Config(format!("Invalid parameter schema: {e}")))?;
        Self::new(params)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of parameters exposed through the params endpoint
    pub fn retrievable_count(&self) -> usize {
        self.params.values().filter(|p| p.retrievable).count()
    }

    /// First required parameter absent from the request, if any
    ///
    /// An empty value counts as absent.
    pub fn missing_required<'a>(&'a self, request: &HashMap<String, String>) -> Option<&'a str> {
        self.params
            .iter()
            .filter(|(_, spec)| spec.required)
            .find(|(name, _)| request.get(*name).map_or(true, |v| v.is_empty()))
            .map(|(name, _)| name.as_str())
    }

    /// Extra record fields for a sign request
    ///
    /// Request values win over defaults; string values are sanitized.
    /// Parameters with neither a value nor a default are left out.
    pub fn extra_fields(&self, request: &HashMap<String, String>) -> Result<Document> {
        let mut fields = Document::new();

        for (name, spec) in &self.params {
            let Some(ref field) = spec.database_field else {
                continue;
            };

            let value = match request.get(name).filter(|v| !v.is_empty()) {
                Some(v) => Bson::String(v.clone()),
                None => match spec.default {
                    Some(ref default) => bson::to_bson(default).map_err(|e| {
                        LedgerError::Internal(format!("Default for '{name}' not storable: {e}"))
                    })?,
                    None => continue,
                },
            };

            fields.insert(field.clone(), sanitize_bson(value));
        }

        Ok(fields)
    }

    /// Project the retrievable parameters out of a record's extra fields
    ///
    /// A retrievable field missing from the record is an integrity failure.
    pub fn project(&self, fields: &Document) -> Result<JsonMap<String, JsonValue>> {
        let mut projection = JsonMap::new();

        for (name, spec) in self.params.iter().filter(|(_, p)| p.retrievable) {
            let field = spec.database_field.as_deref().unwrap_or(name);
            match fields.get(field) {
                Some(Bson::Null) | None => {
                    return Err(LedgerError::Internal(format!(
                        "Param '{name}' missing for hash"
                    )));
                }
                Some(value) => {
                    projection.insert(name.clone(), value.clone().into_relaxed_extjson());
                }
            }
        }

        if projection.is_empty() {
            return Err(LedgerError::InvalidArgument("No parameters defined!".into()));
        }

        Ok(projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParamSchema {
        ParamSchema::from_json(
            r#"{
                "tag": { "required": true, "databaseField": "Tag", "retrievable": true },
                "source": { "databaseField": "Source", "default": "web", "retrievable": true },
                "archived": { "databaseField": "Archived", "default": false },
                "note": { }
            }"#,
        )
        .unwrap()
    }

    fn request(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sanitize_replaces_every_occurrence() {
        assert_eq!(sanitize("a.b.c"), "a\u{ff0e}b\u{ff0e}c");
        assert_eq!(sanitize("$where$"), "\u{ff04}where\u{ff04}");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn test_missing_required() {
        let schema = schema();
        assert_eq!(schema.missing_required(&request(&[])), Some("tag"));
        assert_eq!(schema.missing_required(&request(&[("tag", "")])), Some("tag"));
        assert_eq!(schema.missing_required(&request(&[("tag", "x")])), None);
    }

    #[test]
    fn test_extra_fields_uses_defaults_and_sanitizes() {
        let schema = schema();
        let fields = schema
            .extra_fields(&request(&[("tag", "$set.evil"), ("note", "ignored")]))
            .unwrap();

        assert_eq!(fields.get_str("Tag").unwrap(), "\u{ff04}set\u{ff0e}evil");
        assert_eq!(fields.get_str("Source").unwrap(), "web");
        assert_eq!(fields.get("Archived"), Some(&Bson::Boolean(false)));
        // no databaseField, never stored
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_project_retrievable_only() {
        let schema = schema();
        let fields = schema
            .extra_fields(&request(&[("tag", "v1.2"), ("source", "api")]))
            .unwrap();
        let projection = schema.project(&fields).unwrap();

        assert_eq!(projection.len(), 2);
        assert_eq!(projection["tag"], JsonValue::String("v1\u{ff0e}2".into()));
        assert_eq!(projection["source"], JsonValue::String("api".into()));
        assert!(!projection.contains_key("archived"));
    }

    #[test]
    fn test_project_missing_field_is_internal() {
        let schema = schema();
        let mut fields = Document::new();
        fields.insert("Tag", "x");

        match schema.project(&fields) {
            Err(LedgerError::Internal(msg)) => assert!(msg.contains("'source'")),
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[test]
    fn test_project_without_retrievable_params() {
        let schema = ParamSchema::from_json(r#"{"tag": {"databaseField": "Tag"}}"#).unwrap();
        assert!(matches!(
            schema.project(&Document::new()),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rejects_unsafe_fields() {
        assert!(ParamSchema::from_json(r#"{"a": {"databaseField": "x.y"}}"#).is_err());
        assert!(ParamSchema::from_json(r#"{"a": {"databaseField": "$x"}}"#).is_err());
        assert!(ParamSchema::from_json(r#"{"a": {"databaseField": "sig"}}"#).is_err());
        assert!(ParamSchema::from_json(r#"{"a": {"databaseField": ""}}"#).is_err());
        assert!(ParamSchema::from_json(
            r#"{"a": {"databaseField": "X"}, "b": {"databaseField": "X"}}"#
        )
        .is_err());
        assert!(ParamSchema::from_json(r#"{"a": {"requried": true}}"#).is_err());
    }
}
