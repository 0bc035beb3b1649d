//! Typed registry of `data-<kind>` payloads.
//!
//! Every tool declares the data kinds it emits along with a JSON Schema for
//! the payload. The registry is the closed set of kinds a run may produce;
//! emissions are checked against the owning tool's declared schema.

use crate::conversation::DATA_PART_PREFIX;
use crate::tool::contract::{schema_for_type, schema_violations, ToolError};
use crate::tool::registry::ToolRegistryError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A declared `data-<kind>` payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataKind {
    /// Kind name without the `data-` prefix (e.g. `weather`).
    pub name: String,
    /// JSON Schema of the payload.
    pub schema: Value,
}

impl DataKind {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Declare a kind whose payload schema is derived from `T`.
    pub fn typed<T: JsonSchema>(name: impl Into<String>) -> Self {
        Self::new(name, schema_for_type::<T>())
    }

    /// Wire part type, e.g. `data-weather`.
    pub fn part_type(&self) -> String {
        format!("{DATA_PART_PREFIX}{}", self.name)
    }

    /// Check a payload against this kind's schema.
    pub fn validate(&self, payload: &Value) -> Result<(), ToolError> {
        match schema_violations(&self.schema, payload)? {
            None => Ok(()),
            Some(violations) => Err(ToolError::InvalidData(format!(
                "{} payload rejected: {violations}",
                self.part_type()
            ))),
        }
    }
}

#[derive(Debug, Clone)]
struct Registered {
    owner: String,
    kind: DataKind,
}

/// Set of data kinds registered by the tools of one registry.
///
/// Two tools may share a kind only when they declare the same schema.
#[derive(Debug, Clone, Default)]
pub struct DataKindRegistry {
    kinds: BTreeMap<String, Registered>,
}

impl DataKindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `kind` on behalf of tool `owner`.
    pub fn register(&mut self, owner: &str, kind: DataKind) -> Result<(), ToolRegistryError> {
        if let Some(existing) = self.kinds.get(&kind.name) {
            if existing.kind.schema != kind.schema {
                return Err(ToolRegistryError::ConflictingDataKind {
                    kind: kind.name,
                    owner: existing.owner.clone(),
                    other: owner.to_string(),
                });
            }
            return Ok(());
        }
        self.kinds.insert(
            kind.name.clone(),
            Registered {
                owner: owner.to_string(),
                kind,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DataKind> {
        self.kinds.get(name).map(|r| &r.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Validate a payload against a registered kind.
    pub fn validate(&self, name: &str, payload: &Value) -> Result<(), ToolError> {
        let kind = self
            .get(name)
            .ok_or_else(|| ToolError::InvalidData(format!("unregistered data kind '{name}'")))?;
        kind.validate(payload)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataKind> {
        self.kinds.values().map(|r| &r.kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn writing_kind() -> DataKind {
        DataKind::new(
            "generateWriting",
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        )
    }

    #[test]
    fn part_type_is_prefixed() {
        assert_eq!(writing_kind().part_type(), "data-generateWriting");
    }

    #[test]
    fn validate_accepts_and_rejects_payloads() {
        let kind = writing_kind();
        assert!(kind.validate(&json!({"text": "a"})).is_ok());
        assert!(matches!(
            kind.validate(&json!({"text": 1})),
            Err(ToolError::InvalidData(_))
        ));
    }

    #[test]
    fn same_kind_same_schema_is_shared() {
        let mut registry = DataKindRegistry::new();
        registry.register("a", writing_kind()).unwrap();
        registry.register("b", writing_kind()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_kind_different_schema_conflicts() {
        let mut registry = DataKindRegistry::new();
        registry.register("a", writing_kind()).unwrap();
        let err = registry
            .register("b", DataKind::new("generateWriting", json!({"type": "string"})))
            .unwrap_err();
        assert!(matches!(
            err,
            ToolRegistryError::ConflictingDataKind { ref owner, ref other, .. }
                if owner == "a" && other == "b"
        ));
    }

    #[test]
    fn unregistered_kind_is_invalid_data() {
        let registry = DataKindRegistry::new();
        assert!(matches!(
            registry.validate("weather", &json!({})),
            Err(ToolError::InvalidData(_))
        ));
    }
}
