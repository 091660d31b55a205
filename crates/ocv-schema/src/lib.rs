//! Schema Binding Trait
//!
//! Defines the interface to the data-model schemas a device's responses are
//! checked against, plus `SchemaCatalog`, an implementation backed by JSON
//! Schema documents. A binding resolves a structured path to the container
//! it addresses inside a named model, validates JSON documents against that
//! container and enumerates the leaf paths below it.

use jsonschema::JSONSchema;
use ocv_path::Path;
use ocv_value::strip_model_prefixes;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Error type for schema checks
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("model '{model}' has no container at '{path}'")]
    BadContainerPath { model: String, path: String },

    #[error("schema for model '{model}' is invalid: {detail}")]
    BadSchema { model: String, detail: String },

    #[error("malformed JSON document: {0}")]
    BadDocument(String),

    #[error("document does not conform to the model: {0}")]
    Invalid(String),
}

/// Trait for schema-aware checks against named data models
pub trait SchemaBinding: Send + Sync {
    /// Validate a JSON-IETF document against the container a path addresses.
    fn validate(&self, json_text: &str, model: &str, path: &Path) -> Result<(), SchemaError>;

    /// Enumerate the leaf paths below a container, prefixed by the given
    /// root path in canonical form.
    fn leaf_paths(&self, model: &str, root: &Path) -> Result<Vec<String>, SchemaError>;
}

/// A catalog of named models held as JSON Schema documents.
///
/// Containers are the schema nodes carrying `properties`; list nodes are
/// stepped through via their `items` schema, so path list keys select no
/// schema branch of their own.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    models: HashMap<String, Value>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model schema under a name, replacing any previous one.
    pub fn register(&mut self, model: impl Into<String>, schema: Value) {
        self.models.insert(model.into(), schema);
    }

    pub fn with_model(mut self, model: impl Into<String>, schema: Value) -> Self {
        self.register(model, schema);
        self
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    fn model(&self, model: &str) -> Result<&Value, SchemaError> {
        self.models
            .get(model)
            .ok_or_else(|| SchemaError::UnknownModel(model.to_string()))
    }

    /// Walk the schema tree to the container addressed by `path`.
    fn container<'s>(
        &self,
        schema: &'s Value,
        model: &str,
        path: &Path,
    ) -> Result<&'s Value, SchemaError> {
        let mut node = schema;
        for element in path.elements() {
            let child = node
                .get("properties")
                .and_then(Value::as_object)
                .and_then(|props| props.get(element.name()));
            node = match child {
                Some(child) => child,
                None => {
                    return Err(SchemaError::BadContainerPath {
                        model: model.to_string(),
                        path: path.to_string(),
                    })
                }
            };
            // List nodes nest their element schema under "items".
            if let Some(items) = node.get("items") {
                node = items;
            }
        }
        Ok(node)
    }
}

impl SchemaBinding for SchemaCatalog {
    fn validate(&self, json_text: &str, model: &str, path: &Path) -> Result<(), SchemaError> {
        let document: Value = serde_json::from_str(&strip_model_prefixes(json_text))
            .map_err(|e| SchemaError::BadDocument(e.to_string()))?;

        let schema = self.model(model)?;
        let container = self.container(schema, model, path)?;

        let compiled = JSONSchema::compile(container).map_err(|e| SchemaError::BadSchema {
            model: model.to_string(),
            detail: e.to_string(),
        })?;
        if let Err(errors) = compiled.validate(&document) {
            let detail = errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SchemaError::Invalid(detail));
        }
        Ok(())
    }

    fn leaf_paths(&self, model: &str, root: &Path) -> Result<Vec<String>, SchemaError> {
        let schema = self.model(model)?;
        let container = self.container(schema, model, root)?;

        let mut paths = Vec::new();
        collect_leaves(container, &root.to_string(), &mut paths);
        Ok(paths)
    }
}

fn collect_leaves(node: &Value, prefix: &str, out: &mut Vec<String>) {
    if let Some(items) = node.get("items") {
        collect_leaves(items, prefix, out);
        return;
    }
    match node.get("properties").and_then(Value::as_object) {
        Some(props) => {
            for (name, child) in props {
                let child_prefix = format!("{}/{}", prefix, name);
                collect_leaves(child, &child_prefix, out);
            }
        }
        None => out.push(prefix.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A trimmed-down interfaces model.
    fn interfaces_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "interfaces": {
                    "type": "object",
                    "properties": {
                        "interface": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": "string"},
                                    "state": {
                                        "type": "object",
                                        "properties": {
                                            "admin-status": {"type": "string"},
                                            "oper-status": {"type": "string"},
                                            "mtu": {"type": "integer"},
                                            "counters": {
                                                "type": "object",
                                                "properties": {
                                                    "in-errors": {"type": "integer"},
                                                    "out-errors": {"type": "integer"}
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new().with_model("interfaces", interfaces_schema())
    }

    #[test]
    fn test_validate_container_document() {
        let path = Path::parse("/interfaces/interface[name=eth0]/state").unwrap();
        let doc = "{\"admin-status\": \"UP\", \"mtu\": 1500}";
        catalog().validate(doc, "interfaces", &path).unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let path = Path::parse("/interfaces/interface[name=eth0]/state").unwrap();
        let doc = "{\"mtu\": \"not-a-number\"}";
        let err = catalog().validate(doc, "interfaces", &path).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid(_)));
    }

    #[test]
    fn test_validate_strips_model_prefixes() {
        let path = Path::parse("/interfaces/interface[name=eth0]/state").unwrap();
        let doc = "{\"openconfig-interfaces:admin-status\": \"UP\"}";
        catalog().validate(doc, "interfaces", &path).unwrap();
    }

    #[test]
    fn test_validate_malformed_document() {
        let path = Path::parse("/interfaces").unwrap();
        let err = catalog().validate("{broken", "interfaces", &path).unwrap_err();
        assert!(matches!(err, SchemaError::BadDocument(_)));
    }

    #[test]
    fn test_unknown_model() {
        let path = Path::parse("/interfaces").unwrap();
        let err = catalog().validate("{}", "acls", &path).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownModel(_)));
    }

    #[test]
    fn test_bad_container_path() {
        let path = Path::parse("/interfaces/iface").unwrap();
        let err = catalog().validate("{}", "interfaces", &path).unwrap_err();
        assert!(matches!(err, SchemaError::BadContainerPath { .. }));
    }

    #[test]
    fn test_leaf_paths_under_state() {
        let root = Path::parse("/interfaces/interface[name=test]/state").unwrap();
        let paths = catalog().leaf_paths("interfaces", &root).unwrap();
        for want in [
            "/admin-status",
            "/oper-status",
            "/counters/in-errors",
            "/counters/out-errors",
        ] {
            let full = format!("{}{}", root, want);
            assert!(paths.contains(&full), "missing {}", full);
        }
    }

    #[test]
    fn test_leaf_paths_steps_through_list_items() {
        let root = Path::parse("/interfaces").unwrap();
        let paths = catalog().leaf_paths("interfaces", &root).unwrap();
        assert!(paths.contains(&"/interfaces/interface/name".to_string()));
        assert!(paths.contains(&"/interfaces/interface/state/mtu".to_string()));
    }
}
