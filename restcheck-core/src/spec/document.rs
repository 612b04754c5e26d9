use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::StdResult;

/// Error raised when a schema reference cannot be resolved.
///
/// Fatal to the whole run: without resolved schemas no valid resource spec
/// can be built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecResolutionError {
    /// A `$ref` points to a component that does not exist in the document
    #[error("unresolvable schema reference '{reference}'")]
    UnresolvedReference {
        /// The reference as written in the document
        reference: String,
    },

    /// A `$ref` chain loops back on itself
    #[error("circular schema reference '{reference}'")]
    CircularReference {
        /// The reference closing the cycle
        reference: String,
    },

    /// A `$ref` points outside the document
    #[error("external schema references are not supported: '{reference}'")]
    ExternalReference {
        /// The external reference as written in the document
        reference: String,
    },
}

/// An OpenAPI 3.x document loaded into memory.
pub struct OpenApiDocument {
    root: Value,
}

impl OpenApiDocument {
    /// Load a document from a YAML or JSON file.
    ///
    /// YAML being a superset of JSON, both formats go through the same parser.
    pub fn from_file(path: &Path) -> StdResult<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read OpenAPI document '{}'", path.display()))?;
        Self::parse(&content)
    }

    /// Parse a document from its raw content.
    pub fn parse(content: &str) -> StdResult<Self> {
        let root: Value = serde_yml::from_str(content)
            .with_context(|| "Could not parse OpenAPI document as YAML or JSON")?;

        Ok(Self { root })
    }

    /// The declared `openapi` version field, if present.
    pub fn openapi_version(&self) -> Option<&str> {
        self.root.get("openapi").and_then(Value::as_str)
    }

    /// The `paths` object, empty when the document declares none.
    pub fn paths(&self) -> Map<String, Value> {
        self.root
            .get("paths")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Deep-copy a schema value with every `$ref` resolved transitively.
    ///
    /// Only document-local references (`#/components/…`) are supported.
    pub fn resolve(&self, value: &Value) -> Result<Value, SpecResolutionError> {
        self.resolve_inner(value, &mut Vec::new())
    }

    fn resolve_inner(
        &self,
        value: &Value,
        visiting: &mut Vec<String>,
    ) -> Result<Value, SpecResolutionError> {
        match value {
            Value::Object(object) => {
                if let Some(reference) = object.get("$ref").and_then(Value::as_str) {
                    let target = self.lookup_reference(reference)?;
                    if visiting.iter().any(|seen| seen == reference) {
                        return Err(SpecResolutionError::CircularReference {
                            reference: reference.to_string(),
                        });
                    }
                    visiting.push(reference.to_string());
                    let resolved = self.resolve_inner(&target, visiting)?;
                    visiting.pop();

                    return Ok(resolved);
                }

                let mut resolved = Map::new();
                for (key, entry) in object {
                    resolved.insert(key.clone(), self.resolve_inner(entry, visiting)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(entries) => {
                let resolved = entries
                    .iter()
                    .map(|entry| self.resolve_inner(entry, visiting))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn lookup_reference(&self, reference: &str) -> Result<Value, SpecResolutionError> {
        let pointer = reference.strip_prefix("#").ok_or_else(|| {
            SpecResolutionError::ExternalReference {
                reference: reference.to_string(),
            }
        })?;

        self.root
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| SpecResolutionError::UnresolvedReference {
                reference: reference.to_string(),
            })
    }
}
