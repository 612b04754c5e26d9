use serde_json::{Map, Value, json};
use thiserror::Error;

/// Error raised when a declared schema uses a shape the synthesizer cannot
/// handle (`oneOf`, bare `$ref` leftovers, missing `type`, …).
///
/// Guessing a payload for such a shape would corrupt downstream validation,
/// so the resource owning the schema is failed instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported schema shape at '{location}': {reason}")]
pub struct UnsupportedSchemaError {
    /// JSON-pointer-ish location of the offending shape within the schema
    pub location: String,
    /// Why the shape is not supported
    pub reason: String,
}

/// Closed representation of the JSON-Schema subset the tester understands.
///
/// Built once when the spec model is parsed; every downstream component
/// (synthesizer, validator) operates on this type, never on raw documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// `type: string`, with its optional `format`
    String {
        /// Declared `format` (`uuid`, `date-time`, …), if any
        format: Option<String>,
    },
    /// `type: integer`
    Integer,
    /// `type: number`
    Number,
    /// `type: boolean`
    Boolean,
    /// `type: object` with its properties and required field names
    Object {
        /// Property name / schema pairs
        properties: Vec<(String, Schema)>,
        /// Names of the required properties
        required: Vec<String>,
    },
    /// `type: array` of a single item schema
    Array {
        /// Schema of the array items
        items: Box<Schema>,
    },
}

impl Schema {
    /// Build a [Schema] from a fully `$ref`-resolved schema value.
    pub fn from_value(value: &Value) -> Result<Self, UnsupportedSchemaError> {
        Self::from_value_at(value, "#")
    }

    fn from_value_at(value: &Value, location: &str) -> Result<Self, UnsupportedSchemaError> {
        let object = value.as_object().ok_or_else(|| UnsupportedSchemaError {
            location: location.to_string(),
            reason: "schema is not an object".to_string(),
        })?;

        if object.contains_key("$ref") {
            return Err(UnsupportedSchemaError {
                location: location.to_string(),
                reason: "unresolved '$ref' in schema".to_string(),
            });
        }
        for combinator in ["oneOf", "anyOf", "allOf", "not"] {
            if object.contains_key(combinator) {
                return Err(UnsupportedSchemaError {
                    location: location.to_string(),
                    reason: format!("'{combinator}' combinators are not supported"),
                });
            }
        }

        let schema_type = object.get("type").and_then(Value::as_str).ok_or_else(|| {
            UnsupportedSchemaError {
                location: location.to_string(),
                reason: "schema without a 'type' declaration".to_string(),
            }
        })?;

        match schema_type {
            "string" => Ok(Schema::String {
                format: object.get("format").and_then(Value::as_str).map(String::from),
            }),
            "integer" => Ok(Schema::Integer),
            "number" => Ok(Schema::Number),
            "boolean" => Ok(Schema::Boolean),
            "object" => {
                let mut properties = Vec::new();
                if let Some(props) = object.get("properties").and_then(Value::as_object) {
                    for (name, prop_value) in props {
                        let prop_location = format!("{location}/properties/{name}");
                        properties
                            .push((name.clone(), Self::from_value_at(prop_value, &prop_location)?));
                    }
                }
                let required = object
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(Schema::Object {
                    properties,
                    required,
                })
            }
            "array" => {
                let items_value = object.get("items").ok_or_else(|| UnsupportedSchemaError {
                    location: location.to_string(),
                    reason: "array without an 'items' schema".to_string(),
                })?;
                let items = Self::from_value_at(items_value, &format!("{location}/items"))?;

                Ok(Schema::Array {
                    items: Box::new(items),
                })
            }
            other => Err(UnsupportedSchemaError {
                location: location.to_string(),
                reason: format!("unknown schema type '{other}'"),
            }),
        }
    }

    /// Export back to a JSON Schema value, suitable for a `jsonschema` validator.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Schema::String { format } => match format {
                Some(format) => json!({"type": "string", "format": format}),
                None => json!({"type": "string"}),
            },
            Schema::Integer => json!({"type": "integer"}),
            Schema::Number => json!({"type": "number"}),
            Schema::Boolean => json!({"type": "boolean"}),
            Schema::Object {
                properties,
                required,
            } => {
                let mut props = Map::new();
                for (name, schema) in properties {
                    props.insert(name.clone(), schema.to_json_schema());
                }
                json!({
                    "type": "object",
                    "properties": Value::Object(props),
                    "required": required,
                })
            }
            Schema::Array { items } => json!({
                "type": "array",
                "items": items.to_json_schema(),
            }),
        }
    }

    /// Names of the required properties, empty for non-object schemas.
    pub fn required_fields(&self) -> &[String] {
        match self {
            Schema::Object { required, .. } => required,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_scalar_schemas() {
        assert_eq!(
            Schema::String { format: None },
            Schema::from_value(&json!({"type": "string"})).unwrap()
        );
        assert_eq!(
            Schema::String {
                format: Some("uuid".to_string())
            },
            Schema::from_value(&json!({"type": "string", "format": "uuid"})).unwrap()
        );
        assert_eq!(
            Schema::Integer,
            Schema::from_value(&json!({"type": "integer"})).unwrap()
        );
        assert_eq!(
            Schema::Boolean,
            Schema::from_value(&json!({"type": "boolean"})).unwrap()
        );
    }

    #[test]
    fn builds_nested_object_schema() {
        let schema = Schema::from_value(&json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
            },
            "required": ["title"],
        }))
        .unwrap();

        assert_eq!(vec!["title".to_string()], schema.required_fields());
        let Schema::Object { properties, .. } = &schema else {
            panic!("expected an object schema, got {schema:?}");
        };
        assert_eq!(2, properties.len());
    }

    #[test]
    fn rejects_untyped_schema() {
        let error = Schema::from_value(&json!({"description": "no type here"})).unwrap_err();

        assert!(error.reason.contains("'type'"), "unexpected reason: {error}");
    }

    #[test]
    fn rejects_combinators_and_unresolved_refs() {
        Schema::from_value(&json!({"oneOf": [{"type": "string"}]})).unwrap_err();
        Schema::from_value(&json!({"$ref": "#/components/schemas/Thing"})).unwrap_err();
    }

    #[test]
    fn reports_the_location_of_a_nested_unsupported_shape() {
        let error = Schema::from_value(&json!({
            "type": "object",
            "properties": {"payload": {"type": "object", "properties": {"blob": {}}}},
        }))
        .unwrap_err();

        assert_eq!("#/properties/payload/properties/blob", error.location);
    }

    #[test]
    fn json_schema_export_is_lossless_for_the_supported_subset() {
        let source = json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "format": "uuid"},
                "count": {"type": "integer"},
            },
            "required": ["id"],
        });
        let exported = Schema::from_value(&source).unwrap().to_json_schema();

        assert_eq!(source, exported);
    }
}
