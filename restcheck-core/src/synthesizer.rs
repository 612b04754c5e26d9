//! Payload Synthesizer: produces a valid JSON instance for a declared input
//! schema, so that create and update requests carry data the contract itself
//! says is acceptable.
//!
//! Shapes outside the supported subset are rejected when the spec model is
//! built ([Schema::from_value] fails with
//! [UnsupportedSchemaError][crate::entities::UnsupportedSchemaError]); over
//! the closed [Schema] type, generation always succeeds.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::entities::Schema;

/// How much of the schema to populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Only the fields listed as required, the minimal valid instance.
    /// Used for create payloads.
    RequiredOnly,

    /// Every declared field. Used for update payloads, where omitting a
    /// previously-set field could be read as clearing it.
    Full,
}

/// Produce an instance satisfying the given schema.
pub fn synthesize(schema: &Schema, mode: GenerationMode) -> Value {
    match schema {
        Schema::String { format } => synthesize_string(format.as_deref()),
        Schema::Integer => json!(1),
        Schema::Number => json!(1.0),
        Schema::Boolean => json!(true),
        Schema::Object {
            properties,
            required,
        } => {
            let mut instance = Map::new();
            for (name, property) in properties {
                if mode == GenerationMode::Full || required.contains(name) {
                    instance.insert(name.clone(), synthesize(property, mode));
                }
            }
            Value::Object(instance)
        }
        Schema::Array { items } => json!([synthesize(items, mode)]),
    }
}

fn synthesize_string(format: Option<&str>) -> Value {
    let sample = match format {
        Some("uuid") => Uuid::new_v4().to_string(),
        Some("date-time") => Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        Some("date") => Utc::now().format("%Y-%m-%d").to_string(),
        Some("email") => "restcheck@example.com".to_string(),
        Some("uri") => "https://example.com/restcheck".to_string(),
        _ => "restcheck-sample".to_string(),
    };

    Value::String(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::conforms_to_schema;

    fn title_version_schema() -> Schema {
        Schema::from_value(&json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "version": {"type": "string"},
                "description": {"type": "string"},
            },
            "required": ["title", "version"],
        }))
        .unwrap()
    }

    #[test]
    fn required_only_generation_yields_exactly_the_required_fields() {
        let payload = synthesize(&title_version_schema(), GenerationMode::RequiredOnly);

        let object = payload.as_object().unwrap();
        assert_eq!(2, object.len());
        assert!(object["title"].is_string());
        assert!(object["version"].is_string());
    }

    #[test]
    fn full_generation_populates_every_declared_field() {
        let payload = synthesize(&title_version_schema(), GenerationMode::Full);

        assert_eq!(3, payload.as_object().unwrap().len());
    }

    #[test]
    fn format_aware_string_generation() {
        let uuid = synthesize_string(Some("uuid"));
        Uuid::parse_str(uuid.as_str().unwrap()).expect("should be a parsable uuid");

        let date_time = synthesize_string(Some("date-time"));
        chrono::DateTime::parse_from_rfc3339(date_time.as_str().unwrap())
            .expect("should be a parsable RFC 3339 timestamp");

        let date = synthesize_string(Some("date"));
        chrono::NaiveDate::parse_from_str(date.as_str().unwrap(), "%Y-%m-%d")
            .expect("should be a parsable date");

        assert!(synthesize_string(Some("email")).as_str().unwrap().contains('@'));
        assert!(
            synthesize_string(Some("uri"))
                .as_str()
                .unwrap()
                .starts_with("https://")
        );
    }

    #[test]
    fn scalar_and_array_generation() {
        assert_eq!(json!(1), synthesize(&Schema::Integer, GenerationMode::RequiredOnly));
        assert_eq!(json!(1.0), synthesize(&Schema::Number, GenerationMode::RequiredOnly));
        assert_eq!(json!(true), synthesize(&Schema::Boolean, GenerationMode::RequiredOnly));
        assert_eq!(
            json!(["restcheck-sample"]),
            synthesize(
                &Schema::Array {
                    items: Box::new(Schema::String { format: None })
                },
                GenerationMode::RequiredOnly
            )
        );
    }

    #[test]
    fn synthesized_payload_satisfies_its_own_schema() {
        let schema = Schema::from_value(&json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "format": "uuid"},
                "count": {"type": "integer"},
                "ratio": {"type": "number"},
                "enabled": {"type": "boolean"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "nested": {
                    "type": "object",
                    "properties": {"created_at": {"type": "string", "format": "date-time"}},
                    "required": ["created_at"],
                },
            },
            "required": ["id", "count", "ratio", "enabled", "tags", "nested"],
        }))
        .unwrap();

        for mode in [GenerationMode::RequiredOnly, GenerationMode::Full] {
            let payload = synthesize(&schema, mode);
            assert!(
                conforms_to_schema(&payload, &schema),
                "payload should satisfy its own schema ({mode:?}): {payload:#}"
            );
        }
    }
}
