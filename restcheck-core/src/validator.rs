//! Response Validator: checks a response's status code and body against the
//! schema declared for that operation and status.
//!
//! Validation failure is data, not a fault: the functions here return a
//! [Verdict], never an error, and are deterministic for a given
//! response/operation pair.

use serde_json::Value;

use crate::entities::{HttpResponseRecord, Operation, ResponseBody, ResponseDecl, Schema, Verdict};

/// Validate a normalized response against the declared responses of the
/// operation that produced it.
pub fn validate(record: &HttpResponseRecord, operation: &Operation) -> Verdict {
    let Some(declaration) = operation.response_for_status(record.status) else {
        return Verdict::UndocumentedStatus;
    };

    match declaration {
        ResponseDecl::NoContent => match &record.body {
            ResponseBody::Empty => Verdict::Conformant,
            _ => Verdict::SchemaViolation {
                details: format!(
                    "expected an empty body for status {}, got a non-empty one",
                    record.status
                ),
            },
        },
        ResponseDecl::Content(schema) => match &record.body {
            ResponseBody::Empty => Verdict::SchemaViolation {
                details: format!("non-empty body expected for status {}", record.status),
            },
            ResponseBody::Text(_) => Verdict::SchemaViolation {
                details: "expected a valid json body".to_string(),
            },
            ResponseBody::Json(value) => validate_against_schema(value, schema),
        },
        ResponseDecl::Unsupported(_) => Verdict::Skipped,
    }
}

/// Whether an instance satisfies a schema, with no failure detail.
pub fn conforms_to_schema(instance: &Value, schema: &Schema) -> bool {
    validate_against_schema(instance, schema) == Verdict::Conformant
}

fn validate_against_schema(instance: &Value, schema: &Schema) -> Verdict {
    let validator = match jsonschema::validator_for(&schema.to_json_schema()) {
        Ok(validator) => validator,
        // Unreachable for schemas exported from the closed Schema type.
        Err(error) => {
            return Verdict::SchemaViolation {
                details: format!("declared schema could not be compiled: {error}"),
            };
        }
    };

    let details: Vec<String> = validator
        .iter_errors(instance)
        .map(|error| error.to_string())
        .collect();
    if details.is_empty() {
        Verdict::Conformant
    } else {
        Verdict::SchemaViolation {
            details: details.join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde_json::json;

    use crate::entities::HttpMethod;

    use super::*;

    fn register_schema() -> Schema {
        Schema::from_value(&json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "title": {"type": "string"},
            },
            "required": ["id", "title"],
        }))
        .unwrap()
    }

    fn operation_with_responses(responses: Vec<(&str, ResponseDecl)>) -> Operation {
        Operation {
            path: "/api/registers/{id}".to_string(),
            method: HttpMethod::Get,
            request_schema: None,
            responses: responses
                .into_iter()
                .map(|(status, declaration)| (status.to_string(), declaration))
                .collect::<BTreeMap<_, _>>(),
            tags: Vec::new(),
        }
    }

    fn record(status: u16, body: ResponseBody) -> HttpResponseRecord {
        HttpResponseRecord {
            status,
            body,
            location: None,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn conformant_body_passes() {
        let operation =
            operation_with_responses(vec![("200", ResponseDecl::Content(register_schema()))]);
        let record = record(
            200,
            ResponseBody::Json(json!({"id": 42, "title": "a register"})),
        );

        assert_eq!(Verdict::Conformant, validate(&record, &operation));
    }

    #[test]
    fn missing_required_field_is_a_schema_violation() {
        let operation =
            operation_with_responses(vec![("200", ResponseDecl::Content(register_schema()))]);
        let record = record(200, ResponseBody::Json(json!({"id": 42})));

        let verdict = validate(&record, &operation);
        let Verdict::SchemaViolation { details } = verdict else {
            panic!("expected a schema violation, got {verdict:?}");
        };
        assert!(details.contains("title"), "unexpected details: {details}");
    }

    #[test]
    fn type_mismatch_is_a_schema_violation() {
        let operation =
            operation_with_responses(vec![("200", ResponseDecl::Content(register_schema()))]);
        // A number where a string is declared must not pass, and vice versa.
        let record = record(200, ResponseBody::Json(json!({"id": "42", "title": 7})));

        assert!(validate(&record, &operation).is_failure());
    }

    #[test]
    fn undocumented_status_is_flagged() {
        let operation =
            operation_with_responses(vec![("200", ResponseDecl::Content(register_schema()))]);
        let record = record(418, ResponseBody::Empty);

        assert_eq!(Verdict::UndocumentedStatus, validate(&record, &operation));
    }

    #[test]
    fn default_response_covers_undeclared_statuses() {
        let operation = operation_with_responses(vec![
            ("200", ResponseDecl::Content(register_schema())),
            ("default", ResponseDecl::NoContent),
        ]);
        let record = record(500, ResponseBody::Empty);

        assert_eq!(Verdict::Conformant, validate(&record, &operation));
    }

    #[test]
    fn declared_no_content_requires_an_empty_body() {
        let operation = operation_with_responses(vec![("204", ResponseDecl::NoContent)]);

        assert_eq!(
            Verdict::Conformant,
            validate(&record(204, ResponseBody::Empty), &operation)
        );
        assert!(
            validate(
                &record(204, ResponseBody::Json(json!({"unexpected": true}))),
                &operation
            )
            .is_failure()
        );
    }

    #[test]
    fn non_json_body_where_schema_declared_is_a_violation() {
        let operation =
            operation_with_responses(vec![("200", ResponseDecl::Content(register_schema()))]);
        let record = record(200, ResponseBody::Text("<html>oops</html>".to_string()));

        assert!(validate(&record, &operation).is_failure());
    }

    #[test]
    fn unsupported_declared_schema_skips_validation() {
        let operation = operation_with_responses(vec![(
            "200",
            ResponseDecl::Unsupported("'oneOf' combinators are not supported".to_string()),
        )]);
        let record = record(200, ResponseBody::Json(json!({"anything": 1})));

        assert_eq!(Verdict::Skipped, validate(&record, &operation));
    }

    #[test]
    fn validation_is_deterministic() {
        let operation =
            operation_with_responses(vec![("200", ResponseDecl::Content(register_schema()))]);
        let record = record(200, ResponseBody::Json(json!({"id": 42})));

        assert_eq!(validate(&record, &operation), validate(&record, &operation));
    }
}
