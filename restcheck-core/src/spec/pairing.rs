use std::collections::BTreeMap;

use serde_json::Value;

use crate::entities::{HttpMethod, Operation, ResourceSpec, ResponseDecl, Schema};
use crate::spec::{OpenApiDocument, SpecResolutionError};

const JSON_CONTENT_TYPE: &str = "application/json";

/// A declared path left out of the lifecycle runs, with the reason why.
///
/// Surfaces in the report as `NotTested` entries so that ambiguous or
/// unpairable specs stay diagnosable instead of silently shrinking coverage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    /// The declared path
    pub path: String,

    /// CRUD methods declared on the path
    pub methods: Vec<HttpMethod>,

    /// Why the path was not turned into a testable resource
    pub reason: String,
}

/// Result of pairing the document's paths into resources.
#[derive(Debug)]
pub struct PairingOutcome {
    /// Testable resources, ordered by collection path
    pub resources: Vec<ResourceSpec>,

    /// Paths excluded from testing, with diagnostics
    pub skipped: Vec<SkippedPath>,
}

/// Pair collection paths with their `{id}` item paths into [ResourceSpec]s.
///
/// The pairing is a naming-convention policy, not something the document
/// declares explicitly: the item path of a collection path `P` is the unique
/// declared path of the form `P/{parameter}` (exactly one extra segment,
/// entirely a parameter). Precedence rules:
///
/// 1. A path containing no `{parameter}` segment is a collection candidate.
/// 2. A collection candidate declaring neither GET nor POST is excluded.
/// 3. Exactly one `P/{parameter}` child: the pair becomes a full resource.
/// 4. No such child: the collection becomes a read-only resource.
/// 5. Several such children: the collection is skipped as ambiguous and
///    reported as `NotTested` rather than guessed at.
///
/// Parametrized paths not claimed by any collection are skipped likewise.
pub fn pair_paths(document: &OpenApiDocument) -> Result<PairingOutcome, SpecResolutionError> {
    let paths = document.paths();
    let mut resources = Vec::new();
    let mut skipped = Vec::new();
    let mut claimed_item_paths = Vec::new();

    let collection_paths: Vec<&String> =
        paths.keys().filter(|path| !path.contains('{')).collect();

    for collection_path in &collection_paths {
        let collection_value = &paths[collection_path.as_str()];
        let collection_methods = declared_methods(collection_value);

        if !collection_methods.contains(&HttpMethod::Get)
            && !collection_methods.contains(&HttpMethod::Post)
        {
            skipped.push(SkippedPath {
                path: collection_path.to_string(),
                methods: collection_methods,
                reason: "no GET or POST declared on the collection path".to_string(),
            });
            continue;
        }

        let item_candidates: Vec<&String> = paths
            .keys()
            .filter(|path| item_parameter_of(collection_path, path).is_some())
            .collect();

        let item_path = match item_candidates.as_slice() {
            [] => None,
            [single] => Some(single.to_string()),
            several => {
                skipped.push(SkippedPath {
                    path: collection_path.to_string(),
                    methods: collection_methods,
                    reason: format!(
                        "ambiguous item path pairing, candidates: {}",
                        several
                            .iter()
                            .map(|path| path.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                });
                continue;
            }
        };
        if let Some(path) = &item_path {
            claimed_item_paths.push(path.clone());
        }

        resources.push(build_resource(
            document,
            collection_path,
            collection_value,
            item_path.as_deref(),
            item_path.as_deref().map(|path| (&paths[path]).clone()).as_ref(),
        )?);
    }

    for (path, value) in &paths {
        if path.contains('{') && !claimed_item_paths.contains(path) {
            skipped.push(SkippedPath {
                path: path.clone(),
                methods: declared_methods(value),
                reason: "parametrized path without a matching collection path".to_string(),
            });
        }
    }

    Ok(PairingOutcome { resources, skipped })
}

/// The parameter name when `candidate` is `collection` plus exactly one
/// `{parameter}` segment.
fn item_parameter_of(collection: &str, candidate: &str) -> Option<String> {
    let suffix = candidate.strip_prefix(collection)?.strip_prefix('/')?;

    suffix
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|parameter| !parameter.is_empty() && !parameter.contains('/'))
        .map(String::from)
}

fn declared_methods(path_value: &Value) -> Vec<HttpMethod> {
    path_value
        .as_object()
        .map(|operations| {
            operations
                .keys()
                .filter_map(|key| HttpMethod::from_openapi_key(key))
                .collect()
        })
        .unwrap_or_default()
}

fn build_resource(
    document: &OpenApiDocument,
    collection_path: &str,
    collection_value: &Value,
    item_path: Option<&str>,
    item_value: Option<&Value>,
) -> Result<ResourceSpec, SpecResolutionError> {
    let mut operations = Vec::new();
    let mut input_schema = None;
    let mut input_schema_error = None;

    for method in declared_methods(collection_value) {
        let operation_value = &collection_value[method.as_str().to_lowercase()];
        let operation = build_operation(document, collection_path, method, operation_value)?;

        if method == HttpMethod::Post {
            match resolved_request_schema(document, operation_value)? {
                Some(Ok(schema)) => input_schema = Some(schema),
                Some(Err(error)) => input_schema_error = Some(error),
                None => {}
            }
        }
        operations.push(operation);
    }

    if let (Some(item_path), Some(item_value)) = (item_path, item_value) {
        for method in declared_methods(item_value) {
            let operation_value = &item_value[method.as_str().to_lowercase()];
            operations.push(build_operation(document, item_path, method, operation_value)?);
        }
    }

    let name = collection_path
        .rsplit('/')
        .next()
        .unwrap_or(collection_path)
        .to_string();
    let id_parameter = item_path.and_then(|path| {
        path.rsplit('/')
            .next()
            .and_then(|segment| segment.strip_prefix('{'))
            .and_then(|segment| segment.strip_suffix('}'))
            .map(String::from)
    });

    Ok(ResourceSpec {
        name,
        collection_path: collection_path.to_string(),
        item_path: item_path.map(String::from),
        id_parameter,
        input_schema,
        input_schema_error,
        operations,
    })
}

fn build_operation(
    document: &OpenApiDocument,
    path: &str,
    method: HttpMethod,
    operation_value: &Value,
) -> Result<Operation, SpecResolutionError> {
    let request_schema = match resolved_request_schema(document, operation_value)? {
        Some(Ok(schema)) => Some(schema),
        _ => None,
    };

    let mut responses = BTreeMap::new();
    if let Some(declared) = operation_value.get("responses").and_then(Value::as_object) {
        for (status, response_value) in declared {
            let schema_value = response_value
                .pointer(&format!("/content/{}/schema", JSON_CONTENT_TYPE.replace('/', "~1")));
            let declaration = match schema_value {
                None => ResponseDecl::NoContent,
                Some(schema_value) => {
                    let resolved = document.resolve(schema_value)?;
                    match Schema::from_value(&resolved) {
                        Ok(schema) => ResponseDecl::Content(schema),
                        Err(error) => ResponseDecl::Unsupported(error.to_string()),
                    }
                }
            };
            responses.insert(status.clone(), declaration);
        }
    }

    let tags = operation_value
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(Operation {
        path: path.to_string(),
        method,
        request_schema,
        responses,
        tags,
    })
}

/// The resolved JSON request body schema of an operation.
///
/// `None` when the operation declares no JSON request body; `Some(Err)` when
/// the declared schema uses an unsupported shape.
#[allow(clippy::type_complexity)]
fn resolved_request_schema(
    document: &OpenApiDocument,
    operation_value: &Value,
) -> Result<Option<Result<Schema, String>>, SpecResolutionError> {
    let schema_value = operation_value.pointer(&format!(
        "/requestBody/content/{}/schema",
        JSON_CONTENT_TYPE.replace('/', "~1")
    ));

    match schema_value {
        None => Ok(None),
        Some(schema_value) => {
            let resolved = document.resolve(schema_value)?;
            Ok(Some(
                Schema::from_value(&resolved).map_err(|error| error.to_string()),
            ))
        }
    }
}
