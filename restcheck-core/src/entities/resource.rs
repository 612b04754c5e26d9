use std::collections::BTreeMap;

use crate::entities::{HttpMethod, Schema};

/// Declared response for one status code.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseDecl {
    /// Status declared without a content schema: the body must be empty
    NoContent,
    /// Status declared with a supported content schema
    Content(Schema),
    /// Status declared with a schema outside the supported subset;
    /// validation is skipped with this detail
    Unsupported(String),
}

/// One `(path, method)` pair declared by the OpenAPI document.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Path template as declared (`/api/registers/{id}`)
    pub path: String,

    /// HTTP method
    pub method: HttpMethod,

    /// Declared request body schema, if any
    pub request_schema: Option<Schema>,

    /// Declared responses, keyed by status code literal (`"200"`, …) or
    /// `"default"`
    pub responses: BTreeMap<String, ResponseDecl>,

    /// Declared OpenAPI tags
    pub tags: Vec<String>,
}

impl Operation {
    /// Declared response for a received status code.
    ///
    /// Falls back to the `default` response when the exact status is not
    /// declared. `None` means the status is undocumented altogether.
    pub fn response_for_status(&self, status: u16) -> Option<&ResponseDecl> {
        self.responses
            .get(&status.to_string())
            .or_else(|| self.responses.get("default"))
    }
}

/// One testable API resource: a collection path paired with its `{id}` item
/// path, together with the schemas driving payload synthesis and response
/// validation.
///
/// Derived once per run by [pair_paths][crate::spec::pair_paths]; immutable
/// thereafter.
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    /// Short name, the last segment of the collection path
    pub name: String,

    /// Collection path (`/api/registers`)
    pub collection_path: String,

    /// Item path template (`/api/registers/{id}`), absent for read-only
    /// resources
    pub item_path: Option<String>,

    /// Name of the path parameter in the item path (`id`)
    pub id_parameter: Option<String>,

    /// Schema of create/update request bodies, when the collection declares
    /// a POST with a supported body schema
    pub input_schema: Option<Schema>,

    /// Why the declared input schema could not be modeled, when it uses an
    /// unsupported shape. The create step fails with this detail instead of
    /// posting guessed data.
    pub input_schema_error: Option<String>,

    /// All declared CRUD operations, on both paths
    pub operations: Vec<Operation>,
}

impl ResourceSpec {
    /// The declared operation for a path/method pair, if any.
    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|operation| operation.path == path && operation.method == method)
    }

    /// The declared operation on the collection path, if any.
    pub fn collection_operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.operation(&self.collection_path, method)
    }

    /// The declared operation on the item path, if any.
    pub fn item_operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.item_path
            .as_ref()
            .and_then(|path| self.operation(path, method))
    }

    /// A resource without a paired item path only supports listing.
    pub fn is_read_only(&self) -> bool {
        self.item_path.is_none()
    }

    /// Method used for the update step: PATCH when declared, PUT otherwise.
    pub fn update_method(&self) -> Option<HttpMethod> {
        [HttpMethod::Patch, HttpMethod::Put]
            .into_iter()
            .find(|method| self.item_operation(*method).is_some())
    }

    /// Item path with the given identifier substituted for the parameter.
    pub fn item_path_for(&self, id: &str) -> Option<String> {
        match (&self.item_path, &self.id_parameter) {
            (Some(path), Some(parameter)) => {
                Some(path.replace(&format!("{{{parameter}}}"), id))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(path: &str, method: HttpMethod) -> Operation {
        Operation {
            path: path.to_string(),
            method,
            request_schema: None,
            responses: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    fn register_resource(item_methods: &[HttpMethod]) -> ResourceSpec {
        let mut operations = vec![
            operation("/api/registers", HttpMethod::Get),
            operation("/api/registers", HttpMethod::Post),
        ];
        operations.extend(
            item_methods
                .iter()
                .map(|method| operation("/api/registers/{id}", *method)),
        );

        ResourceSpec {
            name: "registers".to_string(),
            collection_path: "/api/registers".to_string(),
            item_path: Some("/api/registers/{id}".to_string()),
            id_parameter: Some("id".to_string()),
            input_schema: None,
            input_schema_error: None,
            operations,
        }
    }

    #[test]
    fn item_path_substitutes_the_identifier() {
        let resource = register_resource(&[HttpMethod::Get]);

        assert_eq!(
            Some("/api/registers/42".to_string()),
            resource.item_path_for("42")
        );
    }

    #[test]
    fn update_method_prefers_patch_over_put() {
        let resource = register_resource(&[HttpMethod::Patch, HttpMethod::Put]);
        assert_eq!(Some(HttpMethod::Patch), resource.update_method());

        let resource = register_resource(&[HttpMethod::Put]);
        assert_eq!(Some(HttpMethod::Put), resource.update_method());

        let resource = register_resource(&[HttpMethod::Get, HttpMethod::Delete]);
        assert_eq!(None, resource.update_method());
    }

    #[test]
    fn response_lookup_falls_back_to_default() {
        let mut operation = operation("/api/registers", HttpMethod::Get);
        operation
            .responses
            .insert("200".to_string(), ResponseDecl::NoContent);
        operation
            .responses
            .insert("default".to_string(), ResponseDecl::NoContent);

        assert!(operation.response_for_status(200).is_some());
        assert!(operation.response_for_status(500).is_some());

        operation.responses.remove("default");
        assert!(operation.response_for_status(500).is_none());
    }
}
