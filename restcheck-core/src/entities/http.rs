use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods exercised by lifecycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// GET, used for collection listing and item fetching
    Get,
    /// POST, used for resource creation
    Post,
    /// PUT, used for full item replacement
    Put,
    /// PATCH, used for item update
    Patch,
    /// DELETE, used for item removal
    Delete,
}

impl HttpMethod {
    /// The uppercase wire representation of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Parse a lowercase OpenAPI operation key (`get`, `post`, …).
    ///
    /// Returns `None` for non-CRUD operation keys such as `options` or `head`.
    pub fn from_openapi_key(key: &str) -> Option<Self> {
        match key {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "patch" => Some(HttpMethod::Patch),
            "delete" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of a normalized HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// The server answered with an empty body
    Empty,
    /// The body parsed as JSON
    Json(Value),
    /// The body was non-empty but not valid JSON
    Text(String),
}

impl ResponseBody {
    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }

    /// The parsed JSON value, if the body was JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Normalized record of one HTTP response, as produced by the executor.
#[derive(Debug, Clone)]
pub struct HttpResponseRecord {
    /// HTTP status code received
    pub status: u16,

    /// Response body
    pub body: ResponseBody,

    /// Value of the `Location` header, when present
    pub location: Option<String>,

    /// Time elapsed between sending the request and reading the full body
    pub elapsed: Duration,
}
