use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::entities::HttpMethod;

/// The lifecycle step that produced a [StepResult].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepKind {
    /// GET on the collection path
    Listed,
    /// POST of a synthesized payload on the collection path
    Created,
    /// GET on the item path with the extracted identifier
    Fetched,
    /// PATCH (or PUT) of a synthesized payload on the item path
    Updated,
    /// DELETE on the item path
    Deleted,
    /// GET on the item path after deletion, expecting the resource to be gone
    VerifyDeleted,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StepKind::Listed => "listed",
            StepKind::Created => "created",
            StepKind::Fetched => "fetched",
            StepKind::Updated => "updated",
            StepKind::Deleted => "deleted",
            StepKind::VerifyDeleted => "verify-deleted",
        };
        write!(f, "{label}")
    }
}

/// Validation verdict for one response.
///
/// A failed validation is data, not a fault: the validator never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// The response matches the schema declared for its status
    Conformant,
    /// The response body violates the declared schema
    SchemaViolation {
        /// Joined validation error messages
        details: String,
    },
    /// The received status code is not declared by the contract
    UndocumentedStatus,
    /// Validation was not applicable (no response obtained, or the step is
    /// not schema-checked)
    Skipped,
}

impl Verdict {
    /// Whether this verdict marks the step as failing conformance.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Verdict::SchemaViolation { .. } | Verdict::UndocumentedStatus
        )
    }
}

/// Outcome of one HTTP call performed during a lifecycle run.
///
/// Records enough to be audited independently of the run that produced it:
/// method, actual path, status and verdict. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Which lifecycle step this was
    pub step: StepKind,

    /// HTTP method used
    pub method: HttpMethod,

    /// Actual path requested, identifiers substituted
    pub path: String,

    /// Declared path template the call belongs to, used for aggregation
    pub endpoint: String,

    /// Request payload sent, if any
    pub request_payload: Option<Value>,

    /// HTTP status received, `None` when the call never completed
    pub status: Option<u16>,

    /// Validation verdict for the response
    pub verdict: Verdict,

    /// Transport or step-level error detail, if any
    pub error: Option<String>,

    /// Elapsed wall-clock time for the call
    pub elapsed: Duration,
}

impl StepResult {
    /// A step succeeds when it completed without error and its response was
    /// not found non-conformant.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.verdict.is_failure()
    }
}

/// One full create → read → update → delete attempt for one resource.
///
/// Lives for the duration of a single resource's test pass; its step results
/// are retained by the report, the run object itself is discarded.
#[derive(Debug, Clone)]
pub struct LifecycleRun {
    /// Name of the resource exercised
    pub resource_name: String,

    /// Collection path of the resource
    pub collection_path: String,

    /// Ordered step results, one per HTTP call performed
    pub steps: Vec<StepResult>,

    /// Identifier extracted from the create response, always the value the
    /// server returned, never synthesized
    pub extracted_id: Option<String>,
}
