#![warn(missing_docs)]

//! Engine verifying that a live HTTP API honors its declared OpenAPI contract.
//!
//! Provide:
//! - A [Spec Model][spec] deriving testable [resources][entities::ResourceSpec] from an
//!   OpenAPI document, pairing collection paths with their `{id}` item paths.
//! - A [Payload Synthesizer][synthesizer] producing minimal valid request bodies from
//!   the declared input schemas.
//! - An [HTTP Executor][executor] with authentication, per-request timeout and bounded
//!   retry of transient failures.
//! - A [Response Validator][validator] checking each response against the schema
//!   declared for its operation and status.
//! - A [Lifecycle Orchestrator][orchestrator] sequencing create → fetch → update →
//!   delete per resource, threading server-issued identifiers between steps.
//! - A [Report Aggregator][report] condensing every step outcome into a pass/fail
//!   summary per endpoint.

pub mod config;
pub mod entities;
pub mod executor;
pub mod orchestrator;
pub mod report;
pub mod spec;
pub mod synthesizer;
pub mod validator;

#[cfg(test)]
pub(crate) mod test;

pub use config::{AuthScheme, TesterConfig};
pub use executor::{ExecutorError, HttpExecutor, RequestRetryPolicy};
pub use orchestrator::{LifecycleOrchestrator, run_conformance};
pub use report::{EndpointOutcome, Outcome, TestReport};
pub use spec::{OpenApiDocument, PairingOutcome, SpecResolutionError, pair_paths};

/// Generic error type.
pub type StdError = anyhow::Error;

/// Generic result type.
pub type StdResult<T> = anyhow::Result<T>;
