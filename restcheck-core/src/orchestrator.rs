//! Lifecycle Orchestrator: sequences the create → fetch → update → delete
//! lifecycle for each derived resource, threading the server-issued
//! identifier between steps and validating every response on the way.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use serde_json::Value;
use slog::{Logger, debug, info, warn};
use tokio::sync::{Semaphore, mpsc};

use crate::StdResult;
use crate::config::TesterConfig;
use crate::entities::{
    HttpMethod, HttpResponseRecord, LifecycleRun, Operation, ResourceSpec, ResponseBody, StepKind,
    StepResult, Verdict,
};
use crate::executor::HttpExecutor;
use crate::report::TestReport;
use crate::spec::{OpenApiDocument, pair_paths};
use crate::synthesizer::{GenerationMode, synthesize};
use crate::validator;

/// Statuses accepted as proof that a deleted resource is gone.
const GONE_STATUSES: [u16; 2] = [404, 410];

/// Runs resource lifecycles against the API under test.
///
/// Identifiers are always the values the server returned, never synthesized:
/// a create response from which no identifier can be extracted ends the
/// lifecycle there.
#[derive(Clone)]
pub struct LifecycleOrchestrator {
    executor: Arc<HttpExecutor>,
    logger: Logger,
}

impl LifecycleOrchestrator {
    /// Create an orchestrator issuing its requests through the given
    /// executor.
    pub fn new(executor: HttpExecutor, logger: &Logger) -> Self {
        Self {
            executor: Arc::new(executor),
            logger: logger.clone(),
        }
    }

    /// Run the full lifecycle of one resource.
    ///
    /// Steps operate strictly in order: list, create, fetch, update, delete,
    /// verify deletion. Each step is only attempted when the resource
    /// declares the operation; the item steps are only attempted once a
    /// create succeeded and yielded an identifier. Deletion is attempted
    /// whenever a resource was created, whatever the intermediate steps
    /// observed, so that test data does not accumulate on the server.
    pub async fn run_lifecycle(&self, resource: &ResourceSpec) -> LifecycleRun {
        info!(
            self.logger, "Running resource lifecycle";
            "resource" => &resource.name, "collection_path" => &resource.collection_path,
        );
        let mut steps = Vec::new();

        if let Some(operation) = resource.collection_operation(HttpMethod::Get) {
            let (step, record) = self
                .execute_step(StepKind::Listed, operation, &resource.collection_path, None)
                .await;
            if let Some(count) = record.as_ref().and_then(collection_member_count) {
                debug!(
                    self.logger, "Listed collection members";
                    "resource" => &resource.name, "count" => count,
                );
            }
            steps.push(step);
        }

        let extracted_id = self.run_create(resource, &mut steps).await;
        if let Some(id) = &extracted_id
            && let Some(item_path) = resource.item_path_for(id)
        {
            self.run_item_steps(resource, &item_path, &mut steps).await;
        }

        LifecycleRun {
            resource_name: resource.name.clone(),
            collection_path: resource.collection_path.clone(),
            steps,
            extracted_id,
        }
    }

    /// Run the lifecycles of all resources, at most `max_parallel` at a time.
    pub async fn run_lifecycles(
        &self,
        resources: Vec<ResourceSpec>,
        max_parallel: usize,
    ) -> Vec<LifecycleRun> {
        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let (sender, mut receiver) = mpsc::unbounded_channel();

        for resource in resources {
            let semaphore = semaphore.clone();
            let sender = sender.clone();
            let orchestrator = self.clone();
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                let run = orchestrator.run_lifecycle(&resource).await;
                let _ = sender.send(run);
            });
        }
        drop(sender);

        let mut runs = Vec::new();
        while let Some(run) = receiver.recv().await {
            runs.push(run);
        }
        runs.sort_by(|a, b| a.collection_path.cmp(&b.collection_path));

        runs
    }

    /// Attempt the create step, returning the extracted identifier when the
    /// resource was created and is addressable.
    async fn run_create(
        &self,
        resource: &ResourceSpec,
        steps: &mut Vec<StepResult>,
    ) -> Option<String> {
        let operation = resource.collection_operation(HttpMethod::Post)?;

        if let Some(reason) = &resource.input_schema_error {
            warn!(
                self.logger, "Create step cannot run, input schema is not supported";
                "resource" => &resource.name, "reason" => reason,
            );
            steps.push(StepResult {
                step: StepKind::Created,
                method: HttpMethod::Post,
                path: resource.collection_path.clone(),
                endpoint: operation.path.clone(),
                request_payload: None,
                status: None,
                verdict: Verdict::Skipped,
                error: Some(format!("input schema is not supported: {reason}")),
                elapsed: std::time::Duration::ZERO,
            });
            return None;
        }

        let payload = resource
            .input_schema
            .as_ref()
            .map(|schema| synthesize(schema, GenerationMode::RequiredOnly));
        let (mut step, record) = self
            .execute_step(
                StepKind::Created,
                operation,
                &resource.collection_path,
                payload,
            )
            .await;

        let created = record
            .as_ref()
            .is_some_and(|record| (200..300).contains(&record.status));
        let extracted_id = if created {
            let id = record.as_ref().and_then(extract_identifier);
            if id.is_none() {
                step.error =
                    Some("no identifier could be extracted from the create response".to_string());
            }
            id
        } else {
            None
        };
        steps.push(step);

        extracted_id
    }

    /// Fetch, update, delete and verify deletion on the item path of a
    /// created resource.
    async fn run_item_steps(
        &self,
        resource: &ResourceSpec,
        item_path: &str,
        steps: &mut Vec<StepResult>,
    ) {
        if let Some(operation) = resource.item_operation(HttpMethod::Get) {
            let (step, _) = self
                .execute_step(StepKind::Fetched, operation, item_path, None)
                .await;
            steps.push(step);
        }

        if let Some(method) = resource.update_method()
            && let Some(operation) = resource.item_operation(method)
        {
            let payload = resource
                .input_schema
                .as_ref()
                .map(|schema| synthesize(schema, GenerationMode::Full));
            let (step, _) = self
                .execute_step(StepKind::Updated, operation, item_path, payload)
                .await;
            steps.push(step);
        }

        if let Some(operation) = resource.item_operation(HttpMethod::Delete) {
            let (step, _) = self
                .execute_step(StepKind::Deleted, operation, item_path, None)
                .await;
            let deleted = step.is_success();
            steps.push(step);

            if deleted {
                steps.push(self.verify_deleted(resource, item_path).await);
            }
        }
    }

    /// Probe the item path after deletion, expecting the resource to be gone.
    ///
    /// Judged on the status alone: the probe is ours, not part of the
    /// declared contract.
    async fn verify_deleted(&self, resource: &ResourceSpec, item_path: &str) -> StepResult {
        let endpoint = resource.item_path.clone().unwrap_or_else(|| item_path.to_string());
        let started = Instant::now();

        match self.executor.execute(HttpMethod::Get, item_path, None).await {
            Ok(record) => {
                let error = if GONE_STATUSES.contains(&record.status) {
                    None
                } else {
                    Some(format!(
                        "resource still retrievable after delete (status {})",
                        record.status
                    ))
                };
                StepResult {
                    step: StepKind::VerifyDeleted,
                    method: HttpMethod::Get,
                    path: item_path.to_string(),
                    endpoint,
                    request_payload: None,
                    status: Some(record.status),
                    verdict: if error.is_none() {
                        Verdict::Conformant
                    } else {
                        Verdict::Skipped
                    },
                    error,
                    elapsed: record.elapsed,
                }
            }
            Err(error) => StepResult {
                step: StepKind::VerifyDeleted,
                method: HttpMethod::Get,
                path: item_path.to_string(),
                endpoint,
                request_payload: None,
                status: None,
                verdict: Verdict::Skipped,
                error: Some(error.to_string()),
                elapsed: started.elapsed(),
            },
        }
    }

    /// Issue one request and validate its response, returning the step
    /// result together with the raw record for identifier extraction.
    async fn execute_step(
        &self,
        kind: StepKind,
        operation: &Operation,
        path: &str,
        payload: Option<Value>,
    ) -> (StepResult, Option<HttpResponseRecord>) {
        let started = Instant::now();

        match self
            .executor
            .execute(operation.method, path, payload.as_ref())
            .await
        {
            Ok(record) => {
                let verdict = validator::validate(&record, operation);
                debug!(
                    self.logger, "Step completed";
                    "step" => %kind, "method" => %operation.method, "path" => path,
                    "status" => record.status, "verdict" => ?verdict,
                );
                let step = StepResult {
                    step: kind,
                    method: operation.method,
                    path: path.to_string(),
                    endpoint: operation.path.clone(),
                    request_payload: payload,
                    status: Some(record.status),
                    verdict,
                    error: None,
                    elapsed: record.elapsed,
                };

                (step, Some(record))
            }
            Err(error) => {
                warn!(
                    self.logger, "Step could not complete";
                    "step" => %kind, "method" => %operation.method, "path" => path,
                    "error" => %error,
                );
                let step = StepResult {
                    step: kind,
                    method: operation.method,
                    path: path.to_string(),
                    endpoint: operation.path.clone(),
                    request_payload: payload,
                    status: None,
                    verdict: Verdict::Skipped,
                    error: Some(error.to_string()),
                    elapsed: started.elapsed(),
                };

                (step, None)
            }
        }
    }
}

/// Extract the identifier of a created resource from the create response.
///
/// Tried in order: an `id` field in the body, a `uuid` field in the body,
/// the trailing segment of a `Location` header.
fn extract_identifier(record: &HttpResponseRecord) -> Option<String> {
    if let ResponseBody::Json(body) = &record.body {
        for key in ["id", "uuid"] {
            match body.get(key) {
                Some(Value::String(id)) => return Some(id.clone()),
                Some(Value::Number(id)) => return Some(id.to_string()),
                _ => {}
            }
        }
    }

    record
        .location
        .as_ref()
        .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map(String::from)
}

/// Number of members in a listing response, seen through the common
/// collection envelopes (`hydra:member`, `items`, `results`) or a bare
/// array. Used for logging only.
fn collection_member_count(record: &HttpResponseRecord) -> Option<usize> {
    let body = record.body.as_json()?;
    if let Some(members) = body.as_array() {
        return Some(members.len());
    }
    ["hydra:member", "items", "results"]
        .iter()
        .find_map(|envelope| body.get(envelope).and_then(Value::as_array))
        .map(Vec::len)
}

/// Run the whole conformance suite: derive the resources, check the
/// connection, run every selected lifecycle and aggregate the report.
///
/// A document that cannot be resolved, or an API that cannot be reached at
/// all, is a fatal error. A non-conformant API is not: it comes back as a
/// report with failures.
pub async fn run_conformance(
    document: &OpenApiDocument,
    config: &TesterConfig,
    logger: &Logger,
) -> StdResult<TestReport> {
    let outcome =
        pair_paths(document).with_context(|| "Deriving resources from the OpenAPI document failed")?;
    let selected: Vec<ResourceSpec> = outcome
        .resources
        .into_iter()
        .filter(|resource| config.selects(&resource.name, &resource.collection_path))
        .collect();
    info!(
        logger, "Derived resources from the OpenAPI document";
        "selected" => selected.len(), "skipped_paths" => outcome.skipped.len(),
    );

    let executor = HttpExecutor::new(config, logger)?;
    let preflight_status = executor.check_connection().await?;
    if preflight_status >= 400 {
        warn!(
            logger, "API reachable but the connection preflight was rejected";
            "status" => preflight_status,
        );
    }

    let orchestrator = LifecycleOrchestrator::new(executor, logger);
    let runs = orchestrator
        .run_lifecycles(selected.clone(), config.max_parallel_lifecycles)
        .await;

    Ok(TestReport::aggregate(&runs, &selected, &outcome.skipped))
}
