//! Report Aggregator: folds the step results of all lifecycle runs into a
//! per-endpoint conformance report.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entities::{HttpMethod, LifecycleRun, ResourceSpec, StepResult, Verdict};
use crate::spec::SkippedPath;

/// Conformance outcome of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Every step that exercised the endpoint passed
    Pass,
    /// At least one step failed contract conformance or could not complete
    Fail,
    /// The endpoint was declared but never exercised
    NotTested,
}

/// Aggregated result for one declared `(path, method)` pair.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointOutcome {
    /// Declared path template
    pub path: String,

    /// HTTP method
    pub method: HttpMethod,

    /// Overall outcome for the endpoint
    pub outcome: Outcome,

    /// Number of passing steps
    pub pass_count: usize,

    /// Number of failing steps
    pub fail_count: usize,

    /// One representative failure message, or the reason the endpoint was
    /// not tested
    pub detail: Option<String>,
}

/// Final report of a conformance run.
///
/// Immutable once aggregated; rendering and persistence are left to the
/// caller.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    /// Per-endpoint outcomes, ordered by path then method
    pub endpoints: Vec<EndpointOutcome>,

    /// Total number of steps executed across all runs
    pub total_steps: usize,

    /// Number of passing steps
    pub passed: usize,

    /// Number of failing steps
    pub failed: usize,

    /// Number of endpoints declared but never exercised
    pub not_tested: usize,
}

impl TestReport {
    /// Fold lifecycle runs into per-endpoint outcomes.
    ///
    /// Endpoints declared by the resources but never exercised, and paths the
    /// pairing skipped, are reported as [Outcome::NotTested] so the report
    /// always covers the full declared surface.
    pub fn aggregate(
        runs: &[LifecycleRun],
        resources: &[ResourceSpec],
        skipped: &[SkippedPath],
    ) -> Self {
        let mut tallies: BTreeMap<(String, HttpMethod), EndpointTally> = BTreeMap::new();

        for run in runs {
            for step in &run.steps {
                tallies
                    .entry((step.endpoint.clone(), step.method))
                    .or_default()
                    .record(step);
            }
        }

        let mut endpoints: Vec<EndpointOutcome> = tallies
            .into_iter()
            .map(|((path, method), tally)| tally.into_outcome(path, method))
            .collect();

        for resource in resources {
            for operation in &resource.operations {
                let already_reported = endpoints.iter().any(|endpoint| {
                    endpoint.path == operation.path && endpoint.method == operation.method
                });
                if !already_reported {
                    endpoints.push(EndpointOutcome {
                        path: operation.path.clone(),
                        method: operation.method,
                        outcome: Outcome::NotTested,
                        pass_count: 0,
                        fail_count: 0,
                        detail: Some("declared operation was not exercised".to_string()),
                    });
                }
            }
        }
        for skip in skipped {
            for method in &skip.methods {
                endpoints.push(EndpointOutcome {
                    path: skip.path.clone(),
                    method: *method,
                    outcome: Outcome::NotTested,
                    pass_count: 0,
                    fail_count: 0,
                    detail: Some(skip.reason.clone()),
                });
            }
        }
        endpoints.sort_by(|a, b| (&a.path, a.method).cmp(&(&b.path, b.method)));

        let passed = endpoints.iter().map(|endpoint| endpoint.pass_count).sum();
        let failed = endpoints.iter().map(|endpoint| endpoint.fail_count).sum();
        let not_tested = endpoints
            .iter()
            .filter(|endpoint| endpoint.outcome == Outcome::NotTested)
            .count();

        Self {
            endpoints,
            total_steps: passed + failed,
            passed,
            failed,
            not_tested,
        }
    }

    /// Whether any step failed. Drives the process exit code.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Default)]
struct EndpointTally {
    pass_count: usize,
    fail_count: usize,
    detail: Option<String>,
}

impl EndpointTally {
    fn record(&mut self, step: &StepResult) {
        if step.is_success() {
            self.pass_count += 1;
        } else {
            self.fail_count += 1;
            if self.detail.is_none() {
                self.detail = Some(failure_detail(step));
            }
        }
    }

    fn into_outcome(self, path: String, method: HttpMethod) -> EndpointOutcome {
        let outcome = if self.fail_count > 0 {
            Outcome::Fail
        } else {
            Outcome::Pass
        };

        EndpointOutcome {
            path,
            method,
            outcome,
            pass_count: self.pass_count,
            fail_count: self.fail_count,
            detail: self.detail,
        }
    }
}

fn failure_detail(step: &StepResult) -> String {
    if let Some(error) = &step.error {
        return format!("{} step: {error}", step.step);
    }
    match &step.verdict {
        Verdict::SchemaViolation { details } => format!("{} step: {details}", step.step),
        Verdict::UndocumentedStatus => format!(
            "{} step: undocumented status {}",
            step.step,
            step.status.unwrap_or_default()
        ),
        _ => format!("{} step failed", step.step),
    }
}
