use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use slog::{Drain, Level, Logger, info};

use restcheck_core::spec::OpenApiDocument;
use restcheck_core::{AuthScheme, Outcome, StdResult, TesterConfig, TestReport, run_conformance};

/// Checks that a live HTTP API honors the CRUD lifecycles declared by its
/// OpenAPI document.
#[derive(Parser, Debug, Clone)]
#[command(version, bin_name = "restcheck")]
pub struct Args {
    /// Path to the OpenAPI document (JSON or YAML)
    spec_file: PathBuf,

    /// Base URL of the API under test
    #[clap(long)]
    base_url: String,

    /// Username for HTTP basic authentication
    #[clap(long, env = "API_USERNAME")]
    username: Option<String>,

    /// Password for HTTP basic authentication
    #[clap(long, env = "API_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Bearer token, takes precedence over basic credentials
    #[clap(long, env = "API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout (in s)
    #[clap(long, default_value_t = 30)]
    timeout: u64,

    /// Maximum retries of transient failures per request
    #[clap(long, default_value_t = 3)]
    max_retries: usize,

    /// Only test the resources with these names or collection paths
    /// (comma separated list)
    #[clap(long, value_delimiter = ',')]
    resources: Option<Vec<String>>,

    /// Number of resource lifecycles run in parallel
    #[clap(long, default_value_t = 1)]
    parallelism: usize,

    /// Print the report as JSON instead of text
    #[clap(long)]
    json: bool,

    /// Verbosity level
    #[clap(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbosity level, add more v to increase"
    )]
    verbose: u8,
}

impl Args {
    fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::Error,
            1 => Level::Warning,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }

    fn auth(&self) -> AuthScheme {
        if let Some(token) = &self.token {
            return AuthScheme::Bearer {
                token: token.clone(),
            };
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => AuthScheme::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => AuthScheme::None,
        }
    }

    fn tester_config(&self) -> TesterConfig {
        let mut config = TesterConfig::new(self.base_url.clone());
        config.auth = self.auth();
        config.request_timeout = Duration::from_secs(self.timeout);
        config.max_retries = self.max_retries;
        config.resource_filter = self.resources.clone();
        config.max_parallel_lifecycles = self.parallelism;

        config
    }
}

#[tokio::main]
async fn main() -> StdResult<ExitCode> {
    let args = Args::parse();
    let logger = build_logger(&args);
    info!(
        logger, "Starting conformance run";
        "spec_file" => args.spec_file.display().to_string(), "base_url" => &args.base_url,
    );

    let document = OpenApiDocument::from_file(&args.spec_file)?;
    let report = run_conformance(&document, &args.tester_config(), &logger).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build_logger(args: &Args) -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog::LevelFilter::new(drain, args.log_level()).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(Arc::new(drain), slog::o!())
}

fn print_report(report: &TestReport) {
    for endpoint in &report.endpoints {
        let label = match endpoint.outcome {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::NotTested => "NOT TESTED",
        };
        println!("{label:<10} {:<6} {}", endpoint.method, endpoint.path);
        if let Some(detail) = &endpoint.detail {
            println!("           {detail}");
        }
    }
    println!();
    println!(
        "{} steps: {} passed, {} failed, {} endpoints not tested",
        report.total_steps, report.passed, report.failed, report.not_tested
    );
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn bearer_token_takes_precedence_over_basic_credentials() {
        let args = Args::parse_from([
            "restcheck",
            "openapi.yaml",
            "--base-url",
            "http://localhost:8080",
            "--username",
            "admin",
            "--password",
            "admin",
            "--token",
            "t-1",
        ]);

        assert_eq!(
            AuthScheme::Bearer {
                token: "t-1".to_string()
            },
            args.auth()
        );
    }

    #[test]
    fn config_carries_the_parsed_options() {
        let args = Args::parse_from([
            "restcheck",
            "openapi.yaml",
            "--base-url",
            "http://localhost:8080",
            "--timeout",
            "5",
            "--max-retries",
            "0",
            "--resources",
            "registers,owners",
            "--parallelism",
            "4",
        ]);
        let config = args.tester_config();

        assert_eq!("http://localhost:8080", config.base_url);
        assert_eq!(Duration::from_secs(5), config.request_timeout);
        assert_eq!(0, config.max_retries);
        assert_eq!(
            Some(vec!["registers".to_string(), "owners".to_string()]),
            config.resource_filter
        );
        assert_eq!(4, config.max_parallel_lifecycles);
    }
}
