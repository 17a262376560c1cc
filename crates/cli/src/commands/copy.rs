//! copy command - Move files into or out of the federation
//!
//! Each source is transferred in turn to the destination. Downloads try the
//! configured methods in order; a federation destination is a writeback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use sc_core::{
    Config, ConfigManager, CredentialResolver, JobAd, Locator, Orchestrator, TokenProvider,
    TransferMethod, TransferOutcome, TransferRequest,
};
use sc_http::{HttpNamespaceMatcher, HttpUploader, TelemetryReporter};
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Copy files to or from the federation
#[derive(Args, Debug, Default)]
pub struct CopyArgs {
    /// One or more sources followed by the destination
    #[arg(value_name = "PATH", num_args = 2.., required_unless_present = "completions")]
    pub paths: Vec<String>,

    /// Copy directories recursively (HTTP only)
    #[arg(short, long)]
    pub recursive: bool,

    /// Comma separated transfer methods, tried in order
    #[arg(long, value_delimiter = ',')]
    pub methods: Option<Vec<String>>,

    /// Token file to use instead of searching the usual locations
    #[arg(short = 't', long)]
    pub token: Option<PathBuf>,

    /// Cache to use instead of those advertised for the namespace
    #[arg(short = 'c', long = "cache", value_delimiter = ',')]
    pub caches: Vec<String>,

    /// URL of the namespace map
    #[arg(long)]
    pub namespaces_url: Option<String>,

    /// Do not send transfer records to the collector
    #[arg(long)]
    pub no_telemetry: bool,
}

#[derive(Debug, Serialize)]
struct TransferResult {
    source: String,
    destination: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    writeback: bool,
    size_bytes: u64,
    size_human: String,
    elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TransferResult {
    fn new(request: &TransferRequest, outcome: &TransferOutcome) -> Self {
        Self {
            source: request.source.clone(),
            destination: request.destination.clone(),
            status: if outcome.is_success() { "success" } else { "failed" },
            method: outcome.method.map(|m| m.to_string()),
            writeback: outcome.writeback,
            size_bytes: outcome.bytes,
            size_human: humansize::format_size(outcome.bytes, humansize::BINARY),
            elapsed_secs: outcome.elapsed.as_secs_f64(),
            error: outcome.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordedErrorEntry {
    elapsed_secs: f64,
    message: String,
}

#[derive(Debug, Serialize)]
struct CopyReport {
    transfers: Vec<TransferResult>,
    errors: Vec<RecordedErrorEntry>,
}

/// Execute the copy command
pub async fn execute(args: CopyArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let (destination, sources) = match split_paths(&args.paths) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    if let Err(e) = check_destination(sources, destination) {
        formatter.error(&e);
        return ExitCode::UsageError;
    }

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::UsageError;
        }
    };

    let orchestrator = match build_orchestrator(&config) {
        Ok(o) => o,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::GeneralError;
        }
    };

    for method in &config.methods {
        if method.parse::<TransferMethod>().is_err() {
            formatter.warning(&format!("Ignoring unknown transfer method '{method}'"));
        }
    }

    let mut exit_code = ExitCode::Success;
    let mut results = Vec::with_capacity(sources.len());

    for source in sources {
        let request = TransferRequest::new(
            source.as_str(),
            destination,
            config.methods.clone(),
            args.recursive,
        );

        let spinner = formatter.show_progress().then(|| spinner(source));
        let outcome = orchestrator.execute(&request).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match &outcome.error {
            None => {
                if !formatter.is_json() {
                    formatter.success(&describe_success(&formatter, &request, &outcome));
                }
            }
            Some(e) => {
                if !formatter.is_json() {
                    formatter.error(&format!("{source}: {e}"));
                }
                if exit_code == ExitCode::Success {
                    exit_code = ExitCode::from_error(e);
                }
            }
        }

        results.push(TransferResult::new(&request, &outcome));
    }

    let recorded = orchestrator.errors().errors();
    if formatter.is_json() {
        formatter.json(&CopyReport {
            transfers: results,
            errors: recorded
                .iter()
                .map(|e| RecordedErrorEntry {
                    elapsed_secs: e.elapsed.as_secs_f64(),
                    message: e.message.clone(),
                })
                .collect(),
        });
    } else if exit_code != ExitCode::Success && !recorded.is_empty() {
        eprintln!("{}", formatter.error_table(&recorded));
    }

    exit_code
}

/// Split positional arguments into the destination and the sources
fn split_paths(paths: &[String]) -> Result<(&str, &[String]), String> {
    match paths.split_last() {
        Some((destination, sources)) if !sources.is_empty() => Ok((destination.as_str(), sources)),
        _ => Err("At least one source and a destination are required".to_string()),
    }
}

/// Several sources can only land in a directory
fn check_destination(sources: &[String], destination: &str) -> Result<(), String> {
    if sources.len() < 2 {
        return Ok(());
    }
    let Ok(locator) = Locator::parse(destination) else {
        // Left for the transfer to report
        return Ok(());
    };
    if locator.transport().is_federation() || locator.local_path().is_dir() {
        Ok(())
    } else {
        Err(format!(
            "Destination '{destination}' must be an existing directory when copying multiple sources"
        ))
    }
}

fn load_config(args: &CopyArgs) -> anyhow::Result<Config> {
    let manager = ConfigManager::new()?;
    let mut config = manager
        .load()
        .with_context(|| format!("Failed to load {}", manager.path().display()))?;
    apply_overrides(&mut config, args);
    Ok(config)
}

/// Command line flags take precedence over the config file
fn apply_overrides(config: &mut Config, args: &CopyArgs) {
    if let Some(methods) = &args.methods {
        config.methods = methods.iter().map(|m| m.trim().to_string()).collect();
    }
    if let Some(token) = &args.token {
        config.token = Some(token.clone());
    }
    if !args.caches.is_empty() {
        config.caches = args.caches.clone();
    }
    if let Some(url) = &args.namespaces_url {
        config.namespaces_url = url.clone();
        config.namespaces_file = None;
    }
    if args.no_telemetry {
        config.telemetry.enabled = false;
    }
}

fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let client = sc_http::build_client().context("Failed to create HTTP client")?;
    let tokens: Arc<dyn TokenProvider> =
        Arc::new(CredentialResolver::from_process(config.token.clone()));

    let namespaces = Arc::new(HttpNamespaceMatcher::new(client.clone(), config));
    let methods = sc_http::method_table(config, tokens.clone());
    let uploader = Arc::new(HttpUploader::new());
    let telemetry = Arc::new(TelemetryReporter::new(client, config.telemetry.clone()));

    tracing::debug!(methods = ?methods, "Registered transfer methods");

    Ok(
        Orchestrator::new(namespaces, tokens, methods, uploader, telemetry)
            .with_site(sc_core::telemetry::site_name())
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_job_ad(JobAd::discover()),
    )
}

fn spinner(source: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} {elapsed:.dim}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Transferring {source}"));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn describe_success(formatter: &Formatter, request: &TransferRequest, outcome: &TransferOutcome) -> String {
    let size = formatter.style_size(&humansize::format_size(outcome.bytes, humansize::BINARY));
    let how = match (outcome.writeback, outcome.method) {
        (true, _) => "upload".to_string(),
        (false, Some(method)) => method.to_string(),
        (false, None) => "unknown".to_string(),
    };
    format!(
        "{} -> {} ({size} via {} in {})",
        formatter.style_path(&request.source),
        formatter.style_path(&display_destination(&request.destination)),
        formatter.style_method(&how),
        formatter.style_time(&format!("{:.2}s", outcome.elapsed.as_secs_f64())),
    )
}

fn display_destination(destination: &str) -> String {
    match Locator::parse(destination) {
        Ok(locator) if !locator.transport().is_federation() => {
            locator.local_path().display().to_string()
        }
        _ => destination.to_string(),
    }
}
