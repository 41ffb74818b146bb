//! rhoas-apply - applies declared managed Kafka resources.
//!
//! Reads a manifest of Kafka instances, topics, service accounts and ACLs,
//! reconciles them against the management APIs and records what it manages
//! in a local state file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rhoas_reconcile::{
    CallContext, DataRead, DataSource, DataSourceReader, Diagnostic, Diagnostics, IdentityAllocator,
    PassReport, ReconcilePass, Registry, RemoteFacade, Severity, schemas,
};
use serde_json::{Map, Value, json};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod config;
mod manifest;
mod state;

use client::HttpFacade;
use config::ProviderConfig;
use manifest::Manifest;
use state::{DataState, StateFile};

#[derive(Parser)]
#[command(name = "rhoas-apply")]
#[command(about = "Apply declared managed Kafka resources")]
struct Cli {
    /// Maximum concurrent operations within one dependency tier
    #[arg(long, default_value_t = ReconcilePass::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the manifest against the remote objects
    Apply {
        #[command(flatten)]
        provider: ProviderConfig,

        /// Manifest file (YAML or JSON)
        #[arg(short, long, default_value = "rhoas.yaml")]
        manifest: PathBuf,

        /// State file
        #[arg(short, long, default_value = "rhoas.state.json")]
        state: PathBuf,
    },
    /// Delete every object tracked in the state file
    Destroy {
        #[command(flatten)]
        provider: ProviderConfig,

        /// State file
        #[arg(short, long, default_value = "rhoas.state.json")]
        state: PathBuf,
    },
    /// Read a data source and print its attributes
    Read {
        #[command(flatten)]
        provider: ProviderConfig,

        /// Data source type, e.g. rhoas_kafkas
        source: String,

        /// Argument as key=value (repeatable)
        #[arg(short, long = "arg", value_parser = parse_arg)]
        args: Vec<(String, String)>,
    },
    /// Print the schemas of every resource kind and data source
    Schema,
}

fn parse_arg(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.trim().to_string(), value.to_string()))
}

/// Numbers and booleans are passed typed, everything else as a string.
fn arg_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<u64>() {
        return json!(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn format_diagnostic(d: &Diagnostic) -> String {
    let severity = match d.severity {
        Severity::Error => "Error",
        Severity::Warning => "Warning",
    };
    match &d.address {
        Some(address) => format!("{}: {} ({})\n  {}", severity, d.summary, address, d.detail),
        None => format!("{}: {}\n  {}", severity, d.summary, d.detail),
    }
}

fn report(diagnostics: &Diagnostics) -> Result<()> {
    for d in diagnostics {
        eprintln!("{}", format_diagnostic(d));
    }
    let errors = diagnostics.errors().count();
    if errors > 0 {
        bail!("{} error(s) reported", errors);
    }
    Ok(())
}

/// A call context cancelled by Ctrl-C.
fn interruptible(provider: &ProviderConfig) -> CallContext {
    let (ctx, handle) = CallContext::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding calls");
            handle.cancel();
        }
    });
    match provider.call_timeout() {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    }
}

fn facade(provider: &ProviderConfig) -> Result<Arc<dyn RemoteFacade>> {
    let facade = HttpFacade::new(provider).context("Failed to build HTTP client")?;
    Ok(Arc::new(facade))
}

async fn apply(
    provider: ProviderConfig,
    concurrency: usize,
    manifest_path: PathBuf,
    state_path: PathBuf,
) -> Result<()> {
    let manifest = Manifest::load(&manifest_path)?;
    let declared = manifest.declared()?;
    let lookups = manifest.lookups()?;
    let mut state = StateFile::load(&state_path)?;

    let ctx = interruptible(&provider);
    let facade = facade(&provider)?;
    let identities = Arc::new(IdentityAllocator::new());
    let mut diagnostics = Diagnostics::new();

    let reader = DataSourceReader::new(Arc::clone(&facade), Arc::clone(&identities));
    state.data.clear();
    for (name, source, args) in lookups {
        let read = reader.read(&ctx, source, &args).await;
        for d in read.diagnostics {
            diagnostics.push(match d.address {
                Some(_) => d,
                None => d.at(name.clone()),
            });
        }
        if let Some(id) = read.id {
            state.data.insert(
                name,
                DataState {
                    id,
                    attributes: read.attributes,
                },
            );
        }
    }

    let registry = Arc::new(Registry::new(facade, identities));
    let pass = ReconcilePass::new(registry).with_concurrency(concurrency);
    let prior = std::mem::take(&mut state.records);
    let PassReport {
        records,
        diagnostics: pass_diagnostics,
        summary,
    } = pass.apply(&ctx, &declared, prior).await;
    diagnostics.extend(pass_diagnostics);

    state.records = records;
    state.save(&state_path)?;
    info!(state = %state_path.display(), "Apply finished: {}", summary);
    println!("Apply finished: {}.", summary);
    report(&diagnostics)
}

async fn destroy(provider: ProviderConfig, concurrency: usize, state_path: PathBuf) -> Result<()> {
    let mut state = StateFile::load(&state_path)?;
    if state.records.is_empty() {
        println!("Nothing to destroy.");
        return Ok(());
    }

    let ctx = interruptible(&provider);
    let registry = Arc::new(Registry::new(
        facade(&provider)?,
        Arc::new(IdentityAllocator::new()),
    ));
    let pass = ReconcilePass::new(registry).with_concurrency(concurrency);
    let outcome = pass
        .destroy(&ctx, std::mem::take(&mut state.records))
        .await;

    state.records = outcome.records;
    state.data.clear();
    state.save(&state_path)?;
    println!("Destroy finished: {}.", outcome.summary);
    report(&outcome.diagnostics)
}

async fn read(provider: ProviderConfig, source: String, args: Vec<(String, String)>) -> Result<()> {
    let Some(source) = DataSource::from_type_name(&source) else {
        let known: Vec<_> = DataSource::ALL.iter().map(|s| s.type_name()).collect();
        bail!("Unknown data source '{}', expected one of {}", source, known.join(", "));
    };
    let args: Map<String, Value> = args
        .into_iter()
        .map(|(k, v)| {
            let value = arg_value(&v);
            (k, value)
        })
        .collect();

    let ctx = interruptible(&provider);
    let reader = DataSourceReader::new(facade(&provider)?, Arc::new(IdentityAllocator::new()));
    let read = reader.read(&ctx, source, &args).await;
    if let Some(output) = read_output(source, &read) {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    report(&read.diagnostics)
}

/// Printable form of a data source read, with sensitive values masked.
fn read_output(source: DataSource, read: &DataRead) -> Option<Value> {
    let id = read.id.as_ref()?;
    let mut attributes = read.attributes.clone();
    source.schema().redact(&mut attributes);
    Some(json!({"id": id, "attributes": attributes}))
}

fn schema_document() -> Value {
    let data_sources: Vec<_> = DataSource::ALL.iter().map(|s| s.schema()).collect();
    json!({
        "resources": schemas(),
        "data_sources": data_sources,
    })
}

fn schema() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&schema_document())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rhoas_apply=info,rhoas_reconcile=info,reqwest=warn,hyper=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Apply {
            provider,
            manifest,
            state,
        } => apply(provider, cli.concurrency, manifest, state).await,
        Command::Destroy { provider, state } => destroy(provider, cli.concurrency, state).await,
        Command::Read {
            provider,
            source,
            args,
        } => read(provider, source, args).await,
        Command::Schema => schema(),
    }
}
