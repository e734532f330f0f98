use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use conductor_audit::{AuditSink, HttpAuditSink, NoopAuditSink};
use conductor_client::HttpCapabilityClient;
use conductor_config::Intent;
use conductor_engine::{EngineConfig, EngineError, ExecutionEngine, IntentRunner};
use conductor_registry::CapabilityRegistry;
use conductor_validator::{IntentValidator, RegistryValidator};

const AUDIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Conductor - run intents against a registry of HTTP capabilities
#[derive(Parser)]
#[command(name = "conductor")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.conductor)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Capability registry file (default: <data-dir>/registry.json)
  #[arg(long, global = true)]
  registry: Option<PathBuf>,

  /// Endpoint receiving audit events; discarded when unset
  #[arg(long, global = true)]
  audit_url: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute an intent and print the response
  Run {
    /// Path to the intent file (JSON)
    intent_file: PathBuf,
  },

  /// Check an intent against the registry without executing it
  Validate {
    /// Path to the intent file (JSON)
    intent_file: PathBuf,
  },

  /// Execute newline-delimited intents from stdin, one response per line
  Batch,

  /// Inspect the capability registry
  Capabilities {
    #[command(subcommand)]
    command: CapabilityCommand,
  },
}

#[derive(Subcommand)]
enum CapabilityCommand {
  /// List capabilities and their actions
  List,

  /// Show one capability
  Describe { capability: String },

  /// Probe health endpoints
  Health {
    /// Only this capability
    capability: Option<String>,
  },
}

/// Where the registry and audit settings come from.
struct Settings {
  registry_path: PathBuf,
  audit_url: Option<String>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory, pass --data-dir")?
      .join(".conductor"),
  };
  let settings = Settings {
    registry_path: cli
      .registry
      .unwrap_or_else(|| data_dir.join("registry.json")),
    audit_url: cli.audit_url,
  };

  let Some(command) = cli.command else {
    println!("conductor - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Run { intent_file } => run_intent(&settings, &intent_file).await,
      Commands::Validate { intent_file } => validate_intent(&settings, &intent_file).await,
      Commands::Batch => run_batch(&settings).await,
      Commands::Capabilities { command } => capabilities(&settings, command).await,
    }
  })
}

async fn load_registry(settings: &Settings) -> Result<Arc<CapabilityRegistry>> {
  let registry = CapabilityRegistry::load(&settings.registry_path)
    .await
    .with_context(|| {
      format!(
        "failed to load capability registry: {}",
        settings.registry_path.display()
      )
    })?;
  Ok(Arc::new(registry))
}

async fn read_intent(intent_file: &Path) -> Result<Intent> {
  let content = tokio::fs::read_to_string(intent_file)
    .await
    .with_context(|| format!("failed to read intent file: {}", intent_file.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse intent file: {}", intent_file.display()))
}

/// The configured audit sink, plus the HTTP sink when there is one so it
/// can be flushed before exit.
fn audit_sink(settings: &Settings) -> (Box<dyn AuditSink>, Option<HttpAuditSink>) {
  match &settings.audit_url {
    Some(url) => {
      let sink = HttpAuditSink::new(url.clone());
      (Box::new(sink.clone()), Some(sink))
    }
    None => (Box::new(NoopAuditSink), None),
  }
}

type CliEngine = ExecutionEngine<HttpCapabilityClient, Box<dyn AuditSink>>;

async fn build_engine(settings: &Settings) -> Result<(CliEngine, Option<HttpAuditSink>)> {
  let registry = load_registry(settings).await?;
  let (audit, http_audit) = audit_sink(settings);

  let engine = ExecutionEngine::with_audit(
    Arc::new(RegistryValidator::new(registry)),
    Arc::new(HttpCapabilityClient::new()),
    EngineConfig::default(),
    audit,
  );
  Ok((engine, http_audit))
}

/// Cancel on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, cancelling");
      trigger.cancel();
    }
  });
  cancel
}

async fn run_intent(settings: &Settings, intent_file: &Path) -> Result<()> {
  let intent = read_intent(intent_file).await?;
  let (engine, http_audit) = build_engine(settings).await?;

  let response = engine
    .execute(&intent, cancel_on_interrupt())
    .await
    .context("intent rejected")?;

  if let Some(sink) = http_audit {
    sink.flush(AUDIT_FLUSH_TIMEOUT).await;
  }

  println!("{}", serde_json::to_string_pretty(&response)?);

  if !response.is_completed() {
    bail!("intent {} failed", response.intent_id);
  }
  Ok(())
}

async fn validate_intent(settings: &Settings, intent_file: &Path) -> Result<()> {
  let intent = read_intent(intent_file).await?;
  let validator = RegistryValidator::new(load_registry(settings).await?);

  let issues = validator.validate_all(&intent);
  if issues.is_empty() {
    let plan = validator.validate(&intent).context("intent rejected")?;
    println!(
      "{}",
      serde_json::json!({
        "valid": true,
        "intent_id": plan.intent_id,
        "step_count": plan.step_count(),
      })
    );
    return Ok(());
  }

  let errors: Vec<serde_json::Value> = issues
    .iter()
    .map(|issue| {
      serde_json::json!({
        "step_id": issue.step_id(),
        "message": issue.to_string(),
      })
    })
    .collect();
  println!(
    "{}",
    serde_json::to_string_pretty(&serde_json::json!({"valid": false, "errors": errors}))?
  );
  bail!("intent has {} validation issue(s)", issues.len());
}

async fn run_batch(settings: &Settings) -> Result<()> {
  let (engine, http_audit) = build_engine(settings).await?;

  let runner = IntentRunner::new(Arc::new(engine));
  let submitter = runner.submitter();
  let cancel = cancel_on_interrupt();
  let runner_handle = tokio::spawn(runner.start(cancel.clone()));

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut line_number = 0usize;
  let mut failures = 0usize;

  while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
    line_number += 1;
    if line.trim().is_empty() {
      continue;
    }

    let intent: Intent = match serde_json::from_str(&line) {
      Ok(intent) => intent,
      Err(e) => {
        failures += 1;
        warn!(line = line_number, error = %e, "skipping unparseable intent");
        println!("{}", serde_json::json!({"line": line_number, "error": e.to_string()}));
        continue;
      }
    };

    match submitter.submit(intent).await {
      Ok(response) => {
        if !response.is_completed() {
          failures += 1;
        }
        println!("{}", serde_json::to_string(&response)?);
      }
      Err(EngineError::Validation(e)) => {
        failures += 1;
        println!(
          "{}",
          serde_json::json!({"line": line_number, "step_id": e.step_id(), "error": e.to_string()})
        );
      }
      Err(e) => {
        warn!(error = %e, "runner stopped, remaining input ignored");
        failures += 1;
        break;
      }
    }
  }

  drop(submitter);
  runner_handle.await.context("intent runner panicked")?;

  if let Some(sink) = http_audit {
    sink.flush(AUDIT_FLUSH_TIMEOUT).await;
  }

  info!(intents = line_number, failures, "batch finished");
  if failures > 0 {
    bail!("{} intent(s) did not complete", failures);
  }
  Ok(())
}

async fn capabilities(settings: &Settings, command: CapabilityCommand) -> Result<()> {
  let registry = load_registry(settings).await?;

  match command {
    CapabilityCommand::List => {
      let listing: Vec<serde_json::Value> = registry
        .list()
        .map(|capability| {
          serde_json::json!({
            "name": capability.name,
            "base_url": capability.base_url,
            "actions": capability.actions.keys().collect::<Vec<_>>(),
          })
        })
        .collect();
      println!("{}", serde_json::to_string_pretty(&listing)?);
    }
    CapabilityCommand::Describe { capability } => {
      let entry = registry
        .describe(&capability)
        .with_context(|| format!("capability '{}' not found", capability))?;
      println!("{}", serde_json::to_string_pretty(entry)?);
    }
    CapabilityCommand::Health { capability } => {
      let targets: Vec<_> = match &capability {
        Some(name) => vec![
          registry
            .describe(name)
            .with_context(|| format!("capability '{}' not found", name))?,
        ],
        None => registry.list().collect(),
      };

      let client = HttpCapabilityClient::new();
      let statuses =
        futures::future::join_all(targets.iter().map(|c| client.health(c, HEALTH_TIMEOUT))).await;

      println!("{}", serde_json::to_string_pretty(&statuses)?);
      let unhealthy = statuses.iter().filter(|s| !s.healthy).count();
      if unhealthy > 0 {
        bail!("{} capability(ies) unhealthy", unhealthy);
      }
    }
  }

  Ok(())
}
