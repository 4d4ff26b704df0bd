//! AIOps agent: console operator REPL plus the autonomous remediation loop.
//!
//! Runs against the in-memory sandbox cloud. Logs go to stderr as JSON so
//! the conversation on stdout stays readable.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use aiops_agent::config::AgentConfig;
use aiops_agent::dispatcher::ActionDispatcher;
use aiops_agent::http::{AppState, build_router};
use aiops_agent::inference::{LlmEngine, RuleBasedEngine, TieredEngine};
use aiops_agent::model::build_model;
use aiops_agent::monitor::{MonitorController, RemediationLoop};
use aiops_agent::ops::ChatOps;
use aiops_agent::registry::ActionRegistry;
use aiops_agent::safety::{ChannelConfirmation, ConfirmationRequest, is_affirmative};
use aiops_cloud::MockCloud;
use aiops_guidelines::GuidelineStore;
use aiops_notify::SlackNotifier;

const CONFIRM_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "aiops-agent starting");

    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());
    let config = AgentConfig::from_file(&config_path)?;
    tracing::info!(region = %config.region, backend = ?config.model.backend, "config loaded");

    // ── Collaborators ───────────────────────────────────────────
    let registry = Arc::new(ActionRegistry::with_defaults());
    tracing::info!(action_count = registry.len(), "action registry initialized");

    let dispatcher = Arc::new(ActionDispatcher::new(
        Arc::new(MockCloud::with_sample_data(config.region.clone())),
        registry.clone(),
        config.cloud_timeout(),
    ));

    let guidelines = match GuidelineStore::load(&config.guidelines_path).await {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(path = %config.guidelines_path, error = %e, "guideline corpus unavailable, continuing without guidance");
            GuidelineStore::empty()
        }
    };
    tracing::info!(rules = guidelines.len(), "guideline corpus loaded");

    let notifier = Arc::new(SlackNotifier::new(config.notify.resolved_webhook())?);
    let model = build_model(&config.model, &config.region).await?;

    // ── Operator path + remediation loop ────────────────────────
    let engine = TieredEngine::new(
        Box::new(RuleBasedEngine::new()),
        Box::new(LlmEngine::new(model.clone(), registry)),
    );
    let ops = Arc::new(ChatOps::new(Box::new(engine), dispatcher.clone()));
    let remediation = Arc::new(RemediationLoop::new(
        dispatcher.clone(),
        Arc::new(guidelines),
        model,
        notifier,
        config.monitor.clone(),
    ));
    let monitor = Arc::new(MonitorController::new(remediation));

    // ── Optional HTTP surface ───────────────────────────────────
    if config.http.enabled {
        let addr = format!("{}:{}", config.http.host, config.http.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let app = build_router(AppState {
            ops: ops.clone(),
            monitor: monitor.clone(),
        });
        tracing::info!(%addr, "http surface listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "http server exited");
            }
        });
    }

    tracing::info!("aiops-agent ready");

    tokio::select! {
        result = repl(&config, ops, dispatcher, monitor.clone()) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    monitor.stop().await;
    tracing::info!("aiops-agent stopped");
    Ok(())
}

async fn say(text: &str) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

/// Read operator lines until `exit` or end of input.
async fn repl(
    config: &AgentConfig,
    ops: Arc<ChatOps>,
    dispatcher: Arc<ActionDispatcher>,
    monitor: Arc<MonitorController>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (confirmation, mut requests) = ChannelConfirmation::new(CONFIRM_TIMEOUT);

    say(&format!(
        "AIOps agent ({}). Commands: region <name>, auto on, auto off, reset, exit.",
        dispatcher.region()
    ))
    .await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lowered = line.to_lowercase();
        match lowered.as_str() {
            "exit" | "quit" => break,
            "auto on" => {
                let reply = if monitor.start().await {
                    "Autonomous monitoring started."
                } else {
                    "Autonomous monitoring is already running."
                };
                say(reply).await?;
            }
            "auto off" => {
                let reply = if monitor.stop().await {
                    "Autonomous monitoring stopped."
                } else {
                    "Autonomous monitoring is not running."
                };
                say(reply).await?;
            }
            "reset" => {
                ops.reset_context();
                say("Session context cleared.").await?;
            }
            _ if lowered.starts_with("region ") => {
                let region = line.split_once(' ').map_or("", |(_, r)| r.trim());
                if config.is_known_region(region) {
                    dispatcher.reconfigure(Arc::new(MockCloud::with_sample_data(region)));
                    say(&format!("Region switched to {region}.")).await?;
                } else {
                    say(&format!(
                        "Unknown region '{region}'. Known: {}",
                        config.regions.join(", ")
                    ))
                    .await?;
                }
            }
            _ => {
                let reply =
                    converse(line, &ops, &confirmation, &mut requests, &mut lines).await?;
                say(&reply).await?;
            }
        }
    }

    monitor.stop().await;
    Ok(())
}

/// Run one request, answering any confirmation prompt from the next line
/// of input.
async fn converse(
    text: &str,
    ops: &Arc<ChatOps>,
    confirmation: &ChannelConfirmation,
    requests: &mut mpsc::Receiver<ConfirmationRequest>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<String> {
    let ops = ops.clone();
    let provider = confirmation.clone();
    let text = text.to_string();
    let mut task = tokio::spawn(async move { ops.respond(&text, &provider).await });

    loop {
        tokio::select! {
            reply = &mut task => return Ok(reply?),
            Some(request) = requests.recv() => {
                say(&format!(
                    "⚠️  {} on {}. Type 'yes' to proceed:",
                    request.action, request.target
                ))
                .await?;
                let answer = lines.next_line().await?.is_some_and(|l| is_affirmative(&l));
                let _ = request.respond.send(answer);
            }
        }
    }
}
