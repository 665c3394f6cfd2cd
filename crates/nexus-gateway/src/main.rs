//! Composition root: wires config, durable state, the agent stack, the
//! scheduler, and both channel adapters into a running [`Orchestrator`].
//! Follows a load-config/build-state/serve shape, generalized from a
//! single HTTP server into several cooperating background tasks
//! coordinated by a `tokio::sync::watch` shutdown signal.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use nexus_agent::tools::echo::EchoTool;
use nexus_agent::tools::filesystem::FilesystemTool;
use nexus_agent::tools::scheduler_tool::SchedulerTool;
use nexus_agent::{AnthropicProvider, ContextBuilder, LlmProvider, ProviderRouter, ToolRegistry};
use nexus_channels::{BridgeClient, BridgeEventOut, ConsoleChannel};
use nexus_core::{NexusConfig, Redactor};
use nexus_memory::{JournalStore, MemoryStore};
use nexus_orchestrator::Orchestrator;
use nexus_protocol::OutboundMessage;
use nexus_scheduler::SchedulerEngine;
use nexus_store::{LedgerDirection, Store};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "nexus-gateway", about = "Runs the Nexus conversation orchestrator")]
struct Args {
    /// Path to nexus.toml. Defaults to NEXUS_CONFIG env var, then ~/.nexus/nexus.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nexus_gateway=info,nexus_orchestrator=info".into()),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("NEXUS_CONFIG").ok());
    let config = NexusConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        NexusConfig::default()
    });

    let data_dir = PathBuf::from(&config.paths.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let prompts_dir = data_dir.join("prompts");
    let skills_dir = data_dir.join("skills");
    let memories_dir = data_dir.join("memories");
    let workspace_dir = data_dir.join("workspace");
    std::fs::create_dir_all(&workspace_dir)?;
    nexus_agent::context::ensure_prompt_scaffold(&prompts_dir)?;

    let store = Store::open_path(&data_dir.join("nexus.db").display().to_string())?;
    let memory = Arc::new(MemoryStore::new(&memories_dir, config.agent.session_window_turns).await?);
    let journal = Arc::new(JournalStore::new(&memories_dir).await?);

    let tz = chrono_tz::Tz::from_str(&config.paths.timezone).unwrap_or_else(|e| {
        warn!("unrecognized timezone '{}' ({e}), defaulting to UTC", config.paths.timezone);
        chrono_tz::UTC
    });
    let (fired_tx, mut fired_rx) = mpsc::channel(128);
    let scheduler = Arc::new(SchedulerEngine::new(store.clone(), tz, fired_tx));
    let (loaded, failed) = scheduler.restore_jobs();
    info!(loaded, failed, "restored scheduled jobs on boot");

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    registry.register(Box::new(FilesystemTool::new(&workspace_dir)));
    registry.register(Box::new(SchedulerTool::new(scheduler.clone())));
    let registry = Arc::new(registry);

    let provider: Box<dyn LlmProvider> =
        Box::new(AnthropicProvider::new(config.llm.base_url.clone(), config.llm.api_key.clone().unwrap_or_default()));
    let router = Arc::new(ProviderRouter::new(
        provider,
        config.llm.primary_model.clone(),
        config.llm.complex_model.clone(),
        config.llm.fallback_model.clone(),
        config.llm.max_tokens,
        config.llm.timeout_seconds,
    ));

    let context = ContextBuilder::new(
        &prompts_dir,
        config.agent.max_memory_sections,
        config.agent.memory_recent_days,
        config.agent.observation_max_chars,
    )
    .with_skills_dir(&skills_dir);
    let redactor = Arc::new(Redactor::new());
    let redacted_log_path = data_dir.join("redacted.log");

    let (bridge_outbound_tx, bridge_outbound_rx) = mpsc::channel::<OutboundMessage>(128);
    let console = Arc::new(ConsoleChannel::new());

    let orchestrator = Arc::new(
        Orchestrator::new(
            store.clone(),
            memory,
            journal,
            registry,
            router,
            context,
            redactor,
            config.agent.max_steps,
            config.agent.observation_max_chars,
            redacted_log_path,
        )
        .with_bridge(bridge_outbound_tx)
        .with_console(console.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    let fired_task = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            while let Some(fired) = fired_rx.recv().await {
                orchestrator.emit_scheduled(&fired.chat_id, &fired.text).await;
            }
        })
    };

    let (bridge_inbound_tx, mut bridge_inbound_rx) = mpsc::channel::<BridgeEventOut>(128);
    let bridge_client = BridgeClient::new(config.bridge.ws_url.clone(), non_empty(&config.bridge.shared_secret));
    let bridge_task = {
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            bridge_client.run(bridge_inbound_tx, bridge_outbound_rx, shutdown_rx).await;
        })
    };

    let bridge_dispatch_task = {
        let orchestrator = orchestrator.clone();
        let store = store.clone();
        tokio::spawn(async move {
            while let Some(event) = bridge_inbound_rx.recv().await {
                match event {
                    BridgeEventOut::Inbound { message, trace_id } => {
                        orchestrator.handle_inbound(message, trace_id).await;
                    }
                    BridgeEventOut::Delivery(receipt) => {
                        for id in receipt.all_ids() {
                            if let Err(e) = store.claim_ledger(&id, LedgerDirection::Outbound, &receipt.chat_id) {
                                warn!(error = %e, "failed to claim delivery receipt in ledger");
                            }
                        }
                    }
                }
            }
        })
    };

    let (console_inbound_tx, mut console_inbound_rx) =
        mpsc::channel::<(nexus_protocol::InboundMessage, String)>(32);
    let console_task = {
        let console = console.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { console.run(console_inbound_tx, shutdown_rx).await })
    };

    let console_dispatch_task = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            while let Some((message, trace_id)) = console_inbound_rx.recv().await {
                orchestrator.handle_inbound(message, trace_id).await;
            }
        })
    };

    info!("nexus-gateway running; console and bridge channels active");
    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping background tasks");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(scheduler_task, bridge_task, console_task);
    fired_task.abort();
    bridge_dispatch_task.abort();
    console_dispatch_task.abort();

    Ok(())
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
