//! Start command - launches the LiftLog server.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::{info, warn};

use liftlog_config::{ExtractionConfig, LlmConfig, SessionsConfig};
use liftlog_extract::WorkoutExtractor;
use liftlog_llm::{
    InferenceOptions, OllamaBackend, OllamaConfig, OpenAiBackend, OpenAiConfig, RagflowClient,
    RagflowConfig,
};
use liftlog_server::{AppState, PoolConfig, Server, ServerConfig, WorkerPool};
use liftlog_session::{ClientContextStore, ContextStoreConfig};
use liftlog_store::LiftlogStore;

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Address to bind to, `host` or `host:port` (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bearer token required on API routes (or set LIFTLOG_AUTH_TOKEN)
    #[arg(long, env = "LIFTLOG_AUTH_TOKEN")]
    pub token: Option<String>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let server = config.server();
    let llm = config.llm();

    let addr = resolve_bind(&server.address(), &args)?;

    // ── Collaborators ───────────────────────────────────────────────────

    let base_url = llm.require_base_url()?;
    let chat_id = llm.require_chat_id()?;

    let chat = Arc::new(OpenAiBackend::new(chat_config(&llm, base_url, chat_id))?);

    let mut ragflow_config = RagflowConfig::new(base_url, chat_id);
    if let Some(key) = &llm.api_key {
        ragflow_config = ragflow_config.with_api_key(key);
    }
    let ragflow = Arc::new(RagflowClient::new(ragflow_config)?);

    let extractor = build_extractor(&config.extraction(), &llm)?;

    // ── Storage ─────────────────────────────────────────────────────────

    let storage = config.storage();
    let stats_dir = ctx.stats_dir();
    let db_path = ctx.database_path();
    let store = match LiftlogStore::open(&db_path) {
        Ok(store) => {
            info!(path = %db_path.display(), "Database opened");
            Some(Arc::new(store.with_default_user(storage.default_user.clone())))
        }
        Err(e) => {
            warn!(
                path = %db_path.display(),
                error = %e,
                "Database unavailable, workout endpoints will answer 503"
            );
            None
        }
    };

    // ── Server ──────────────────────────────────────────────────────────

    let workers_config = config.workers();
    let server_config = ServerConfig::new(args.token.or(server.auth_token))
        .with_bind_address(addr)
        .with_request_logging(server.request_logging)
        .with_stream_idle_timeout(llm.stream_idle_timeout())
        .with_stats_dir(stats_dir)
        .with_default_user(storage.default_user)
        .with_shutdown_grace(workers_config.shutdown_grace());

    let contexts = ClientContextStore::new(context_store_config(&config.sessions()));
    let cleanup = contexts.spawn_cleanup();
    let workers = Arc::new(WorkerPool::new(PoolConfig::new(
        workers_config.workers,
        workers_config.queue_capacity,
    )));

    let mut state = AppState::new(server_config, chat, ragflow.clone())
        .with_mirror(ragflow)
        .with_extractor(extractor)
        .with_contexts(contexts)
        .with_workers(workers);
    if let Some(store) = store {
        state = state.with_store(store);
    }

    if ctx.verbose {
        eprintln!("Chat service: {}", base_url);
        eprintln!("Extraction service: {}", config.extraction().base_url);
        eprintln!("Database: {}", db_path.display());
    }
    println!("LiftLog listening on http://{}", addr);

    let result = Server::from_state(state).run().await;
    cleanup.abort();
    result?;
    Ok(())
}

/// Combine the configured address with `--bind`/`--port`.
fn resolve_bind(configured: &str, args: &StartArgs) -> Result<SocketAddr> {
    let mut addr: SocketAddr = configured
        .parse()
        .with_context(|| format!("invalid server address {configured:?}"))?;

    if let Some(bind) = &args.bind {
        addr = match bind.parse::<SocketAddr>() {
            Ok(full) => full,
            Err(_) => {
                let ip = bind
                    .parse::<IpAddr>()
                    .with_context(|| format!("invalid --bind address {bind:?}"))?;
                SocketAddr::new(ip, addr.port())
            }
        };
    }
    if let Some(port) = args.port {
        addr.set_port(port);
    }
    Ok(addr)
}

fn chat_config(llm: &LlmConfig, base_url: &str, chat_id: &str) -> OpenAiConfig {
    let mut config = OpenAiConfig::ragflow(base_url, chat_id);
    if let Some(key) = &llm.api_key {
        config = config.with_api_key(key);
    }
    if let Some(model) = &llm.model {
        config = config.with_model(model);
    }
    config
}

fn build_extractor(extraction: &ExtractionConfig, llm: &LlmConfig) -> Result<WorkoutExtractor> {
    let backend = OllamaBackend::new(
        OllamaConfig::new(extraction.resolve_model(llm)).with_base_url(&extraction.base_url),
    )?;
    let options = InferenceOptions::default()
        .with_temperature(extraction.temperature)
        .with_num_predict(extraction.num_predict)
        .with_timeout(extraction.timeout());
    Ok(WorkoutExtractor::new(Arc::new(backend))
        .with_max_history(extraction.max_history)
        .with_options(options))
}

fn context_store_config(sessions: &SessionsConfig) -> ContextStoreConfig {
    let config = ContextStoreConfig::new()
        .with_max_clients(sessions.max_clients)
        .with_cleanup_interval(sessions.cleanup_interval());
    match sessions.ttl() {
        Some(ttl) => config.with_ttl(ttl),
        None => config.without_ttl(),
    }
}
