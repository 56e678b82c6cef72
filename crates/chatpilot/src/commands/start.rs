//! Start command - launches the ChatPilot server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chatpilot_agent::prompt::DEFAULT_SYSTEM_PROMPT;
use chatpilot_agent::tools::{
    DisabledWebSearch, GoogleWebSearch, HttpWebFetcher, TabularFileAnalyzer, WebFetchConfig,
    WebSearchConfig,
};
use chatpilot_agent::{ChatConfig, ChatOrchestrator, EmptyCorpus, WebSearch};
use chatpilot_config::{ChatPilotConfig, ConfigError, provider_env_var, resolve_api_key};
use chatpilot_llm::{BackendSettings, SharedBackend, build_backend};
use chatpilot_sandbox::{SandboxConfig, SandboxExecutor};
use chatpilot_server::{AppState, Server, ServerConfig};
use chatpilot_session::{InMemoryHistoryStore, StoreConfig};
use clap::Args;

use super::Context;

/// Arguments for the start command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Address to bind, overriding `[server] bind_address`
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    for path in loaded.loaded_from() {
        tracing::info!(path = %path.display(), "Loaded config");
    }
    let config = loaded.config;

    let backend = create_backend(&config)?;
    let executor = Arc::new(create_sandbox(&config).await?);

    let section = config.server();
    let store = Arc::new(InMemoryHistoryStore::new(
        match section.session_ttl() {
            Some(ttl) => StoreConfig::new().with_ttl(ttl),
            None => StoreConfig::new(),
        }
        .with_max_sessions(section.session_max),
    ));
    let _cleanup = store.spawn_cleanup_task();

    let web = config.web();
    let web_search: Arc<dyn WebSearch> = match (web.search_enabled, web.search_credentials()) {
        (true, Some((key, cse_id))) => Arc::new(GoogleWebSearch::new(
            WebSearchConfig::new(key, cse_id).with_num_results(web.num_results),
        )?),
        (true, None) => {
            tracing::warn!("Web search enabled without an API key and CSE id; disabling it");
            Arc::new(DisabledWebSearch)
        }
        (false, _) => Arc::new(DisabledWebSearch),
    };
    let web_fetch = HttpWebFetcher::new(WebFetchConfig {
        timeout: web.fetch_timeout(),
        max_text_length: web.max_text_length,
    })?;

    let llm = config.llm();
    let chat_section = config.chat();
    let chat = ChatOrchestrator::builder()
        .with_backend(backend)
        .with_history(store)
        .with_corpus(Arc::new(EmptyCorpus))
        .with_file_analyzer(Arc::new(TabularFileAnalyzer))
        .with_web_search(web_search)
        .with_web_fetch(Arc::new(web_fetch))
        .with_code_executor(executor.clone())
        .with_max_analysis_attempts(config.analysis().max_retries)
        .with_config(ChatConfig {
            model: llm.model.clone(),
            sampling: llm.sampling(),
            max_conversation_turns: chat_section.max_conversation_turns,
            system_prompt: chat_section
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        })
        .build()?;

    let bind_address = match args.bind {
        Some(addr) => addr,
        None => section
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", section.bind_address))?,
    };
    let server_config = ServerConfig::new()
        .with_bind_address(bind_address)
        .with_rate_limiting(section.rate_limiting)
        .with_chat_rpm(section.chat_rpm)
        .with_request_logging(ctx.verbose)
        .with_upload_dir(config.analysis().upload_dir);

    if ctx.verbose {
        println!("ChatPilot listening on http://{bind_address}");
        println!("  Provider: {} ({})", llm.provider, llm.model);
        println!(
            "  Isolation: {}",
            executor
                .isolation_platform()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "off".to_string())
        );
    }

    let server = Server::new(AppState::new(Arc::new(chat), server_config));
    let result = server
        .run_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await;

    executor.shutdown().await;
    result?;
    Ok(())
}

/// Resolve the API key and build the configured provider backend.
fn create_backend(config: &ChatPilotConfig) -> Result<SharedBackend> {
    let llm = config.llm();
    let provider = llm.provider()?;
    let secret = resolve_api_key(provider, llm.api_key.as_deref()).ok_or_else(|| {
        ConfigError::ApiKeyNotFound {
            provider: provider.to_string(),
            env_var: provider_env_var(provider).to_string(),
        }
    })?;
    tracing::debug!(%provider, source = %secret.source, "Resolved API key");

    let settings = BackendSettings {
        base_url: llm.base_url.clone(),
        timeout: llm.timeout(),
        connect_timeout: llm.connect_timeout(),
        max_retries: llm.max_retries,
        ..BackendSettings::new(provider, secret.value)
    };
    Ok(build_backend(&settings)?)
}

/// Build the code executor, falling back to an unisolated one when the
/// isolation backend can't start.
async fn create_sandbox(config: &ChatPilotConfig) -> Result<SandboxExecutor> {
    let section = config.sandbox();
    let suffix = if section.interpreter.contains("python") {
        ".py"
    } else {
        ""
    };
    let sandbox_config = SandboxConfig::new()
        .with_interpreter(&section.interpreter, suffix)
        .with_timeout(section.timeout())
        .with_allowed_domains(section.allowed_domains.clone());

    if !section.isolate {
        return Ok(SandboxExecutor::new(sandbox_config).await?);
    }

    match SandboxExecutor::new(sandbox_config.clone().with_isolation(true)).await {
        Ok(executor) => Ok(executor),
        Err(e) => {
            tracing::warn!(error = %e, "Sandbox isolation unavailable; running unisolated");
            Ok(SandboxExecutor::new(sandbox_config).await?)
        }
    }
}
