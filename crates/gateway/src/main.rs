//! Tamalebot entry point: wire configuration into the runtime and serve the
//! HTTP surface until shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use tamalebot_agent::{
    AgentLoop, ConversationStore, InMemoryConversations, PersistentConversations, TurnSerializer,
};
use tamalebot_config::AgentConfig;
use tamalebot_core::Error;
use tamalebot_gateway::{AppState, router};
use tamalebot_providers::{ProviderSettings, resolve_provider};
use tamalebot_security::{AuditJournal, CredentialVault, PolicyEngine};
use tamalebot_storage::{FsBackend, RemoteBackend, StorageBackend};
use tamalebot_tools::{ToolSet, build_executor};
use tracing::info;

const DEFAULT_MAX_TOKENS: u32 = 4096;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // The process environment is read exactly once, here at the boundary.
    let config = AgentConfig::from_env()?;
    info!(?config, "Starting tamalebot");

    let data_dir = PathBuf::from(&config.data_dir);
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".into());

    let storage: Arc<dyn StorageBackend> = match &config.storage_url {
        Some(url) => Arc::new(RemoteBackend::new(url.clone())),
        None => Arc::new(FsBackend::new(data_dir.join("storage"))?),
    };

    let audit = Arc::new(AuditJournal::new(data_dir.join("audit"), &config.agent_id)?);
    let policy = Arc::new(PolicyEngine::new(config.policy.clone(), home));

    let vault = config.vault_key_source.as_ref().map(|source| {
        Arc::new(CredentialVault::new(
            storage.clone(),
            audit.clone(),
            &config.agent_id,
            source,
        ))
    });

    let executor = Arc::new(build_executor(ToolSet {
        policy,
        audit: audit.clone(),
        agent_id: config.agent_id.clone(),
        agent_name: config.agent_name.clone(),
        workdir: PathBuf::from(&config.workdir),
        vault,
        storage: Some(storage.clone()),
    }));

    let provider = resolve_provider(
        ProviderSettings {
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: config.system_prompt.clone(),
            base_url: None,
        },
        config.provider.as_deref(),
    );

    let agent = Arc::new(
        AgentLoop::new(provider, executor).with_max_iterations(config.max_iterations),
    );

    let conversations: Arc<dyn ConversationStore> = if config.storage_url.is_some() {
        Arc::new(PersistentConversations::new(storage))
    } else {
        Arc::new(InMemoryConversations::new())
    };

    let state = Arc::new(AppState {
        agent_id: config.agent_id.clone(),
        agent_name: config.agent_name.clone(),
        model: config.model.clone(),
        started_at: chrono::Utc::now(),
        agent,
        conversations,
        turns: TurnSerializer::new(),
        audit: audit.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {addr}: {e}")))?;
    info!(addr, agent = %config.agent_name, model = %config.model, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("Server error: {e}")))?;

    // Flush the journal before the process exits.
    audit.close();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
