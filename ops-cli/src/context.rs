use anyhow::{Context, Result};
use auth_rebac::{
    AuthorizationEngine, EngineConfig, InMemoryTupleRepository, PostgresTupleRepository, Schema,
    TupleRepository,
};
use blog_policy::ContentPolicy;
use config_engine::{AuthzSettings, StoreBackend};
use std::sync::Arc;
use tracing::{info, warn};

/// Engine, policy and settings for one CLI invocation
pub struct AppContext {
    pub settings: AuthzSettings,
    pub engine: Arc<AuthorizationEngine>,
    pub policy: ContentPolicy,
}

impl AppContext {
    pub async fn build(settings: AuthzSettings) -> Result<Self> {
        let repository = connect_store(&settings).await?;
        let schema = load_schema(&settings)?;

        let config = EngineConfig {
            store_timeout: settings.store.timeout(),
            check_timeout: settings.evaluator.check_timeout(),
            max_depth: settings.evaluator.max_depth,
            debug_mode: settings.evaluator.debug_trace,
        };
        let engine = Arc::new(AuthorizationEngine::new(repository, config).with_schema(schema)?);
        let policy = ContentPolicy::new(engine.clone(), &settings.org.id)?;

        Ok(Self {
            settings,
            engine,
            policy,
        })
    }
}

/// Relation schema from the configured document, or the built-in blog schema
pub fn load_schema(settings: &AuthzSettings) -> Result<Schema> {
    match &settings.schema.path {
        Some(path) => Schema::load(path)
            .with_context(|| format!("loading schema from {}", path.display())),
        None => Ok(Schema::blog_schema()),
    }
}

pub async fn connect_store(settings: &AuthzSettings) -> Result<Arc<dyn TupleRepository>> {
    match settings.store.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory tuple store; nothing outlives this command");
            Ok(Arc::new(InMemoryTupleRepository::new()))
        }
        StoreBackend::Postgres => Ok(Arc::new(connect_postgres(settings).await?)),
    }
}

pub async fn connect_postgres(settings: &AuthzSettings) -> Result<PostgresTupleRepository> {
    let url = settings
        .store
        .database_url
        .as_deref()
        .context("store.database_url is not set")?;

    let repository = PostgresTupleRepository::connect(
        url,
        settings.store.max_connections,
        settings.store.timeout(),
    )
    .await?;
    info!("Connected to tuple store");
    Ok(repository)
}
