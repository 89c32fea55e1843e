use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use artisan_core::{Clock, MemberColumns, RolePolicy, ZonedClock};
use artisan_engine::{Fanout, MemberService, SvgRenderer, TracingSink};
use artisan_storage::{
    MemoryStore, RowStore, ServiceAccount, SheetsStore, SqliteStore, StaticToken, TableStore, TokenSource,
};

use crate::commands::Dispatcher;
use crate::config::{BotConfig, StoreConfig};
use crate::logs::{FileSink, LogCommand};

pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn TableStore>> {
    let store: Arc<dyn TableStore> = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
        StoreConfig::Sqlite { path } => Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("Failed to open sqlite store: {}", path.display()))?,
        ),
        StoreConfig::Sheets {
            spreadsheet_id,
            credentials_path,
            access_token,
            base_url,
            ..
        } => Arc::new(SheetsStore::new(
            spreadsheet_id.clone(),
            token_source(credentials_path.as_deref(), access_token.as_deref())?,
            base_url.clone(),
        )?),
    };
    Ok(store)
}

/// A configured `access_token` wins; otherwise tokens come from the key file.
fn token_source(credentials_path: Option<&Path>, access_token: Option<&str>) -> Result<Arc<dyn TokenSource>> {
    if let Some(token) = access_token.filter(|t| !t.trim().is_empty()) {
        tracing::warn!("using a fixed sheets access token; it will not be refreshed");
        return Ok(Arc::new(StaticToken::new(token)));
    }
    let path = credentials_path.context("sheets store needs credentials_path or access_token")?;
    let account = ServiceAccount::from_file(path)
        .with_context(|| format!("Failed to load service account key: {}", path.display()))?;
    Ok(Arc::new(account))
}

/// Writes the member header into a sheet that has no rows at all.
pub async fn ensure_header(store: &dyn TableStore, store_id: &str) -> Result<()> {
    let values = store
        .load_table(store_id)
        .await
        .with_context(|| format!("Failed to load table {store_id}"))?;
    if values.is_empty() {
        store
            .store_table(store_id, &[MemberColumns::default_header()])
            .await
            .with_context(|| format!("Failed to initialize table {store_id}"))?;
        tracing::info!(store_id, "wrote member header to empty table");
    }
    Ok(())
}

/// Wires a dispatcher from configuration.
pub async fn build_dispatcher(config: &BotConfig) -> Result<Dispatcher> {
    let clock: Arc<dyn Clock> = Arc::new(ZonedClock::parse(&config.timezone)?);
    let roles = RolePolicy::new(config.allowed_roles.clone());
    let store_id = config.store.store_id().to_string();

    let backend = open_store(&config.store)?;
    ensure_header(backend.as_ref(), &store_id).await?;
    let rows = Arc::new(RowStore::new(backend, config.write.into()));

    let audit = Arc::new(
        Fanout::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(FileSink::new(&config.logs_dir, clock.clone()))),
    );

    let members = MemberService::new(
        rows,
        store_id.clone(),
        clock.clone(),
        roles.clone(),
        Arc::new(SvgRenderer::default()),
        audit.clone(),
    );
    let logs = LogCommand::new(&config.logs_dir, clock, roles, audit);
    tracing::info!(store_id = %store_id, logs_dir = %config.logs_dir.display(), timezone = %config.timezone, "dispatcher ready");
    Ok(Dispatcher::new(members, logs))
}
