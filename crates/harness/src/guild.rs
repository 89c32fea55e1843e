use std::path::Path;
use std::sync::Arc;

use artisan_bot::{Dispatcher, FileSink, LogCommand, Request};
use artisan_core::{Account, Clock, ManualClock, MemberColumns, RolePolicy, SheetValues, Table};
use artisan_engine::{Fanout, MemberService, Reply, SvgRenderer, TableRenderer};
use artisan_storage::{MemoryStore, RowStore, StorageError, TableStore, WritePolicy};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tempfile::TempDir;

use crate::sink::RecordingSink;

pub const MEMBERS: &str = "members";

/// 2024-03-09 17:45:00 local time.
pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(17, 45, 0))
        .unwrap_or_default()
}

pub fn member(id: &str, display_name: &str) -> Account {
    Account::new(id, display_name).with_role("Member")
}

pub fn officer(id: &str, display_name: &str) -> Account {
    Account::new(id, display_name).with_role("Member").with_role("Council")
}

fn sheet(header: &[String], rows: &[&[&str]]) -> SheetValues {
    std::iter::once(header.to_vec())
        .chain(rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()))
        .collect()
}

/// A complete command pipeline over an in-memory sheet, a manual clock,
/// a recording audit sink and a temporary log directory.
pub struct TestGuild {
    pub store: Arc<MemoryStore>,
    pub rows: Arc<RowStore>,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<RecordingSink>,
    pub dispatcher: Dispatcher,
    logs_dir: TempDir,
}

impl TestGuild {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_sheet(sheet(&MemberColumns::default_header(), &[])).await
    }

    /// Standard header followed by `rows`.
    pub async fn with_rows(rows: &[&[&str]]) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_sheet(sheet(&MemberColumns::default_header(), rows)).await
    }

    pub async fn with_sheet(values: SheetValues) -> Result<Self, Box<dyn std::error::Error>> {
        Self::build(Arc::new(MemoryStore::new()), values, WritePolicy::default()).await
    }

    pub async fn build(
        store: Arc<MemoryStore>,
        values: SheetValues,
        policy: WritePolicy,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        store.seed(MEMBERS, values).await;
        let backend: Arc<dyn TableStore> = store.clone();
        Self::over(store, backend, policy)
    }

    /// Like [`TestGuild::build`] but commands go through `backend`, which
    /// may wrap `store`.
    pub fn over(
        store: Arc<MemoryStore>,
        backend: Arc<dyn TableStore>,
        policy: WritePolicy,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::assemble(store, backend, policy, Arc::new(SvgRenderer::default()))
    }

    /// Full control over the backend and the search renderer.
    pub fn assemble(
        store: Arc<MemoryStore>,
        backend: Arc<dyn TableStore>,
        policy: WritePolicy,
        renderer: Arc<dyn TableRenderer>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let logs_dir = tempfile::tempdir()?;
        let clock = Arc::new(ManualClock::new(start_time()));
        let audit = Arc::new(RecordingSink::new());
        let rows = Arc::new(RowStore::new(backend, policy));
        let roles = RolePolicy::default();

        let sinks = Arc::new(
            Fanout::new()
                .with(audit.clone())
                .with(Arc::new(FileSink::new(logs_dir.path(), clock.clone() as Arc<dyn Clock>))),
        );
        let members = MemberService::new(
            rows.clone(),
            MEMBERS,
            clock.clone(),
            roles.clone(),
            renderer,
            sinks.clone(),
        );
        let logs = LogCommand::new(logs_dir.path(), clock.clone(), roles, sinks);

        Ok(Self {
            store,
            rows,
            clock,
            audit,
            dispatcher: Dispatcher::new(members, logs),
            logs_dir,
        })
    }

    pub fn logs_dir(&self) -> &Path {
        self.logs_dir.path()
    }

    pub async fn table(&self) -> Result<Table, StorageError> {
        self.rows.load(MEMBERS).await
    }

    /// Raw sheet contents, header first.
    pub async fn values(&self) -> SheetValues {
        self.store.snapshot(MEMBERS).await
    }

    pub async fn run(&self, command: &str, actor: &Account, options: Value) -> Reply {
        self.dispatcher
            .handle(Request {
                command: command.to_string(),
                options,
                account: actor.clone(),
            })
            .await
    }

    pub async fn update(&self, actor: &Account, options: Value) -> Reply {
        self.run("member-update", actor, options).await
    }

    pub async fn search(&self, actor: &Account, options: Value) -> Reply {
        self.run("member-search", actor, options).await
    }

    pub async fn logs(&self, actor: &Account, options: Value) -> Reply {
        self.run("admin-logs", actor, options).await
    }
}
