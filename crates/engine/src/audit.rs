use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use artisan_core::{Account, CommandId};
use serde::Serialize;

use crate::reconcile::FieldDiff;

// ============================================================================
// Event model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditKind {
    UpdateSuccess,
    UpdateDenied,
    NotFound,
    CreateSuccess,
    SearchSuccess,
    SearchEmpty,
    InvalidColumns,
    InternalError,
    LogsDenied,
    LogsView,
    LogsDownload,
    LogsClear,
    LogsMissing,
}

impl AuditKind {
    pub fn level(self) -> AuditLevel {
        match self {
            Self::UpdateDenied
            | Self::NotFound
            | Self::InvalidColumns
            | Self::LogsDenied
            | Self::LogsMissing => AuditLevel::Warn,
            Self::InternalError => AuditLevel::Error,
            _ => AuditLevel::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateSuccess => "update-success",
            Self::UpdateDenied => "update-denied",
            Self::NotFound => "not-found",
            Self::CreateSuccess => "create-success",
            Self::SearchSuccess => "search-success",
            Self::SearchEmpty => "search-empty",
            Self::InvalidColumns => "invalid-columns",
            Self::InternalError => "internal-error",
            Self::LogsDenied => "logs-denied",
            Self::LogsView => "logs-view",
            Self::LogsDownload => "logs-download",
            Self::LogsClear => "logs-clear",
            Self::LogsMissing => "logs-missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Executor {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

impl From<&Account> for Executor {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            username: account.username.clone(),
            display_name: account.display_name.clone(),
        }
    }
}

/// The member a command acted on. Either half may be unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditTarget {
    pub name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub command_id: CommandId,
    pub kind: AuditKind,
    pub message: String,
    pub executor: Option<Executor>,
    pub target: Option<AuditTarget>,
    pub command: Option<String>,
    pub options: Option<serde_json::Value>,
    pub before: Option<BTreeMap<String, String>>,
    pub after: Option<BTreeMap<String, String>>,
    pub results: Option<usize>,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(command_id: CommandId, kind: AuditKind, message: impl Into<String>) -> Self {
        Self {
            command_id,
            kind,
            message: message.into(),
            executor: None,
            target: None,
            command: None,
            options: None,
            before: None,
            after: None,
            results: None,
            error: None,
        }
    }

    pub fn level(&self) -> AuditLevel {
        self.kind.level()
    }

    pub fn executor(mut self, account: &Account) -> Self {
        self.executor = Some(Executor::from(account));
        self
    }

    pub fn target(mut self, name: Option<&str>, id: Option<&str>) -> Self {
        self.target = Some(AuditTarget {
            name: name.map(str::to_string),
            id: id.map(str::to_string),
        });
        self
    }

    pub fn command(mut self, name: &str) -> Self {
        self.command = Some(name.to_string());
        self
    }

    pub fn options<T: Serialize>(mut self, options: &T) -> Self {
        self.options = serde_json::to_value(options).ok();
        self
    }

    pub fn diff(mut self, diff: &FieldDiff) -> Self {
        self.before = Some(diff.before.clone());
        self.after = Some(diff.after.clone());
        self
    }

    pub fn results(mut self, count: usize) -> Self {
        self.results = Some(count);
        self
    }

    pub fn error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Everything after the message: ` | Executor: ...` segments, absent
    /// fields omitted.
    pub fn details(&self) -> String {
        let mut out = String::new();
        if let Some(e) = &self.executor {
            let _ = write!(out, " | Executor: {} ({})", e.display_name, e.id);
        }
        if let Some(t) = &self.target {
            let _ = write!(
                out,
                " | Target: {} ({})",
                t.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Unknown"),
                t.id.as_deref().filter(|i| !i.is_empty()).unwrap_or("Unknown"),
            );
        }
        if let Some(c) = &self.command {
            let _ = write!(out, " | Command: {c}");
        }
        if let Some(o) = &self.options {
            let _ = write!(out, " | Options: {o}");
        }
        if let Some(b) = &self.before {
            let _ = write!(out, " | Before: {}", json_map(b));
        }
        if let Some(a) = &self.after {
            let _ = write!(out, " | After: {}", json_map(a));
        }
        if let Some(n) = self.results {
            let _ = write!(out, " | Results: {n}");
        }
        if let Some(e) = &self.error {
            let _ = write!(out, " | Error: {e}");
        }
        out
    }

    /// One log-file line.
    pub fn format_line(&self, timestamp: &str) -> String {
        format!("{timestamp} [{}] {}{}", self.level(), self.message, self.details())
    }
}

fn json_map(map: &BTreeMap<String, String>) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for audit events. Emission never fails the command.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &AuditEvent);
}

/// Forwards events to `tracing` at the event's level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn emit(&self, event: &AuditEvent) {
        let command_id = event.command_id.to_string();
        let kind = event.kind.as_str();
        let details = event.details();
        match event.level() {
            AuditLevel::Info => {
                tracing::info!(target: "artisan::audit", %command_id, kind, "{}{}", event.message, details)
            }
            AuditLevel::Warn => {
                tracing::warn!(target: "artisan::audit", %command_id, kind, "{}{}", event.message, details)
            }
            AuditLevel::Error => {
                tracing::error!(target: "artisan::audit", %command_id, kind, "{}{}", event.message, details)
            }
        }
    }
}

/// Sends every event to each inner sink in order.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for Fanout {
    fn emit(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    fn actor() -> Account {
        Account::new("U1", "Alice")
    }

    #[test]
    fn full_line_has_every_segment_in_order() {
        let mut diff = FieldDiff::default();
        diff.before.insert("level_1".into(), "Master".into());
        diff.after.insert("level_1".into(), "Grandmaster".into());
        let event = AuditEvent::new(CommandId::new(), AuditKind::UpdateSuccess, "[UPDATE SUCCESS] Data updated")
            .executor(&actor())
            .target(Some("Alice"), Some("U1"))
            .command("member-update")
            .options(&json!({"level_1": "Grandmaster"}))
            .diff(&diff);
        assert_eq!(
            event.format_line("2024-05-01 12:00:00"),
            "2024-05-01 12:00:00 [INFO] [UPDATE SUCCESS] Data updated | Executor: Alice (U1) \
             | Target: Alice (U1) | Command: member-update | Options: {\"level_1\":\"Grandmaster\"} \
             | Before: {\"level_1\":\"Master\"} | After: {\"level_1\":\"Grandmaster\"}"
        );
    }

    #[test]
    fn missing_fields_are_omitted_and_unknown_target_named() {
        let event = AuditEvent::new(CommandId::new(), AuditKind::NotFound, "[UPDATE FAILED] Discord ID not found")
            .target(None, Some("U9"));
        assert_eq!(
            event.format_line("t"),
            "t [WARN] [UPDATE FAILED] Discord ID not found | Target: Unknown (U9)"
        );
    }

    #[test]
    fn error_and_results_segments() {
        let event = AuditEvent::new(CommandId::new(), AuditKind::InternalError, "boom")
            .results(3)
            .error("store down");
        assert_eq!(event.format_line("t"), "t [ERROR] boom | Results: 3 | Error: store down");
    }

    #[test]
    fn kinds_map_to_levels() {
        assert_eq!(AuditKind::CreateSuccess.level(), AuditLevel::Info);
        assert_eq!(AuditKind::SearchEmpty.level(), AuditLevel::Info);
        assert_eq!(AuditKind::UpdateDenied.level(), AuditLevel::Warn);
        assert_eq!(AuditKind::LogsMissing.level(), AuditLevel::Warn);
        assert_eq!(AuditKind::InternalError.level(), AuditLevel::Error);
        assert_eq!(AuditKind::InvalidColumns.as_str(), "invalid-columns");
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<AuditKind>>);

    impl AuditSink for Collect {
        fn emit(&self, event: &AuditEvent) {
            self.0.lock().unwrap().push(event.kind);
        }
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(Collect::default());
        let b = Arc::new(Collect::default());
        let fanout = Fanout::new().with(a.clone()).with(b.clone()).with(Arc::new(TracingSink));
        fanout.emit(&AuditEvent::new(CommandId::new(), AuditKind::SearchSuccess, "ok"));
        assert_eq!(*a.0.lock().unwrap(), vec![AuditKind::SearchSuccess]);
        assert_eq!(*b.0.lock().unwrap(), vec![AuditKind::SearchSuccess]);
    }
}
