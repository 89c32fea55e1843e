use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use artisan_core::clock::{DATE_FORMAT, parse_date};
use artisan_core::{Account, Clock, CommandId, RolePolicy};
use artisan_engine::{AuditEvent, AuditKind, AuditSink, Reply};
use serde::{Deserialize, Serialize};

pub const ADMIN_LOGS: &str = "admin-logs";
pub const DEFAULT_VIEW_LINES: usize = 10;
/// Longest message the chat transport accepts.
pub const MAX_MESSAGE_CHARS: usize = 2000;

pub const LOGS_DENIED_REPLY: &str = "You do not have permission to use this command.";
pub const LOGS_TOO_LARGE_REPLY: &str = "Log data is too large to display. Use the \"Download\" option.";
pub const LOGS_FAILED_REPLY: &str = "An error occurred while processing your logs command.";

fn log_file(dir: &Path, date: &str) -> PathBuf {
    dir.join(format!("bot-{date}.log"))
}

// ============================================================================
// File sink
// ============================================================================

/// Appends formatted audit lines to `<dir>/bot-<date>.log`, one file per
/// local day.
pub struct FileSink {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    fn append(&self, line: &str) -> io::Result<()> {
        let today = self.clock.today().format(DATE_FORMAT).to_string();
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        std::fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file(&self.dir, &today))?;
        writeln!(file, "{line}")
    }
}

impl AuditSink for FileSink {
    fn emit(&self, event: &AuditEvent) {
        let line = event.format_line(&self.clock.stamp());
        if let Err(e) = self.append(&line) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to append audit line");
        }
    }
}

// ============================================================================
// admin-logs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    View,
    Download,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsRequest {
    pub action: LogAction,
    #[serde(default)]
    pub lines: Option<usize>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
struct LogsOptions<'a> {
    action: LogAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<usize>,
    date: &'a str,
}

/// Read, ship or truncate one day's audit file. Privileged accounts only;
/// every reply is ephemeral.
pub struct LogCommand {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    roles: RolePolicy,
    audit: Arc<dyn AuditSink>,
}

impl LogCommand {
    pub fn new(
        dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        roles: RolePolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            dir: dir.into(),
            clock,
            roles,
            audit,
        }
    }

    pub async fn handle(&self, command_id: CommandId, request: &LogsRequest, actor: &Account) -> Reply {
        let lines = match request.action {
            LogAction::View => Some(request.lines.filter(|n| *n > 0).unwrap_or(DEFAULT_VIEW_LINES)),
            LogAction::Download | LogAction::Clear => None,
        };
        let date = request
            .date
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| self.clock.today().format(DATE_FORMAT).to_string());
        let options = LogsOptions { action: request.action, lines, date: &date };
        let event = |kind, message: &str| {
            AuditEvent::new(command_id, kind, message)
                .executor(actor)
                .command(ADMIN_LOGS)
                .options(&options)
        };

        if !self.roles.is_privileged(actor) {
            self.audit.emit(&event(AuditKind::LogsDenied, "[LOGS FAILED] Unauthorized access attempt"));
            return Reply::ephemeral(LOGS_DENIED_REPLY);
        }

        if parse_date(&date).is_none() {
            self.audit.emit(&event(AuditKind::LogsMissing, "[LOGS FAILED] Invalid date"));
            return Reply::ephemeral(format!("Invalid date: {date}. Use the YYYY-MM-DD format."));
        }

        let path = log_file(&self.dir, &date);
        let result = match request.action {
            LogAction::View => self.view(&path, lines.unwrap_or(DEFAULT_VIEW_LINES)).await,
            LogAction::Download => self.download(&path, &date).await,
            LogAction::Clear => self.clear(&path, &date).await,
        };

        let (kind, message, reply) = match (request.action, result) {
            (LogAction::View, Ok(reply)) => (AuditKind::LogsView, "[LOGS VIEW SUCCESS] Logs viewed", reply),
            (LogAction::Download, Ok(reply)) => {
                (AuditKind::LogsDownload, "[LOGS DOWNLOAD SUCCESS] Logs downloaded", reply)
            }
            (LogAction::Clear, Ok(reply)) => (AuditKind::LogsClear, "[LOGS CLEAR SUCCESS] Logs cleared", reply),
            (action, Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                let message = match action {
                    LogAction::View => "[LOGS VIEW FAILED] File not found",
                    LogAction::Download => "[LOGS DOWNLOAD FAILED] File not found",
                    LogAction::Clear => "[LOGS CLEAR FAILED] File not found",
                };
                let reply = Reply::ephemeral(format!("No log file found for the specified date: {date}."));
                (AuditKind::LogsMissing, message, reply)
            }
            (_, Err(e)) => {
                self.audit.emit(
                    &event(AuditKind::InternalError, "Error handling admin-logs command").error(&e),
                );
                return Reply::ephemeral(LOGS_FAILED_REPLY);
            }
        };
        self.audit.emit(&event(kind, message));
        reply
    }

    async fn view(&self, path: &Path, lines: usize) -> io::Result<Reply> {
        let data = tokio::fs::read_to_string(path).await?;
        let content = format!("```log\n{}\n```", tail(&data, lines));
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Ok(Reply::ephemeral(LOGS_TOO_LARGE_REPLY));
        }
        Ok(Reply::ephemeral(content))
    }

    async fn download(&self, path: &Path, date: &str) -> io::Result<Reply> {
        let data = tokio::fs::read(path).await?;
        Ok(Reply::ephemeral(format!("Here are the logs for {date}:"))
            .with_attachment(format!("bot-{date}.log"), data))
    }

    async fn clear(&self, path: &Path, date: &str) -> io::Result<Reply> {
        tokio::fs::metadata(path).await?;
        tokio::fs::write(path, b"").await?;
        Ok(Reply::ephemeral(format!(
            "The logs for {date} have been cleared successfully."
        )))
    }
}

/// The last `lines` lines of `data`, ignoring one trailing newline.
fn tail(data: &str, lines: usize) -> String {
    let all: Vec<&str> = data.strip_suffix('\n').unwrap_or(data).split('\n').collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use artisan_core::ManualClock;
    use chrono::NaiveDate;

    use super::*;

    fn clock() -> Arc<ManualClock> {
        let now = NaiveDate::from_ymd_opt(2024, 6, 2)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap();
        Arc::new(ManualClock::new(now))
    }

    #[test]
    fn tail_takes_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("a\nb", 5), "a\nb");
        assert_eq!(tail("", 3), "");
    }

    #[test]
    fn file_sink_writes_dated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("logs"), clock());
        let actor = Account::new("U1", "Alice");
        sink.emit(&AuditEvent::new(CommandId::new(), AuditKind::CreateSuccess, "[ADD SUCCESS] Data added").executor(&actor));
        sink.emit(&AuditEvent::new(CommandId::new(), AuditKind::UpdateDenied, "[UPDATE FAILED] Unauthorized update attempt"));
        let text = std::fs::read_to_string(dir.path().join("logs/bot-2024-06-02.log")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "2024-06-02 08:30:00 [INFO] [ADD SUCCESS] Data added | Executor: Alice (U1)");
        assert!(lines[1].starts_with("2024-06-02 08:30:00 [WARN]"));
    }
}
