use std::sync::Arc;

use artisan_core::{Account, Clock, CommandId, RolePolicy};
use artisan_storage::{Disposition, RowStore};
use serde::Serialize;

use crate::audit::{AuditEvent, AuditKind, AuditSink};
use crate::error::EngineError;
use crate::reconcile::{Reconciler, UpsertOutcome, UpsertRequest};
use crate::render::{MAX_RENDERED_COLUMNS, TableRenderer};
use crate::reply::Reply;
use crate::search::{SearchQuery, SearchResult, search};

pub const MEMBER_UPDATE: &str = "member-update";
pub const MEMBER_SEARCH: &str = "member-search";

pub const DENIED_REPLY: &str = "You do not have permission to update this member's data.";
pub const UPDATE_FAILED_REPLY: &str = "An error occurred while processing your update command.";
pub const SEARCH_FAILED_REPLY: &str = "An error occurred while processing your command.";
pub const SEARCH_RESULTS_REPLY: &str = "Filtered data:";

#[derive(Debug, Serialize)]
struct SearchOptions<'a> {
    search_for: &'a str,
    columns: String,
    level: Option<&'a str>,
}

/// Handlers for the two member commands. Every outcome, including
/// failures, becomes a [`Reply`] plus exactly one audit event.
pub struct MemberService {
    rows: Arc<RowStore>,
    store_id: String,
    reconciler: Reconciler,
    roles: RolePolicy,
    renderer: Arc<dyn TableRenderer>,
    audit: Arc<dyn AuditSink>,
}

impl MemberService {
    pub fn new(
        rows: Arc<RowStore>,
        store_id: impl Into<String>,
        clock: Arc<dyn Clock>,
        roles: RolePolicy,
        renderer: Arc<dyn TableRenderer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            rows,
            store_id: store_id.into(),
            reconciler: Reconciler::new(clock),
            roles,
            renderer,
            audit,
        }
    }

    pub async fn member_update(
        &self,
        command_id: CommandId,
        request: &UpsertRequest,
        actor: &Account,
    ) -> Reply {
        let privileged = self.roles.is_privileged(actor);
        let result = self
            .rows
            .modify(&self.store_id, |table| {
                self.reconciler
                    .upsert(table, request, actor, privileged)
                    .map(Disposition::Write)
            })
            .await;

        let event = |kind, message: &str| {
            AuditEvent::new(command_id, kind, message)
                .executor(actor)
                .command(MEMBER_UPDATE)
                .options(&request.updates_by_column())
        };

        let (event, reply) = match result {
            Ok(UpsertOutcome::Created { name, owner, .. }) => (
                event(AuditKind::CreateSuccess, "[ADD SUCCESS] Data added")
                    .target(Some(&name), Some(owner.as_str())),
                Reply::text(format!("Added new data for Member: {name}")),
            ),
            Ok(UpsertOutcome::Updated { name, owner, diff }) => (
                event(AuditKind::UpdateSuccess, "[UPDATE SUCCESS] Data updated by same user")
                    .target(Some(&name), Some(owner.as_str()))
                    .diff(&diff),
                Reply::text(format!("Updated data for Member: {name}")),
            ),
            Ok(UpsertOutcome::ProxyUpdated { name, target, diff }) => (
                event(AuditKind::UpdateSuccess, "[UPDATE SUCCESS] Data updated")
                    .target(Some(&name), Some(target.as_str()))
                    .diff(&diff),
                Reply::text(format!(
                    "Updated data for member: {name}, by: {}",
                    actor.display_name
                )),
            ),
            Err(EngineError::PermissionDenied { name, owner }) => (
                event(AuditKind::UpdateDenied, "[UPDATE FAILED] Unauthorized update attempt")
                    .target(Some(&name), Some(&owner)),
                Reply::text(DENIED_REPLY),
            ),
            Err(EngineError::RecordNotFound { identity }) => (
                event(AuditKind::NotFound, "[UPDATE FAILED] Discord ID not found")
                    .target(None, Some(&identity)),
                Reply::text(format!("No member found with Discord ID: {identity}")),
            ),
            Err(e) => {
                if e.is_schema_error() {
                    tracing::error!(store_id = %self.store_id, error = %e, "sheet header does not match the member schema");
                }
                (
                    event(AuditKind::InternalError, "Error handling member-update command").error(&e),
                    Reply::text(UPDATE_FAILED_REPLY),
                )
            }
        };
        self.audit.emit(&event);
        reply
    }

    pub async fn member_search(
        &self,
        command_id: CommandId,
        query: &SearchQuery,
        actor: &Account,
    ) -> Reply {
        let options = SearchOptions {
            search_for: &query.value,
            columns: query.columns.to_string(),
            level: query.level.as_deref(),
        };
        let event = |kind, message: &str| {
            AuditEvent::new(command_id, kind, message)
                .executor(actor)
                .command(MEMBER_SEARCH)
                .options(&options)
        };

        let outcome = match self.rows.load(&self.store_id).await {
            Ok(table) => search(&table, query),
            Err(e) => Err(e.into()),
        };
        let outcome = outcome.and_then(|result| {
            if result.is_empty() {
                return Ok((result, None));
            }
            let attachment = self.render(&result)?;
            Ok((result, Some(attachment)))
        });

        let (event, reply) = match outcome {
            Ok((result, Some(data))) => (
                event(AuditKind::SearchSuccess, "[SEARCH SUCCESS] Results found").results(result.len()),
                Reply::text(SEARCH_RESULTS_REPLY).with_attachment(self.renderer.file_name(), data),
            ),
            Ok((_, None)) => (
                event(AuditKind::SearchEmpty, "[SEARCH EMPTY] No results found").results(0),
                Reply::text(empty_search_message(query)),
            ),
            Err(EngineError::InvalidColumns { columns }) => (
                event(AuditKind::InvalidColumns, "[SEARCH FAILED] Invalid columns specified"),
                Reply::text(invalid_columns_message(&columns)),
            ),
            Err(e) => {
                if e.is_schema_error() {
                    tracing::error!(store_id = %self.store_id, error = %e, "sheet header does not match the member schema");
                }
                (
                    event(AuditKind::InternalError, "Error handling member-search command").error(&e),
                    Reply::text(SEARCH_FAILED_REPLY),
                )
            }
        };
        self.audit.emit(&event);
        reply
    }

    fn render(&self, result: &SearchResult) -> Result<Vec<u8>, EngineError> {
        let (header, rows) = result.preview(MAX_RENDERED_COLUMNS);
        self.renderer.render(&header, &rows)
    }
}

pub fn empty_search_message(query: &SearchQuery) -> String {
    let mut message = format!(
        "No data matches for: {}, in {} column",
        query.value, query.columns
    );
    if let Some(level) = &query.level {
        message.push_str(&format!(", for the level {level}"));
    }
    message
}

pub fn invalid_columns_message(columns: &[String]) -> String {
    let listed = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "One or more specified columns are invalid: {listed}. Use \"any\" or a comma-separated \
         list of column names such as name,profession_1. Search_for is for Name/Profession/Expertise, \
         Level is for only Expertise."
    )
}
