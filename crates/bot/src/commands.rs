use std::collections::BTreeMap;

use artisan_core::{Account, CommandId, SkillField};
use artisan_engine::service::{MEMBER_SEARCH, MEMBER_UPDATE};
use artisan_engine::{MemberService, Reply, SearchQuery, UpsertRequest};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::logs::{ADMIN_LOGS, LogCommand, LogsRequest};

/// One request as it arrives from the transport.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default)]
    pub options: Value,
    pub account: Account,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("invalid options for {command}: {source}")]
    InvalidOptions {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown option for {command}: {option}")]
    UnknownOption { command: &'static str, option: String },

    #[error("{option} must not be blank")]
    BlankOption { command: &'static str, option: &'static str },
}

#[derive(Debug, Deserialize)]
struct UpdateOptions {
    name: String,
    #[serde(default, alias = "discord_id")]
    target_identity: Option<String>,
    #[serde(flatten)]
    fields: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Deserialize)]
struct SearchOptions {
    search_for: String,
    columns: String,
    #[serde(default)]
    level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MemberUpdate(UpsertRequest),
    MemberSearch(SearchQuery),
    AdminLogs(LogsRequest),
}

fn options<T: serde::de::DeserializeOwned>(command: &'static str, value: Value) -> Result<T, CommandError> {
    let value = if value.is_null() { Value::Object(Default::default()) } else { value };
    serde_json::from_value(value).map_err(|source| CommandError::InvalidOptions { command, source })
}

impl Command {
    pub fn parse(name: &str, value: Value) -> Result<Self, CommandError> {
        match name {
            MEMBER_UPDATE => {
                let opts: UpdateOptions = options(MEMBER_UPDATE, value)?;
                let mut request = UpsertRequest::new(&opts.name);
                if let Some(target) = opts.target_identity.filter(|t| !t.trim().is_empty()) {
                    request = request.with_target(target);
                }
                for (option, value) in &opts.fields {
                    let field = SkillField::parse(option).ok_or_else(|| CommandError::UnknownOption {
                        command: MEMBER_UPDATE,
                        option: option.clone(),
                    })?;
                    if let Some(value) = value {
                        request = request.with_update(field, value);
                    }
                }
                Ok(Self::MemberUpdate(request))
            }
            MEMBER_SEARCH => {
                let opts: SearchOptions = options(MEMBER_SEARCH, value)?;
                if opts.search_for.trim().is_empty() {
                    return Err(CommandError::BlankOption { command: MEMBER_SEARCH, option: "search_for" });
                }
                Ok(Self::MemberSearch(SearchQuery::new(
                    &opts.search_for,
                    &opts.columns,
                    opts.level.as_deref(),
                )))
            }
            ADMIN_LOGS => Ok(Self::AdminLogs(options(ADMIN_LOGS, value)?)),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Routes parsed commands to their handlers.
pub struct Dispatcher {
    members: MemberService,
    logs: LogCommand,
}

impl Dispatcher {
    pub fn new(members: MemberService, logs: LogCommand) -> Self {
        Self { members, logs }
    }

    pub async fn handle(&self, request: Request) -> Reply {
        let command_id = CommandId::new();
        let command = match Command::parse(&request.command, request.options) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(%command_id, command = %request.command, account = %request.account.id, error = %e, "rejected command");
                return Reply::ephemeral(format!("Could not run {}: {e}", request.command));
            }
        };
        tracing::debug!(%command_id, command = %request.command, account = %request.account.id, "dispatching");
        match command {
            Command::MemberUpdate(update) => {
                self.members.member_update(command_id, &update, &request.account).await
            }
            Command::MemberSearch(query) => {
                self.members.member_search(command_id, &query, &request.account).await
            }
            Command::AdminLogs(logs) => self.logs.handle(command_id, &logs, &request.account).await,
        }
    }
}
