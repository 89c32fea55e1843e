use std::collections::BTreeMap;
use std::sync::Arc;

use artisan_core::text::{capitalize_words, eq_ignore_case};
use artisan_core::{Account, AccountId, Clock, FieldUpdates, MemberColumns, Record, SkillField, Table};
use serde::Serialize;

use crate::error::EngineError;

// ============================================================================
// Request / outcome types
// ============================================================================

/// A `member-update` invocation after option parsing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpsertRequest {
    /// Already capitalized per word.
    pub name: String,
    /// Explicit target; only honoured for privileged accounts.
    pub target: Option<AccountId>,
    pub updates: FieldUpdates,
}

impl UpsertRequest {
    pub fn new(name: &str) -> Self {
        Self {
            name: capitalize_words(name),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(AccountId::new(target));
        self
    }

    /// Blank values are treated as "not supplied".
    pub fn with_update(mut self, field: SkillField, value: &str) -> Self {
        if !value.trim().is_empty() {
            self.updates.insert(field, capitalize_words(value));
        }
        self
    }

    /// Updates keyed by column name, for audit options.
    pub fn updates_by_column(&self) -> BTreeMap<&'static str, &str> {
        self.updates
            .iter()
            .map(|(field, value)| (field.column_name(), value.as_str()))
            .collect()
    }
}

/// Cells that actually changed, keyed by column name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FieldDiff {
    pub before: BTreeMap<String, String>,
    pub after: BTreeMap<String, String>,
}

impl FieldDiff {
    pub fn is_empty(&self) -> bool {
        self.after.is_empty()
    }

    fn record(&mut self, column: &str, before: String, after: &str) {
        self.before.insert(column.to_string(), before);
        self.after.insert(column.to_string(), after.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created { name: String, owner: AccountId, slot: usize },
    Updated { name: String, owner: AccountId, diff: FieldDiff },
    ProxyUpdated { name: String, target: AccountId, diff: FieldDiff },
}

// ============================================================================
// Reconciler
// ============================================================================

pub struct Reconciler {
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Applies `request` to `table` in memory.
    ///
    /// `Err` means nothing in `table` was touched: denial, an unknown proxy
    /// target and schema mismatches all return before the first cell write.
    pub fn upsert(
        &self,
        table: &mut Table,
        request: &UpsertRequest,
        actor: &Account,
        privileged: bool,
    ) -> Result<UpsertOutcome, EngineError> {
        let columns = MemberColumns::resolve(table.header())?;
        match request.target.as_ref().filter(|_| privileged) {
            Some(target) => self.proxy_update(table, &columns, request, target),
            None => self.create_or_update(table, &columns, request, actor),
        }
    }

    fn proxy_update(
        &self,
        table: &mut Table,
        columns: &MemberColumns,
        request: &UpsertRequest,
        target: &AccountId,
    ) -> Result<UpsertOutcome, EngineError> {
        let record = table
            .find_mut(|r| target.matches_cell(r.get(columns.discord_id)))
            .ok_or_else(|| EngineError::RecordNotFound { identity: target.to_string() })?;

        let diff = apply_updates(record, columns, &request.updates);
        if !request.name.trim().is_empty() {
            record.set(columns.name, request.name.as_str());
        }
        record.set(columns.last_update, self.clock.stamp());

        Ok(UpsertOutcome::ProxyUpdated {
            name: request.name.clone(),
            target: target.clone(),
            diff,
        })
    }

    fn create_or_update(
        &self,
        table: &mut Table,
        columns: &MemberColumns,
        request: &UpsertRequest,
        actor: &Account,
    ) -> Result<UpsertOutcome, EngineError> {
        if request.name.trim().is_empty() {
            return Err(EngineError::EmptyName);
        }

        let existing = table.find_mut(|r| eq_ignore_case(r.get(columns.name), &request.name));
        let Some(record) = existing else {
            return Ok(self.create(table, columns, request, actor));
        };
        let current_name = record.get(columns.name).to_string();
        let owner = record.get(columns.discord_id);
        if !actor.id.matches_cell(owner) {
            return Err(EngineError::PermissionDenied {
                name: current_name,
                owner: owner.to_string(),
            });
        }

        record.set(columns.display_name, actor.display_name.as_str());
        record.set(columns.last_update, self.clock.stamp());
        let diff = apply_updates(record, columns, &request.updates);
        Ok(UpsertOutcome::Updated {
            name: current_name,
            owner: actor.id.clone(),
            diff,
        })
    }

    fn create(
        &self,
        table: &mut Table,
        columns: &MemberColumns,
        request: &UpsertRequest,
        actor: &Account,
    ) -> UpsertOutcome {
        let mut record = Record::blank(table.width());
        record.set(columns.name, request.name.as_str());
        record.set(columns.discord_id, actor.id.as_str());
        record.set(columns.display_name, actor.display_name.as_str());
        record.set(columns.last_update, self.clock.stamp());
        apply_updates(&mut record, columns, &request.updates);
        UpsertOutcome::Created {
            name: request.name.clone(),
            owner: actor.id.clone(),
            slot: table.place(record),
        }
    }
}

fn apply_updates(record: &mut Record, columns: &MemberColumns, updates: &FieldUpdates) -> FieldDiff {
    let mut diff = FieldDiff::default();
    for (field, value) in updates {
        let Some(index) = columns.slots.index_of(*field) else {
            tracing::debug!(column = field.column_name(), "column absent from header, update skipped");
            continue;
        };
        if record.get(index) == value {
            continue;
        }
        if let Some(previous) = record.set(index, value.as_str()) {
            diff.record(field.column_name(), previous, value);
        }
    }
    diff
}
