use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use artisan_core::SheetValues;
use artisan_engine::AuditKind;
use artisan_engine::service::{DENIED_REPLY, UPDATE_FAILED_REPLY};
use artisan_harness::{MEMBERS, TestGuild, member, officer};
use artisan_storage::{MemoryStore, StorageError, TableStore, WritePolicy};
use async_trait::async_trait;
use chrono::TimeDelta;
use serde_json::json;

// ============================================================================
// Self updates
// ============================================================================

#[tokio::test]
async fn first_update_creates_member_row() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::new().await?;
    let alice = member("U1", "Alice");

    let reply = guild
        .update(&alice, json!({"name": "alice smith", "profession_1": "baker", "level_1": "master"}))
        .await;
    assert_eq!(reply.content, "Added new data for Member: Alice Smith");
    assert!(!reply.ephemeral);
    assert_eq!(guild.store.store_count(), 1);

    let table = guild.table().await?;
    assert_eq!(table.len(), 1);
    let row = table.record(0).ok_or("row missing")?;
    assert_eq!(row.get(0), "Alice Smith");
    assert_eq!(row.get(1), "U1");
    assert_eq!(row.get(2), "Alice");
    assert_eq!(row.get(3), "2024-03-09 17:45:00");
    assert_eq!(row.get(4), "Baker");
    assert_eq!(row.get(5), "Master");

    let event = guild.audit.last().ok_or("no audit event")?;
    assert_eq!(event.kind, AuditKind::CreateSuccess);
    assert_eq!(event.message, "[ADD SUCCESS] Data added");
    let target = event.target.ok_or("no target")?;
    assert_eq!(target.name.as_deref(), Some("Alice Smith"));
    assert_eq!(target.id.as_deref(), Some("U1"));
    Ok(())
}

#[tokio::test]
async fn owner_updates_with_case_insensitive_name() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::with_rows(&[&[
        "Alice Smith", "U1", "Alice", "2024-01-01 00:00:00", "Baker", "Master",
    ]])
    .await?;
    let alice = member("U1", "Alice S");
    guild.clock.advance(TimeDelta::minutes(10));

    let reply = guild
        .update(&alice, json!({"name": "ALICE SMITH", "level_1": "grandmaster", "profession_2": "smith"}))
        .await;
    assert_eq!(reply.content, "Updated data for Member: Alice Smith");
    assert_eq!(guild.store.store_count(), 1);

    let table = guild.table().await?;
    assert_eq!(table.len(), 1);
    let row = table.record(0).ok_or("row missing")?;
    assert_eq!(row.get(0), "Alice Smith");
    assert_eq!(row.get(2), "Alice S");
    assert_eq!(row.get(3), "2024-03-09 17:55:00");
    assert_eq!(row.get(5), "Grandmaster");
    assert_eq!(row.get(6), "Smith");

    let event = guild.audit.last().ok_or("no audit event")?;
    assert_eq!(event.kind, AuditKind::UpdateSuccess);
    assert_eq!(event.message, "[UPDATE SUCCESS] Data updated by same user");
    let before = event.before.ok_or("no before")?;
    let after = event.after.ok_or("no after")?;
    assert_eq!(before.get("level_1").map(String::as_str), Some("Master"));
    assert_eq!(before.get("profession_2").map(String::as_str), Some(""));
    assert_eq!(after.get("level_1").map(String::as_str), Some("Grandmaster"));
    assert_eq!(after.get("profession_2").map(String::as_str), Some("Smith"));
    Ok(())
}

#[tokio::test]
async fn repeating_an_update_changes_only_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::new().await?;
    let alice = member("U1", "Alice");
    let options = json!({"name": "Alice", "profession_1": "Baker", "level_1": "Master"});

    guild.update(&alice, options.clone()).await;
    let first = guild.table().await?;

    guild.clock.advance(TimeDelta::hours(1));
    let reply = guild.update(&alice, options).await;
    assert_eq!(reply.content, "Updated data for Member: Alice");
    assert_eq!(guild.store.store_count(), 2);

    let second = guild.table().await?;
    assert_eq!(second.len(), 1);
    let (a, b) = (first.record(0).ok_or("row")?, second.record(0).ok_or("row")?);
    for column in [0, 1, 2, 4, 5] {
        assert_eq!(a.get(column), b.get(column));
    }
    assert_eq!(b.get(3), "2024-03-09 18:45:00");

    let event = guild.audit.last().ok_or("no audit event")?;
    assert!(event.after.ok_or("no after")?.is_empty());
    Ok(())
}

#[tokio::test]
async fn blank_options_leave_cells_alone() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::with_rows(&[&["Alice", "U1", "Alice", "", "Baker", "Master"]]).await?;
    guild
        .update(&member("U1", "Alice"), json!({"name": "Alice", "profession_1": "  ", "level_1": null}))
        .await;
    let row = guild.table().await?.record(0).cloned().ok_or("row missing")?;
    assert_eq!(row.get(4), "Baker");
    assert_eq!(row.get(5), "Master");
    Ok(())
}

#[tokio::test]
async fn new_member_fills_first_blank_row() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::with_rows(&[&["Alice", "U1"], &[], &["Bob", "U2"]]).await?;
    let reply = guild.update(&member("U3", "Cara"), json!({"name": "cara"})).await;
    assert_eq!(reply.content, "Added new data for Member: Cara");

    let table = guild.table().await?;
    assert_eq!(table.len(), 3);
    assert_eq!(table.record(1).ok_or("row")?.get(0), "Cara");
    assert_eq!(table.record(2).ok_or("row")?.get(0), "Bob");
    Ok(())
}

// ============================================================================
// Denials
// ============================================================================

#[tokio::test]
async fn foreign_row_is_denied_without_a_write() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::with_rows(&[&["Alice", "U1", "Alice", "", "Baker", "Master"]]).await?;
    let before = guild.values().await;

    let reply = guild
        .update(&member("U2", "Mallory"), json!({"name": "alice", "level_1": "novice"}))
        .await;
    assert_eq!(reply.content, DENIED_REPLY);
    assert_eq!(guild.store.store_count(), 0);
    assert_eq!(guild.values().await, before);

    let event = guild.audit.last().ok_or("no audit event")?;
    assert_eq!(event.kind, AuditKind::UpdateDenied);
    assert_eq!(event.message, "[UPDATE FAILED] Unauthorized update attempt");
    let target = event.target.ok_or("no target")?;
    assert_eq!(target.name.as_deref(), Some("Alice"));
    assert_eq!(target.id.as_deref(), Some("U1"));
    Ok(())
}

#[tokio::test]
async fn unprivileged_target_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::with_rows(&[&["Alice", "U1", "Alice", "", "Baker", "Master"]]).await?;
    let reply = guild
        .update(&member("U2", "Mallory"), json!({"name": "Alice", "discord_id": "U1", "level_1": "novice"}))
        .await;
    assert_eq!(reply.content, DENIED_REPLY);
    assert_eq!(guild.table().await?.record(0).ok_or("row")?.get(5), "Master");
    Ok(())
}

// ============================================================================
// Proxy updates
// ============================================================================

#[tokio::test]
async fn officer_updates_member_by_identity() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::with_rows(&[
        &["Alice", "U1", "Alice", "2024-01-01 00:00:00", "Baker", "Master"],
        &["Bob", "U2", "Bob", "2024-01-01 00:00:00", "Smith", "Novice"],
    ])
    .await?;
    let boss = officer("U9", "Captain");

    let reply = guild
        .update(&boss, json!({"name": "robert", "target_identity": "U2", "level_1": "adept"}))
        .await;
    assert_eq!(reply.content, "Updated data for member: Robert, by: Captain");
    assert_eq!(guild.store.store_count(), 1);

    let table = guild.table().await?;
    let bob = table.record(1).ok_or("row")?;
    assert_eq!(bob.get(0), "Robert");
    assert_eq!(bob.get(1), "U2");
    assert_eq!(bob.get(2), "Bob");
    assert_eq!(bob.get(3), "2024-03-09 17:45:00");
    assert_eq!(bob.get(5), "Adept");
    assert_eq!(table.record(0).ok_or("row")?.get(3), "2024-01-01 00:00:00");

    let event = guild.audit.last().ok_or("no audit event")?;
    assert_eq!(event.kind, AuditKind::UpdateSuccess);
    assert_eq!(event.message, "[UPDATE SUCCESS] Data updated");
    assert_eq!(event.target.ok_or("no target")?.id.as_deref(), Some("U2"));
    Ok(())
}

#[tokio::test]
async fn proxy_target_must_exist() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::with_rows(&[&["Alice", "U1"]]).await?;
    let reply = guild
        .update(&officer("U9", "Captain"), json!({"name": "Ghost", "discord_id": "U404"}))
        .await;
    assert_eq!(reply.content, "No member found with Discord ID: U404");
    assert_eq!(guild.store.store_count(), 0);
    assert_eq!(guild.audit.kinds(), vec![AuditKind::NotFound]);
    Ok(())
}

#[tokio::test]
async fn officer_without_target_updates_own_row() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::new().await?;
    let reply = guild.update(&officer("U9", "Captain"), json!({"name": "captain"})).await;
    assert_eq!(reply.content, "Added new data for Member: Captain");
    assert_eq!(guild.table().await?.record(0).ok_or("row")?.get(1), "U9");
    Ok(())
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn header_without_identity_column_fails_generically() -> Result<(), Box<dyn std::error::Error>> {
    let sheet: SheetValues = vec![
        vec!["name".into(), "display_name".into(), "last_update".into()],
        vec!["Alice".into(), "Alice".into(), "".into()],
    ];
    let guild = TestGuild::with_sheet(sheet).await?;

    let reply = guild.update(&member("U1", "Alice"), json!({"name": "Alice"})).await;
    assert_eq!(reply.content, UPDATE_FAILED_REPLY);
    assert_eq!(guild.store.store_count(), 0);

    let event = guild.audit.last().ok_or("no audit event")?;
    assert_eq!(event.kind, AuditKind::InternalError);
    assert!(event.error.ok_or("no error")?.contains("discord_id"));
    Ok(())
}

#[tokio::test]
async fn malformed_options_never_reach_the_store() -> Result<(), Box<dyn std::error::Error>> {
    let guild = TestGuild::new().await?;
    let reply = guild.update(&member("U1", "Alice"), json!({"profession_1": "Baker"})).await;
    assert!(reply.ephemeral);
    assert!(reply.content.starts_with("Could not run member-update"));

    let reply = guild.update(&member("U1", "Alice"), json!({"name": "A", "level_7": "x"})).await;
    assert!(reply.content.contains("level_7"));
    assert_eq!(guild.store.load_count(), 0);
    assert!(guild.audit.events().is_empty());
    Ok(())
}

/// Fails the first write, then behaves like the wrapped store.
struct FlakyStore {
    inner: Arc<MemoryStore>,
    failed: AtomicBool,
}

#[async_trait]
impl TableStore for FlakyStore {
    async fn load_table(&self, store_id: &str) -> Result<SheetValues, StorageError> {
        self.inner.load_table(store_id).await
    }

    async fn store_table(&self, store_id: &str, values: &[Vec<String>]) -> Result<(), StorageError> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Http { status: 503, body: "backend unavailable".into() });
        }
        self.inner.store_table(store_id, values).await
    }
}

#[tokio::test]
async fn backend_failure_is_reported_and_retry_succeeds() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    store.seed(MEMBERS, vec![artisan_core::MemberColumns::default_header()]).await;
    let flaky = Arc::new(FlakyStore { inner: store.clone(), failed: AtomicBool::new(false) });
    let guild = TestGuild::over(store, flaky, WritePolicy::default())?;
    let alice = member("U1", "Alice");

    let reply = guild.update(&alice, json!({"name": "Alice"})).await;
    assert_eq!(reply.content, UPDATE_FAILED_REPLY);
    assert!(guild.table().await?.is_empty());
    let event = guild.audit.last().ok_or("no audit event")?;
    assert_eq!(event.kind, AuditKind::InternalError);
    assert!(event.error.ok_or("no error")?.contains("503"));

    let reply = guild.update(&alice, json!({"name": "Alice"})).await;
    assert_eq!(reply.content, "Added new data for Member: Alice");
    assert_eq!(guild.table().await?.len(), 1);
    Ok(())
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_all_land() -> Result<(), Box<dyn std::error::Error>> {
    let guild = Arc::new(TestGuild::new().await?);
    let mut tasks = Vec::new();
    for i in 0..12 {
        let guild = guild.clone();
        tasks.push(tokio::spawn(async move {
            let actor = member(&format!("U{i}"), &format!("Member {i}"));
            guild.update(&actor, json!({"name": format!("member {i}")})).await
        }));
    }
    for task in tasks {
        let reply = task.await?;
        assert!(reply.content.starts_with("Added new data for Member: Member "));
    }

    let table = guild.table().await?;
    assert_eq!(table.len(), 12);
    let mut ids: Vec<&str> = table.records().iter().map(|r| r.get(1)).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 12);
    assert_eq!(guild.audit.kinds().len(), 12);
    Ok(())
}
