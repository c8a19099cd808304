//! SQLite persistence for indexed events and the resume cursor.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::Result;
use crate::events::{CredentialEvent, EventKind, EventRecord};

const EVENT_COLUMNS: &str = "id, event_type, credential_id, university, student, actor, detail, \
     metadata_uri, payload, ledger, timestamp, contract_id, tx_hash, created_at";

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Cursor helpers
// ─────────────────────────────────────────────────────────

/// Read the last-seen ledger from the cursor row.
/// Returns `0` when no cursor has been persisted yet.
pub async fn get_last_ledger(pool: &SqlitePool) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT last_ledger FROM indexer_cursor WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Persist the last-seen ledger and the RPC pagination cursor, if any.
pub async fn save_cursor(
    pool: &SqlitePool,
    last_ledger: i64,
    last_cursor: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE indexer_cursor SET last_ledger = ?1, last_cursor = ?2 WHERE id = 1")
        .bind(last_ledger)
        .bind(last_cursor)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_cursor_string(pool: &SqlitePool) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT last_cursor FROM indexer_cursor WHERE id = 1")
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(v,)| v))
}

// ─────────────────────────────────────────────────────────
// Event writes
// ─────────────────────────────────────────────────────────

/// Persist a batch of decoded events. Re-inserting an event already seen
/// for the same ledger, transaction, kind and subject is a no-op, so a
/// ledger range can be polled twice safely. Returns the number of new rows.
pub async fn insert_events(pool: &SqlitePool, events: &[CredentialEvent]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;
    for ev in events {
        let rows_affected = sqlx::query(
            r#"
            INSERT OR IGNORE INTO events
                (event_type, credential_id, university, student, actor, detail,
                 metadata_uri, payload, ledger, timestamp, contract_id, tx_hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&ev.event_type)
        .bind(&ev.credential_id)
        .bind(&ev.university)
        .bind(&ev.student)
        .bind(&ev.actor)
        .bind(&ev.detail)
        .bind(&ev.metadata_uri)
        .bind(&ev.payload)
        .bind(ev.ledger)
        .bind(ev.timestamp)
        .bind(&ev.contract_id)
        .bind(&ev.tx_hash)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        count += rows_affected as usize;
    }
    tx.commit().await?;
    Ok(count)
}

// ─────────────────────────────────────────────────────────
// Event reads
// ─────────────────────────────────────────────────────────

/// Fetch all events, ordered by ledger ascending.
pub async fn get_all_events(pool: &SqlitePool) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events ORDER BY ledger ASC, id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Issue and revocation history of one credential, oldest first.
pub async fn get_events_for_credential(
    pool: &SqlitePool,
    credential_id: &str,
) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE credential_id = ?1 ORDER BY ledger ASC, id ASC"
    ))
    .bind(credential_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Everything a university did or had done to it: registration decisions
/// and the credentials it issued or revoked.
pub async fn get_events_for_university(
    pool: &SqlitePool,
    university: &str,
) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE university = ?1 ORDER BY ledger ASC, id ASC"
    ))
    .bind(university)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Issuance events for a student's credentials.
pub async fn get_issued_for_student(
    pool: &SqlitePool,
    student: &str,
) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events \
         WHERE student = ?1 AND event_type = ?2 ORDER BY ledger ASC, id ASC"
    ))
    .bind(student)
    .bind(EventKind::CredentialIssued.as_str())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    fn event(kind: EventKind, ledger: i64) -> CredentialEvent {
        CredentialEvent {
            event_type: kind.as_str().to_string(),
            credential_id: None,
            university: Some("GUNI".into()),
            student: None,
            actor: None,
            detail: None,
            metadata_uri: None,
            payload: None,
            ledger,
            timestamp: 1_700_000_000 + ledger,
            contract_id: "CCRED".into(),
            tx_hash: Some(format!("tx{ledger}")),
        }
    }

    fn issued(id: &str, student: &str, ledger: i64) -> CredentialEvent {
        CredentialEvent {
            credential_id: Some(id.into()),
            student: Some(student.into()),
            detail: Some("BSc".into()),
            metadata_uri: Some("ipfs://bafy".into()),
            ..event(EventKind::CredentialIssued, ledger)
        }
    }

    #[tokio::test]
    async fn cursor_starts_at_zero_and_round_trips() {
        let pool = memory_pool().await;
        assert_eq!(get_last_ledger(&pool).await.unwrap(), 0);
        assert_eq!(get_cursor_string(&pool).await.unwrap(), None);

        save_cursor(&pool, 812, Some("0000812-1")).await.unwrap();
        assert_eq!(get_last_ledger(&pool).await.unwrap(), 812);
        assert_eq!(
            get_cursor_string(&pool).await.unwrap().as_deref(),
            Some("0000812-1")
        );
    }

    #[tokio::test]
    async fn reinserting_the_same_events_is_a_no_op() {
        let pool = memory_pool().await;
        let batch = vec![
            event(EventKind::UniversityRegistered, 10),
            event(EventKind::UniversityAdded, 11),
            issued("0", "GSTU", 12),
        ];
        assert_eq!(insert_events(&pool, &batch).await.unwrap(), 3);
        assert_eq!(insert_events(&pool, &batch).await.unwrap(), 0);
        assert_eq!(get_all_events(&pool).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn queries_filter_by_subject() {
        let pool = memory_pool().await;
        let mut revoked = event(EventKind::CredentialRevoked, 14);
        revoked.credential_id = Some("0".into());
        revoked.actor = Some("GUNI".into());

        let mut other_uni = event(EventKind::UniversityRegistered, 9);
        other_uni.university = Some("GOTHER".into());

        insert_events(
            &pool,
            &[
                other_uni,
                event(EventKind::UniversityRegistered, 10),
                issued("0", "GSTU", 12),
                issued("1", "GSTU2", 13),
                revoked,
            ],
        )
        .await
        .unwrap();

        let history = get_events_for_credential(&pool, "0").await.unwrap();
        let kinds: Vec<_> = history.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, ["credential_issued", "credential_revoked"]);

        assert_eq!(get_events_for_university(&pool, "GUNI").await.unwrap().len(), 4);
        assert_eq!(get_events_for_university(&pool, "GOTHER").await.unwrap().len(), 1);

        let held = get_issued_for_student(&pool, "GSTU").await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].credential_id.as_deref(), Some("0"));
        assert_eq!(held[0].metadata_uri.as_deref(), Some("ipfs://bafy"));
    }
}
