//! PostgreSQL implementation of DurableMemoryStore
//!
//! Rows carry a `partition_day` column so keyword and listing scans stay
//! within recent days; `get` goes through the primary key and reaches items
//! of any age.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use kairo::{DomainError, DurableMemoryStore, MemoryItem, MemoryKind};

/// Default number of days scanned by keyword and listing queries
const DEFAULT_SCAN_DAYS: i32 = 30;

/// PostgreSQL implementation of DurableMemoryStore
pub struct PgDurableMemoryStore {
    pool: PgPool,
    scan_days: i32,
}

impl PgDurableMemoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            scan_days: DEFAULT_SCAN_DAYS,
        }
    }

    fn scan_from(&self) -> NaiveDate {
        (Utc::now() - chrono::Duration::days(self.scan_days as i64)).date_naive()
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct MemoryItemRow {
    id: String,
    recorded_at: DateTime<Utc>,
    kind: String,
    content: String,
    summary: String,
    tags: Vec<String>,
    importance: f32,
    access_count: i64,
    last_accessed_at: Option<DateTime<Utc>>,
    promoted_at: Option<DateTime<Utc>>,
    metadata: Option<serde_json::Value>,
}

impl TryFrom<MemoryItemRow> for MemoryItem {
    type Error = DomainError;

    fn try_from(row: MemoryItemRow) -> Result<Self, Self::Error> {
        let kind: MemoryKind = row
            .kind
            .parse()
            .map_err(|e| DomainError::Repository(format!("row {}: {}", row.id, e)))?;

        Ok(Self {
            id: row.id,
            timestamp: row.recorded_at,
            kind,
            content: row.content,
            summary: row.summary,
            tags: row.tags.into_iter().collect(),
            importance: row.importance,
            access_count: row.access_count.max(0) as u64,
            last_accessed_at: row.last_accessed_at,
            promoted_at: row.promoted_at,
            embedding: None,
            metadata: row.metadata,
        })
    }
}

fn into_items(rows: Vec<MemoryItemRow>) -> Result<Vec<MemoryItem>, DomainError> {
    rows.into_iter().map(MemoryItem::try_from).collect()
}

/// Pool exhaustion and I/O trouble are worth retrying; SQL errors are not
fn map_sqlx_error(e: sqlx::Error) -> DomainError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
            DomainError::Transient(e.to_string())
        }
        other => DomainError::Repository(other.to_string()),
    }
}

/// Escape LIKE wildcards in user input
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl DurableMemoryStore for PgDurableMemoryStore {
    async fn store(&self, item: MemoryItem) -> Result<String, DomainError> {
        let tags: Vec<String> = item.tags.iter().cloned().collect();

        sqlx::query(
            r#"
            INSERT INTO memory_items (
                id, partition_day, recorded_at, kind, content, summary, tags,
                importance, access_count, last_accessed_at, promoted_at, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                partition_day = EXCLUDED.partition_day,
                recorded_at = EXCLUDED.recorded_at,
                kind = EXCLUDED.kind,
                content = EXCLUDED.content,
                summary = EXCLUDED.summary,
                tags = EXCLUDED.tags,
                importance = EXCLUDED.importance,
                access_count = EXCLUDED.access_count,
                last_accessed_at = EXCLUDED.last_accessed_at,
                promoted_at = EXCLUDED.promoted_at,
                metadata = EXCLUDED.metadata
            "#,
        )
        .bind(&item.id)
        .bind(item.timestamp.date_naive())
        .bind(item.timestamp)
        .bind(item.kind.as_str())
        .bind(&item.content)
        .bind(&item.summary)
        .bind(&tags)
        .bind(item.importance)
        .bind(item.access_count as i64)
        .bind(item.last_accessed_at)
        .bind(item.promoted_at)
        .bind(&item.metadata)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        tracing::debug!("💾 Durable item stored: {}", item.id);
        Ok(item.id)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryItem>, DomainError> {
        let row = sqlx::query_as::<_, MemoryItemRow>(
            r#"
            UPDATE memory_items
            SET access_count = access_count + 1, last_accessed_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(MemoryItem::try_from).transpose()
    }

    async fn search_by_keyword(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, DomainError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, MemoryItemRow>(
            r#"
            SELECT * FROM memory_items
            WHERE partition_day >= $1
              AND (
                content ILIKE $2
                OR summary ILIKE $2
                OR EXISTS (SELECT 1 FROM unnest(tags) AS t WHERE t ILIKE $2)
              )
            ORDER BY recorded_at DESC
            LIMIT $3
            "#,
        )
        .bind(self.scan_from())
        .bind(like_pattern(query))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        into_items(rows)
    }

    async fn list_by_kind(
        &self,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, DomainError> {
        let rows = sqlx::query_as::<_, MemoryItemRow>(
            r#"
            SELECT * FROM memory_items
            WHERE partition_day >= $1 AND kind = $2
            ORDER BY recorded_at DESC
            LIMIT $3
            "#,
        )
        .bind(self.scan_from())
        .bind(kind.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        into_items(rows)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryItem>, DomainError> {
        let rows = sqlx::query_as::<_, MemoryItemRow>(
            r#"
            SELECT * FROM memory_items
            WHERE partition_day >= $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(self.scan_from())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        into_items(rows)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM memory_items")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }
}
