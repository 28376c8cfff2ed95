use sqlx::Row;
use tracing::debug;

use super::core::Database;
use crate::TARGET_DB;

/// A syndicated feed source from the catalog. Rows are managed by the
/// admin surface; the ingestion pipeline only reads them.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub feed_url: String,
    pub category: Option<String>,
    pub active: bool,
}

impl Database {
    pub async fn list_active_sources(&self) -> Result<Vec<Source>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, feed_url, category, active
            FROM sources
            WHERE active = TRUE
            ORDER BY name
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        let sources = rows
            .into_iter()
            .map(|row| Source {
                id: row.get("id"),
                name: row.get("name"),
                feed_url: row.get("feed_url"),
                category: row.get("category"),
                active: row.get("active"),
            })
            .collect::<Vec<_>>();

        debug!(target: TARGET_DB, "Loaded {} active sources", sources.len());
        Ok(sources)
    }
}
