use sqlx::Row;
use tracing::debug;

use super::core::Database;
use crate::TARGET_DB;

/// A tracked public figure whose mentions are linked to articles.
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl Database {
    pub async fn list_tracked_entities(&self) -> Result<Vec<TrackedEntity>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, first_name, last_name FROM tracked_entities")
            .fetch_all(self.pool())
            .await?;

        let entities = rows
            .into_iter()
            .map(|row| TrackedEntity {
                id: row.get("id"),
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
            })
            .collect::<Vec<_>>();

        debug!(target: TARGET_DB, "Loaded {} tracked entities", entities.len());
        Ok(entities)
    }

    /// Link an entity to an article. Relinking an existing pair is a no-op.
    pub async fn link_entity_to_article(
        &self,
        article_id: i64,
        entity_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO article_entities (article_id, entity_id)
            VALUES (?1, ?2)
            ON CONFLICT(article_id, entity_id) DO NOTHING
            "#,
        )
        .bind(article_id)
        .bind(entity_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get all entity IDs linked to an article
    pub async fn get_article_entity_ids(&self, article_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT entity_id FROM article_entities WHERE article_id = ?1",
        )
        .bind(article_id)
        .fetch_all(self.pool())
        .await
    }
}
