use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                feed_url TEXT NOT NULL UNIQUE,
                category TEXT,
                active BOOLEAN NOT NULL DEFAULT TRUE
            );
            CREATE INDEX IF NOT EXISTS idx_sources_active ON sources (active);

            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                summary TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                author TEXT NOT NULL,
                source TEXT NOT NULL,
                published_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                category TEXT,
                image_url TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles (published_at);
            CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles (created_at);
            CREATE INDEX IF NOT EXISTS idx_articles_source ON articles (source);

            -- Entity roster the mention matcher is built from; rows managed
            -- by the admin surface, read-only here.
            CREATE TABLE IF NOT EXISTS tracked_entities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL
            );

            -- Entity-Article relationships
            CREATE TABLE IF NOT EXISTS article_entities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                entity_id INTEGER NOT NULL,
                FOREIGN KEY (article_id) REFERENCES articles (id) ON DELETE CASCADE,
                FOREIGN KEY (entity_id) REFERENCES tracked_entities (id) ON DELETE CASCADE,
                UNIQUE(article_id, entity_id)
            );
            CREATE INDEX IF NOT EXISTS idx_article_entities_article_id ON article_entities (article_id);
            CREATE INDEX IF NOT EXISTS idx_article_entities_entity_id ON article_entities (entity_id);

            -- Append-only engagement event log
            CREATE TABLE IF NOT EXISTS engagement_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                client_ip TEXT,
                user_agent TEXT,
                metadata TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (article_id) REFERENCES articles (id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_engagement_events_article_created
                ON engagement_events (article_id, created_at);

            -- Rolling per-article counters, written in the same transaction
            -- as the event that produced them
            CREATE TABLE IF NOT EXISTS engagement_counters (
                article_id INTEGER PRIMARY KEY,
                views INTEGER NOT NULL DEFAULT 0,
                shares INTEGER NOT NULL DEFAULT 0,
                comments INTEGER NOT NULL DEFAULT 0,
                likes INTEGER NOT NULL DEFAULT 0,
                last_updated INTEGER NOT NULL,
                FOREIGN KEY (article_id) REFERENCES articles (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS source_authority (
                source_name TEXT PRIMARY KEY,
                authority_score REAL NOT NULL,
                credibility_score REAL NOT NULL,
                reach_score REAL NOT NULL,
                total_articles INTEGER NOT NULL,
                avg_engagement REAL NOT NULL,
                last_calculated INTEGER NOT NULL
            );

            -- Precomputed trending batches, replaced wholesale per window
            CREATE TABLE IF NOT EXISTS trending_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                time_window TEXT NOT NULL,
                trending_score REAL NOT NULL,
                engagement_score REAL NOT NULL,
                velocity_score REAL NOT NULL,
                authority_score REAL NOT NULL,
                content_score REAL NOT NULL,
                recency_score REAL NOT NULL,
                reason TEXT NOT NULL,
                calculated_at INTEGER NOT NULL,
                FOREIGN KEY (article_id) REFERENCES articles (id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_trending_cache_window_calculated
                ON trending_cache (time_window, calculated_at);
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(())
    }
}
