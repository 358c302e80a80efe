use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::debug;

use crate::models::{Feed, FeedDetail, FeedError};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Storage operations the feed use-cases depend on.
///
/// `Database` is the production implementation; tests swap in fakes.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// All stored feeds, in whatever order the store returns them.
    async fn read_feeds(&self) -> Result<Vec<FeedDetail>, FeedError>;

    /// The feed with `feed_id`, or `None` when no row matches.
    async fn read_feed_by_id(&self, feed_id: i64) -> Result<Option<FeedDetail>, FeedError>;

    /// Insert `feed` and return its generated id. Failures are reported as
    /// [`FeedError::Create`].
    async fn create_feed(&self, feed: &Feed) -> Result<i64, FeedError>;
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        Self::with_max_connections(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn with_max_connections(
        database_url: &str,
        max_connections: u32,
    ) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Apply pending migrations from `migrations/`. Safe to call repeatedly.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl FeedStore for Database {
    async fn read_feeds(&self) -> Result<Vec<FeedDetail>, FeedError> {
        let feeds = sqlx::query_as::<_, FeedDetail>(
            "SELECT id, origin, event, description FROM feed",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    async fn read_feed_by_id(&self, feed_id: i64) -> Result<Option<FeedDetail>, FeedError> {
        let feed = sqlx::query_as::<_, FeedDetail>(
            "SELECT id, origin, event, description FROM feed WHERE id = ?",
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    async fn create_feed(&self, feed: &Feed) -> Result<i64, FeedError> {
        let result = sqlx::query(
            r#"
            INSERT INTO feed (origin, event, description)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&feed.origin)
        .bind(&feed.event)
        .bind(&feed.description)
        .execute(&self.pool)
        .await
        .map_err(|e| FeedError::Create(e.to_string()))?;

        let id = result.last_insert_rowid();
        debug!(feed_id = id, origin = %feed.origin, "Inserted feed");
        Ok(id)
    }
}
