//! Feed use-cases.
//!
//! Thin orchestration over a [`FeedStore`]. The store is injected at
//! construction so the HTTP layer never reaches for a global.

use std::sync::Arc;

use tracing::info;

use crate::db::FeedStore;
use crate::models::{Feed, FeedDetail, FeedError};

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn FeedStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }

    pub async fn read_feeds(&self) -> Result<Vec<FeedDetail>, FeedError> {
        self.store.read_feeds().await
    }

    /// Absence is `Ok(None)`, not an error.
    pub async fn read_feed_by_id(&self, feed_id: i64) -> Result<Option<FeedDetail>, FeedError> {
        self.store.read_feed_by_id(feed_id).await
    }

    pub async fn create_new_feed(&self, feed: &Feed) -> Result<i64, FeedError> {
        let id = self.store.create_feed(feed).await?;
        info!(feed_id = id, "Created feed");
        Ok(id)
    }

    /// Create `feed` and return it with the generated id attached.
    ///
    /// The row is not read back: the result is the submitted payload plus
    /// the id, so any store-side transformation of the values is not seen.
    pub async fn create_new_feed_and_read_feed_by_id(
        &self,
        feed: Feed,
    ) -> Result<FeedDetail, FeedError> {
        let id = self.create_new_feed(&feed).await?;
        Ok(FeedDetail::from_feed(feed, Some(id)))
    }
}
