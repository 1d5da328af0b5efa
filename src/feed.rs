use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::models::{CacheKey, StoryId, StoryRecord};

/// Hacker News best-stories list and items, read through the JSON cache.
pub struct FeedClient {
    cache: CacheStore,
    config: FeedConfig,
}

impl FeedClient {
    pub fn new(cache: CacheStore, config: FeedConfig) -> Self {
        Self { cache, config }
    }

    /// Ids of the best stories in rank order, at most `limit` of them.
    pub fn list_top_story_ids(&self, limit: usize) -> Result<Vec<StoryId>> {
        let key = CacheKey::top_stories();
        let content = self
            .cache
            .fetch(&self.config.top_stories_url, &key, self.config.force_refresh)
            .ok_or_else(|| Error::Unavailable(self.config.top_stories_url.clone()))?;

        let mut ids: Vec<StoryId> = serde_json::from_str(&content)?;
        ids.truncate(limit);
        debug!(count = ids.len(), "top story ids");
        Ok(ids)
    }

    pub fn get_story(&self, id: StoryId) -> Option<StoryRecord> {
        let url = format!("{}{}.json", self.config.story_base_url, id);
        let content = self
            .cache
            .fetch(&url, &id.story_key(), self.config.force_refresh)?;

        match serde_json::from_str(&content) {
            Ok(story) => Some(story),
            Err(e) => {
                warn!(%id, error = %e, "skipping story that failed to decode");
                None
            }
        }
    }
}
