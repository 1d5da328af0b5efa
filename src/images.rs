use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::error::Result;
use crate::models::{ImageRef, StoryId, IMAGE_EXTENSION};
use crate::store::Store;

/// Generated images, one per story id. A stored image is reused until the
/// age-based sweep removes it.
pub struct ImageAssetCache {
    store: Arc<dyn Store>,
    asset_dir: String,
    placeholder: String,
}

impl ImageAssetCache {
    pub fn new(store: Arc<dyn Store>, config: &ImageConfig) -> Self {
        Self {
            store,
            asset_dir: config.asset_dir.trim_end_matches('/').to_string(),
            placeholder: config.placeholder.clone(),
        }
    }

    // Public path, whether or not the asset exists yet
    pub fn path_for(&self, id: StoryId) -> String {
        format!("{}/{}", self.asset_dir, id.image_key())
    }

    pub fn contains(&self, id: StoryId) -> bool {
        self.store.exists(&id.image_key())
    }

    pub fn save(&self, id: StoryId, bytes: &[u8]) -> Result<String> {
        self.store.put(&id.image_key(), bytes)?;
        debug!(%id, path = %self.store.locate(&id.image_key()).display(), "saved image");
        Ok(self.path_for(id))
    }

    pub fn placeholder(&self) -> ImageRef {
        ImageRef::Placeholder(self.placeholder.clone())
    }

    /// Delete every asset whose age is strictly greater than `max_age`.
    /// Returns how many were removed.
    pub fn evict_older_than(&self, max_age: Duration) -> Result<usize> {
        let suffix = format!(".{}", IMAGE_EXTENSION);
        let mut evicted = 0;

        for key in self.store.keys()? {
            if !key.as_str().ends_with(&suffix) {
                continue;
            }
            match self.store.age(&key)? {
                Some(age) if age > max_age => {
                    self.store.delete(&key)?;
                    evicted += 1;
                }
                _ => {}
            }
        }

        if evicted > 0 {
            info!(evicted, "evicted old images");
        }
        Ok(evicted)
    }
}
