use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cache::CacheStore;
use crate::config::{Config, PipelineConfig};
use crate::error::Result;
use crate::feed::FeedClient;
use crate::generator::ImageGenerator;
use crate::http::Transport;
use crate::images::ImageAssetCache;
use crate::models::{FeedMetadata, FeedPayload, ImageRef, NormalizedStory, StoryId, StoryRecord};
use crate::store::FsStore;

pub const PAYLOAD_VERSION: &str = "1.0";

/// Fetches the top stories, attaches an image to each and normalizes them
/// for the webhook consumer. Stories are processed one at a time in rank
/// order.
pub struct AggregationPipeline {
    feed: FeedClient,
    images: ImageGenerator,
    config: PipelineConfig,
}

impl AggregationPipeline {
    pub fn new(feed: FeedClient, images: ImageGenerator, config: PipelineConfig) -> Self {
        Self {
            feed,
            images,
            config,
        }
    }

    /// Wire up filesystem-backed caches under `config.root`.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let json_store = Arc::new(FsStore::open(config.json_cache_path())?);
        let asset_store = Arc::new(FsStore::open(config.asset_path())?);

        let feed = FeedClient::new(
            CacheStore::new(json_store, transport.clone()),
            config.feed.clone(),
        );
        let assets = ImageAssetCache::new(asset_store, &config.image);
        let images = ImageGenerator::new(transport, assets, config.image.clone());

        Ok(Self::new(feed, images, config.pipeline.clone()))
    }

    /// Normalized stories in feed order. Stories that can't be fetched are
    /// skipped; if the id list itself is unavailable the result is empty.
    pub fn run(&self, limit: usize) -> Vec<NormalizedStory> {
        let ids = match self.feed.list_top_story_ids(limit) {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "failed to fetch top stories");
                return Vec::new();
            }
        };

        let mut stories = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(story) = self.feed.get_story(id) else {
                warn!(%id, "story unavailable, skipping");
                continue;
            };

            let prompt = self.prompt_for(&story);
            let image = match self.images.generate(&prompt, id) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(%id, error = %e, "image generation failed, story has no image");
                    None
                }
            };

            stories.push(self.normalize(id, &story, image.as_ref()));
        }

        info!(count = stories.len(), "aggregated stories");
        stories
    }

    pub fn prompt_for(&self, story: &StoryRecord) -> String {
        self.config
            .prompt_template
            .replace("{title}", &escape(&story.title))
    }

    pub fn normalize(&self, id: StoryId, story: &StoryRecord, image: Option<&ImageRef>) -> NormalizedStory {
        let canonical_url = match &story.url {
            Some(url) => escape(url),
            None => format!("{}{}", self.config.item_link_base, id),
        };

        NormalizedStory {
            id,
            title: escape(&story.title),
            canonical_url,
            image_url: image.map(|image| self.public_url(image.path())),
            display_timestamp: display_date(story.time),
            score: story.score,
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Wrap stories in the metadata envelope the consumer expects.
pub fn payload(stories: Vec<NormalizedStory>) -> FeedPayload {
    FeedPayload {
        metadata: FeedMetadata {
            total_count: stories.len(),
            last_updated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            version: PAYLOAD_VERSION.to_string(),
        },
        stories,
    }
}

fn escape(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).into_owned()
}

// e.g. "Jan 5, 2024"
fn display_date(unix_time: i64) -> String {
    DateTime::from_timestamp(unix_time, 0)
        .map(|time| time.format("%b %-d, %Y").to_string())
        .unwrap_or_default()
}
