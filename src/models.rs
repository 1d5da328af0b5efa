use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a Hacker News item.
///
/// The same id addresses the story JSON cache and the image asset cache, so
/// both keys are derived here rather than built ad hoc by each cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(pub u64);

impl StoryId {
    pub fn story_key(self) -> CacheKey {
        CacheKey::new(format!("{}.json", self.0))
    }

    pub fn image_key(self) -> CacheKey {
        CacheKey::new(format!("{}.{}", self.0, IMAGE_EXTENSION))
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const IMAGE_EXTENSION: &str = "jpg";

/// Name of a single entry inside a [`crate::store::Store`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn top_stories() -> Self {
        Self::new("beststories.json")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A story as returned by the item endpoint. Fields we don't use are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoryRecord {
    pub title: String,
    pub time: i64,
    pub score: i64,
    #[serde(default)]
    pub url: Option<String>,
}

/// Outcome of asking the generator for a story's image. Paths are relative
/// to the public base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Already on disk from an earlier run
    Cached(String),
    /// Written during this call
    Generated(String),
    /// The API answered without image data; the shared default asset
    Placeholder(String),
}

impl ImageRef {
    pub fn path(&self) -> &str {
        match self {
            ImageRef::Cached(path) | ImageRef::Generated(path) | ImageRef::Placeholder(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedStory {
    #[serde(rename = "storyId")]
    pub id: StoryId,
    #[serde(rename = "storyTitle")]
    pub title: String,
    #[serde(rename = "storyUrl")]
    pub canonical_url: String,
    // None when generation failed outright for this story
    #[serde(rename = "storyImage")]
    pub image_url: Option<String>,
    #[serde(rename = "storyTimestamp")]
    pub display_timestamp: String,
    #[serde(rename = "storyScore")]
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetadata {
    pub total_count: usize,
    pub last_updated: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPayload {
    pub stories: Vec<NormalizedStory>,
    pub metadata: FeedMetadata,
}

/// Body of the webhook POST; the consumer reads `merge_variables`.
#[derive(Debug, Serialize)]
pub struct WebhookEnvelope<'a> {
    pub merge_variables: &'a FeedPayload,
}
