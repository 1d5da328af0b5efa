use std::path::PathBuf;
use std::time::Duration;

pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Where the feed lives and whether cached copies may be reused.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub top_stories_url: String,
    /// Item URL prefix; `{id}.json` is appended
    pub story_base_url: String,
    pub force_refresh: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            top_stories_url: "https://hacker-news.firebaseio.com/v0/beststories.json".to_string(),
            story_base_url: "https://hacker-news.firebaseio.com/v0/item/".to_string(),
            force_refresh: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub endpoint: String,
    pub api_key: String,
    pub aspect_ratio: String,
    /// Generated images older than this are deleted
    pub max_age: Duration,
    /// Directory name of the asset cache, relative to the public base
    pub asset_dir: String,
    /// Shared fallback image, relative to the public base
    pub placeholder: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent".to_string(),
            api_key: String::new(),
            aspect_ratio: "4:3".to_string(),
            max_age: DAY * 30,
            asset_dir: "headline_images_nano_banana".to_string(),
            placeholder: "default.png".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// `{title}` is replaced with the escaped story title
    pub prompt_template: String,
    /// Story link used when an item has no external URL; the id is appended
    pub item_link_base: String,
    /// Public URL the asset directory and placeholder are served under
    pub public_base_url: String,
}

pub const DEFAULT_PROMPT_TEMPLATE: &str = "{title} showcased in a gritty noir comic book splash page. High contrast chiaroscuro lighting, heavy ink lines, dramatic angle. Full bleed, edge-to-edge artwork, masterpiece.";

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            item_link_base: "https://news.ycombinator.com/item?id=".to_string(),
            public_base_url: "http://localhost/".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the JSON cache, the asset cache and the placeholder
    pub root: PathBuf,
    pub json_cache_dir: String,
    pub http_timeout: Duration,
    pub story_limit: usize,
    pub webhook_url: Option<String>,
    pub feed: FeedConfig,
    pub image: ImageConfig,
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            json_cache_dir: "cache".to_string(),
            http_timeout: Duration::from_secs(60),
            story_limit: 5,
            webhook_url: None,
            feed: FeedConfig::default(),
            image: ImageConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    pub fn json_cache_path(&self) -> PathBuf {
        self.root.join(&self.json_cache_dir)
    }

    pub fn asset_path(&self) -> PathBuf {
        self.root.join(&self.image.asset_dir)
    }
}
