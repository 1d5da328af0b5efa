use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use hn_headline_feed::config::{Config, DAY};
use hn_headline_feed::http::HttpClient;
use hn_headline_feed::pipeline::payload;
use hn_headline_feed::publish::{publish, render_preview};
use hn_headline_feed::AggregationPipeline;

#[derive(Parser, Debug)]
#[command(version, about = "Publish Hacker News best stories with generated artwork")]
struct Cli {
    /// Directory holding the caches and the placeholder image
    #[arg(long, env = "HN_FEED_ROOT", default_value = ".")]
    root: PathBuf,

    /// Number of stories to publish
    #[arg(short = 'n', long, default_value_t = 5)]
    limit: usize,

    /// Refetch the feed and stories even when cached
    #[arg(long)]
    update: bool,

    /// Print an HTML preview instead of posting to the webhook
    #[arg(long)]
    preview: bool,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    #[arg(long, env = "TRMNL_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Public URL the root directory is served under
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost/")]
    public_base_url: String,

    #[arg(long, default_value_t = 30)]
    max_image_age_days: u32,

    /// Image prompt; `{title}` is replaced with the story title
    #[arg(long)]
    prompt_template: Option<String>,

    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config {
            root: self.root,
            http_timeout: Duration::from_secs(self.timeout_secs),
            story_limit: self.limit,
            webhook_url: self.webhook_url,
            ..Config::default()
        };
        config.feed.force_refresh = self.update;
        config.image.api_key = self.api_key;
        config.image.max_age = DAY * self.max_image_age_days;
        config.pipeline.public_base_url = self.public_base_url;
        if let Some(template) = self.prompt_template {
            config.pipeline.prompt_template = template;
        }
        config
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so the preview on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let preview = cli.preview;
    let config = cli.into_config();

    if !preview && config.webhook_url.is_none() {
        return Err(anyhow!("no webhook URL configured; pass --webhook-url or --preview"));
    }
    if config.image.api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY is not set; image generation will fail");
    }

    let client = Arc::new(HttpClient::new(config.http_timeout).context("Failed to create HTTP client")?);
    let pipeline = AggregationPipeline::from_config(&config, client.clone())
        .with_context(|| format!("Failed to open caches under {}", config.root.display()))?;

    let stories = pipeline.run(config.story_limit);

    if preview {
        print!("{}", render_preview(&stories));
        return Ok(());
    }

    if let Some(webhook_url) = &config.webhook_url {
        let payload = payload(stories);
        if let Err(e) = publish(client.as_ref(), webhook_url, &payload) {
            tracing::error!(error = %e, "webhook error");
        }
    }

    Ok(())
}
