use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ImageConfig;
use crate::error::Result;
use crate::http::Transport;
use crate::images::ImageAssetCache;
use crate::models::{ImageRef, StoryId};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    image_config: AspectRatio<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AspectRatio<'a> {
    aspect_ratio: &'a str,
}

// Only the path to the inline image is modelled; everything else is ignored
#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].inlineData.data`, if non-empty
    fn into_image_data(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .inline_data?
            .data
            .filter(|data| !data.is_empty())
    }
}

/// Turns a prompt into a stored image for a story.
pub struct ImageGenerator {
    transport: Arc<dyn Transport>,
    assets: ImageAssetCache,
    config: ImageConfig,
}

impl ImageGenerator {
    pub fn new(transport: Arc<dyn Transport>, assets: ImageAssetCache, config: ImageConfig) -> Self {
        Self {
            transport,
            assets,
            config,
        }
    }

    pub fn assets(&self) -> &ImageAssetCache {
        &self.assets
    }

    /// Image for `id`, generating it from `prompt` on a cache miss.
    ///
    /// A response without image data yields the placeholder. Transport
    /// failures and undecodable payloads are errors and leave nothing on disk.
    pub fn generate(&self, prompt: &str, id: StoryId) -> Result<ImageRef> {
        // Sweep first so the lookup below sees the post-eviction state
        if let Err(e) = self.assets.evict_older_than(self.config.max_age) {
            warn!(error = %e, "image eviction failed");
        }

        if self.assets.contains(id) {
            debug!(%id, "image cache hit");
            return Ok(ImageRef::Cached(self.assets.path_for(id)));
        }

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                image_config: AspectRatio {
                    aspect_ratio: &self.config.aspect_ratio,
                },
            },
        };
        let body = serde_json::to_value(&request)?;

        let url = format!(
            "{}?key={}",
            self.config.endpoint,
            urlencoding::encode(&self.config.api_key)
        );
        let headers = [("x-goog-api-key", self.config.api_key.as_str())];

        info!(%id, "generating image");
        let response = self.transport.post_json(&url, &headers, &body)?;
        if !response.is_success() {
            warn!(%id, status = response.status, "image API returned an error status");
        }

        // A body we can't parse carries no image either
        let parsed: GenerateResponse = serde_json::from_str(&response.body).unwrap_or_default();
        let Some(data) = parsed.into_image_data() else {
            info!(%id, "no image data in response, using placeholder");
            return Ok(self.assets.placeholder());
        };

        let bytes = STANDARD.decode(data.as_bytes())?;
        let path = self.assets.save(id, &bytes)?;
        Ok(ImageRef::Generated(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DAY;
    use crate::error::Error;
    use crate::http::fake::FakeTransport;
    use crate::http::HttpResponse;
    use crate::store::fake::FailingStore;
    use crate::store::{MemoryStore, Store};
    use std::time::Duration;

    const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent?key=secret%20key";

    fn generator() -> (Arc<MemoryStore>, Arc<FakeTransport>, ImageGenerator) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(FakeTransport::new());
        let config = ImageConfig {
            api_key: "secret key".to_string(),
            ..ImageConfig::default()
        };
        let assets = ImageAssetCache::new(store.clone(), &config);
        let generator = ImageGenerator::new(transport.clone(), assets, config);
        (store, transport, generator)
    }

    fn image_response(data: &str) -> HttpResponse {
        HttpResponse::ok(format!(
            r#"{{"candidates":[{{"content":{{"parts":[{{"inlineData":{{"mimeType":"image/jpeg","data":"{}"}}}}]}}}}]}}"#,
            data
        ))
    }

    #[test]
    fn generates_once_then_serves_from_cache() {
        let (store, transport, generator) = generator();
        transport.respond(ENDPOINT, image_response(&STANDARD.encode(b"jpeg bytes")));

        let first = generator.generate("a prompt", StoryId(7)).unwrap();
        let second = generator.generate("a prompt", StoryId(7)).unwrap();

        assert_eq!(first, ImageRef::Generated("headline_images_nano_banana/7.jpg".to_string()));
        assert_eq!(second, ImageRef::Cached("headline_images_nano_banana/7.jpg".to_string()));
        assert_eq!(first.path(), second.path());
        assert_eq!(transport.call_count(ENDPOINT), 1);
        assert_eq!(store.get(&StoryId(7).image_key()).unwrap().unwrap(), b"jpeg bytes");
    }

    #[test]
    fn request_carries_prompt_aspect_ratio_and_key() {
        let (_, transport, generator) = generator();
        transport.respond(ENDPOINT, image_response(&STANDARD.encode(b"x")));

        generator.generate("lighthouse at dusk", StoryId(1)).unwrap();

        let posted = transport.posted();
        let (headers, body) = &posted[0];
        assert_eq!(body["contents"][0]["parts"][0]["text"], "lighthouse at dusk");
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "4:3");
        assert_eq!(headers[0], ("x-goog-api-key".to_string(), "secret key".to_string()));
    }

    #[test]
    fn missing_image_data_yields_placeholder_without_writing() {
        let (store, transport, generator) = generator();
        transport.respond(
            ENDPOINT,
            HttpResponse::ok(r#"{"candidates":[{"content":{"parts":[{"text":"Sorry, no."}]}}]}"#),
        );

        let image = generator.generate("prompt", StoryId(3)).unwrap();
        assert_eq!(image, ImageRef::Placeholder("default.png".to_string()));
        assert!(store.is_empty());
    }

    #[test]
    fn error_body_yields_placeholder() {
        let (store, transport, generator) = generator();
        transport.respond(
            ENDPOINT,
            HttpResponse {
                status: 429,
                body: r#"{"error":{"code":429,"message":"quota"}}"#.to_string(),
            },
        );

        let image = generator.generate("prompt", StoryId(3)).unwrap();
        assert!(matches!(image, ImageRef::Placeholder(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn transport_failure_is_an_error() {
        let (store, transport, generator) = generator();
        transport.fail_post(ENDPOINT);

        assert!(generator.generate("prompt", StoryId(4)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_base64_is_an_error_and_writes_nothing() {
        let (store, transport, generator) = generator();
        transport.respond(ENDPOINT, image_response("!!not base64!!"));

        assert!(matches!(
            generator.generate("prompt", StoryId(5)),
            Err(Error::Base64(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn stale_asset_is_evicted_and_regenerated() {
        let (store, transport, generator) = generator();
        transport.respond(ENDPOINT, image_response(&STANDARD.encode(b"v1")));
        generator.generate("prompt", StoryId(9)).unwrap();

        store.advance(DAY * 30 + Duration::from_secs(1));
        transport.respond(ENDPOINT, image_response(&STANDARD.encode(b"v2")));
        let image = generator.generate("prompt", StoryId(9)).unwrap();

        assert!(matches!(image, ImageRef::Generated(_)));
        assert_eq!(store.get(&StoryId(9).image_key()).unwrap().unwrap(), b"v2");
        assert_eq!(transport.call_count(ENDPOINT), 2);
    }

    #[test]
    fn generating_one_id_sweeps_others() {
        let (store, transport, generator) = generator();
        generator.assets().save(StoryId(1), b"old").unwrap();
        store.set_age(&StoryId(1).image_key(), DAY * 31);
        generator.assets().save(StoryId(2), b"cached").unwrap();

        let image = generator.generate("prompt", StoryId(2)).unwrap();
        assert!(matches!(image, ImageRef::Cached(_)));
        assert!(!generator.assets().contains(StoryId(1)));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn failed_sweep_still_generates() {
        let store = Arc::new(FailingStore {
            fail_keys: true,
            ..FailingStore::default()
        });
        let transport = Arc::new(FakeTransport::new());
        let config = ImageConfig {
            api_key: "secret key".to_string(),
            ..ImageConfig::default()
        };
        let assets = ImageAssetCache::new(store.clone(), &config);
        let generator = ImageGenerator::new(transport.clone(), assets, config);
        transport.respond(ENDPOINT, image_response(&STANDARD.encode(b"jpeg")));

        let first = generator.generate("prompt", StoryId(11)).unwrap();
        let second = generator.generate("prompt", StoryId(11)).unwrap();

        assert!(matches!(first, ImageRef::Generated(_)));
        assert!(matches!(second, ImageRef::Cached(_)));
        assert!(store.exists(&StoryId(11).image_key()));
        assert_eq!(transport.call_count(ENDPOINT), 1);
    }
}
