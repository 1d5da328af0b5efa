use tracing::{info, warn};

use crate::error::Result;
use crate::http::{HttpResponse, Transport};
use crate::models::{FeedPayload, NormalizedStory, WebhookEnvelope};

/// Minimal HTML page for eyeballing a run locally.
pub fn render_preview(stories: &[NormalizedStory]) -> String {
    let mut html = String::new();
    for story in stories {
        if let Some(image_url) = &story.image_url {
            html.push_str(&format!(
                "<img src='{}' style='max-width:300px; margin: 10px; display:block;'>\n",
                image_url
            ));
        }
        // Title is already escaped
        html.push_str(&format!("<h3>{}</h3>\n<hr>\n", story.title));
    }
    html
}

/// POST the payload to the webhook as `{"merge_variables": …}`.
pub fn publish(transport: &dyn Transport, webhook_url: &str, payload: &FeedPayload) -> Result<HttpResponse> {
    let body = serde_json::to_value(WebhookEnvelope {
        merge_variables: payload,
    })?;

    let response = transport.post_json(webhook_url, &[], &body)?;
    if response.is_success() {
        info!(status = response.status, body = %response.body, "webhook accepted payload");
    } else {
        warn!(status = response.status, body = %response.body, "webhook rejected payload");
    }
    Ok(response)
}
