//! Placeholder provider: returns a placehold.co image URL without calling
//! out. Local development fallback when no worker API is running.

use reqwest::Url;

use crate::bus::event::ContentKind;
use crate::compose::{ComposeError, ComposeRequest, ComposeResult};

const BASE_URL: &str = "https://placehold.co/800x450";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const VIDEO_MODEL: &str = "veo-3-fast";

#[derive(Debug, Clone)]
pub struct PlaceholderProvider;

impl PlaceholderProvider {
    pub async fn compose(&self, request: &ComposeRequest) -> Result<ComposeResult, ComposeError> {
        let model = match request.kind {
            ContentKind::Image => IMAGE_MODEL,
            ContentKind::Video | ContentKind::Comic => VIDEO_MODEL,
        };
        let url = Url::parse_with_params(BASE_URL, &[("text", request.kind.as_str())])
            .map_err(|e| ComposeError::Malformed(format!("placeholder url: {e}")))?;

        Ok(ComposeResult {
            url: url.into(),
            model: model.to_string(),
            asset_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: ContentKind) -> ComposeRequest {
        ComposeRequest {
            child_id: "c2".into(),
            kind,
            prompt: "sticker".into(),
        }
    }

    #[tokio::test]
    async fn image_uses_image_model() {
        let r = PlaceholderProvider.compose(&request(ContentKind::Image)).await.unwrap();
        assert_eq!(r.model, IMAGE_MODEL);
        assert_eq!(r.url, "https://placehold.co/800x450?text=image");
        assert!(r.asset_id.is_none());
    }

    #[tokio::test]
    async fn video_uses_video_model() {
        let r = PlaceholderProvider.compose(&request(ContentKind::Video)).await.unwrap();
        assert_eq!(r.model, VIDEO_MODEL);
        assert!(r.url.ends_with("text=video"));
    }
}
