use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode};

use crate::{
    error::{AppError, AppResult},
    models::Availability,
    services::providers::StatusProbe,
};

pub const DEFAULT_OEMBED_URL: &str = "https://www.youtube.com/oembed";

/// Checks liveness through YouTube's oEmbed endpoint
///
/// oEmbed answers 2xx for playable videos and 4xx for removed, private or
/// embedding-disabled ones, without needing an API key.
#[derive(Clone)]
pub struct YoutubeStatusProbe {
    http_client: HttpClient,
    api_url: String,
}

impl YoutubeStatusProbe {
    pub fn new(api_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url,
        })
    }

    fn watch_url(id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", id)
    }
}

/// Maps an oEmbed status code to liveness; `None` means the answer says nothing
fn classify_status(status: StatusCode) -> Option<Availability> {
    if status.is_success() {
        return Some(Availability::Up);
    }
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND => Some(Availability::Down),
        _ => None,
    }
}

#[async_trait::async_trait]
impl StatusProbe for YoutubeStatusProbe {
    async fn probe(&self, id: &str) -> AppResult<Availability> {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[("url", Self::watch_url(id).as_str()), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(video_id = %id, status = %status, "oEmbed probe answered");

        classify_status(status).ok_or_else(|| {
            AppError::ExternalApi(format!("oEmbed returned status {} for {}", status, id))
        })
    }

    fn name(&self) -> &'static str {
        "youtube_oembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        assert_eq!(classify_status(StatusCode::OK), Some(Availability::Up));
    }

    #[test]
    fn test_classify_removed_or_private() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
        ] {
            assert_eq!(classify_status(status), Some(Availability::Down));
        }
    }

    #[test]
    fn test_classify_server_errors_are_inconclusive() {
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR), None);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), None);
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(
            YoutubeStatusProbe::watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
