use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ReadwiseError;
use crate::model::NormalizedHighlight;

pub const DEFAULT_BASE_URL: &str = "https://readwise.io/api/v2";

#[derive(Debug, Serialize)]
struct CreateHighlights<'a> {
    highlights: &'a [NormalizedHighlight],
}

pub struct ReadwiseClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    error_log_dir: PathBuf,
}

impl ReadwiseClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            error_log_dir: PathBuf::from("."),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Directory that receives the response body of a rejected upload.
    pub fn with_error_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.error_log_dir = dir.into();
        self
    }

    pub fn highlights_url(&self) -> String {
        format!("{}/highlights/", self.base_url)
    }

    /// Posts the whole batch in one request. Any non-success status is fatal
    /// for the run; nothing is retried here.
    pub async fn create_highlights(
        &self,
        highlights: &[NormalizedHighlight],
    ) -> Result<(), ReadwiseError> {
        if highlights.is_empty() {
            tracing::info!("no highlights to upload, skipping Readwise request");
            return Ok(());
        }

        let response = self
            .http
            .post(self.highlights_url())
            .header("Authorization", format!("Token {}", self.token))
            .json(&CreateHighlights { highlights })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(count = highlights.len(), "uploaded highlights to Readwise");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let error_log = self.error_log_dir.join(format!(
            "error_log_{}_failed_post_request_to_readwise.json",
            status.as_u16()
        ));
        fs::create_dir_all(&self.error_log_dir)?;
        fs::write(&error_log, body)?;

        Err(ReadwiseError::Upload {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            error_log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, LocationType};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn highlight(text: &str) -> NormalizedHighlight {
        NormalizedHighlight {
            text: text.to_string(),
            title: Some("Thinking in Systems".to_string()),
            author: None,
            note: Some(".systems".to_string()),
            category: Some(Category::Books),
            location: Some(-4),
            location_type: LocationType::Page,
            highlighted_at: None,
            source_url: None,
            highlight_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_highlights_posts_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/highlights/"))
            .and(header("authorization", "Token rw-token"))
            .and(body_json(json!({
                "highlights": [{
                    "text": "stocks and flows",
                    "title": "Thinking in Systems",
                    "note": ".systems",
                    "category": "books",
                    "location": -4,
                    "location_type": "page",
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReadwiseClient::new("rw-token").with_base_url(&server.uri());
        client
            .create_highlights(&[highlight("stocks and flows")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ReadwiseClient::new("rw-token").with_base_url(&server.uri());
        client.create_highlights(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_upload_writes_error_log() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/highlights/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"highlights": ["invalid"]})),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = ReadwiseClient::new("rw-token")
            .with_base_url(&server.uri())
            .with_error_log_dir(dir.path());

        let err = client
            .create_highlights(&[highlight("x")])
            .await
            .unwrap_err();

        match err {
            ReadwiseError::Upload {
                status,
                reason,
                error_log,
            } => {
                assert_eq!(status, 400);
                assert_eq!(reason, "Bad Request");
                assert_eq!(
                    error_log,
                    dir.path()
                        .join("error_log_400_failed_post_request_to_readwise.json")
                );
                let logged = fs::read_to_string(error_log).unwrap();
                assert!(logged.contains("invalid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
