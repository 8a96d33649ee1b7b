use crate::config::UserAgentConfig;
use crate::publish::{BuildSite, PublishError, Publisher};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::instrument;

/// Publisher posting exports over HTTP
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: Client,
}

impl HttpPublisher {
    pub fn new(user_agent: &UserAgentConfig) -> Result<Self, PublishError> {
        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Publisher for HttpPublisher {
    #[instrument(name = "publisher", skip_all, fields(site = site.label))]
    async fn publish(&self, export: &str, site: &BuildSite) -> Result<String, PublishError> {
        let post_url = match site.post_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => return Err(PublishError::Unsupported(site.label.to_string())),
        };

        let response = self
            .client
            .post(post_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(site.post_body(export))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(PublishError::Rejected {
                site: site.label.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let reference = site.reference(&body);
        tracing::debug!("Uploaded build: {}", reference);
        Ok(reference)
    }
}
