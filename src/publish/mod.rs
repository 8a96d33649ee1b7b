//! Publishing build exports to sharing sites

mod http;
mod sites;

pub use http::HttpPublisher;
pub use sites::BuildSite;

use std::future::Future;
use thiserror::Error;

/// Errors that can occur while publishing an export
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("No upload endpoint for site {0}")]
    Unsupported(String),

    #[error("Upload to {site} failed with status {status}: {body}")]
    Rejected {
        site: String,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Uploads build exports and returns their public reference
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        export: &str,
        site: &BuildSite,
    ) -> impl Future<Output = Result<String, PublishError>> + Send;
}
