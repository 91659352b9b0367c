//! HTTP uploader posting batches as JSON.

use super::{UploadError, UploadFuture, Uploader};
use crate::accumulator::Batch;

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Transport(err.to_string())
    }
}

/// Posts each batch to a single backend endpoint.
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpUploader {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Uploader for HttpUploader {
    fn upload<'a>(&'a self, batch: &'a Batch) -> UploadFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.endpoint)
                .json(batch)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(UploadError::Status(status.as_u16()));
            }
            Ok(())
        })
    }
}
