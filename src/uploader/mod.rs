//! Batch upload seam.
//!
//! The pipeline produces correctly-shaped, correctly-ordered batches and
//! hands each off exactly once per threshold crossing. Delivery is
//! fire-and-forget: a failed upload is logged and the batch is lost.
//! At-least-once delivery would need an outbox layered on top of this.

pub mod http;

use crate::accumulator::Batch;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server responded with status {0}")]
    Status(u16),
}

pub type UploadFuture<'a> = Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send + 'a>>;

/// Consumer of flushed batches.
pub trait Uploader: Send + Sync {
    fn upload<'a>(&'a self, batch: &'a Batch) -> UploadFuture<'a>;
}
