//! `zephy-monitor` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logger setup and
//! process exit codes. The core telemetry pipeline lives in [`crate::app`]
//! where it can be tested deterministically with an injected transport and
//! an injected uploader.

pub mod accumulator;
pub mod app;
pub mod chart;
pub mod frame;
pub mod sample;
pub mod session;
pub mod state;
pub mod transport;
pub mod uploader;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the crate root
pub use accumulator::{Accumulator, BATCH_THRESHOLD, Batch};
pub use app::{Options, Pipeline, RunError, RunSummary, run};
pub use chart::{CHART_CAPACITY, CHART_MIN_INTERVAL, ChartBuffer};
pub use frame::decode;
pub use sample::Sample;
pub use session::Session;
pub use state::{ConnectionEvent, ConnectionState, DisconnectCause, StateError, transition};
pub use transport::{DiscoveredDevice, Transport, TransportError, TransportEvent};
pub use uploader::http::HttpUploader;
pub use uploader::{UploadError, Uploader};
