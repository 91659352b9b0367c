//! Sample accumulation and threshold batching.
//!
//! Batching amortizes network round-trips: sending each sample individually
//! would saturate the radio and the backend. The threshold is a tunable
//! constant, not part of the interface contract.

use crate::sample::Sample;
use crate::session::Session;
use serde::Serialize;

/// Default number of samples per upload batch.
pub const BATCH_THRESHOLD: usize = 500;

/// A flushed, immutable snapshot of accumulated samples plus the session
/// that framed them. Owned by the uploader once handed off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub session: Session,
    pub samples: Vec<Sample>,
}

/// Ordered working list of decoded samples, flushed at a size threshold.
#[derive(Debug)]
pub struct Accumulator {
    threshold: usize,
    working: Vec<Sample>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::with_threshold(BATCH_THRESHOLD)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Accumulator {
            threshold: threshold.max(1),
            working: Vec::new(),
        }
    }

    /// Append a sample in arrival order. When the working list reaches the
    /// threshold, the whole list is taken and returned as a flush snapshot
    /// and a fresh accumulation starts.
    ///
    /// Append, check and take happen in one synchronous block with no
    /// suspension point, so interleaved `collect` calls can never observe a
    /// half-flushed list, lose a sample, or double-flush.
    pub fn collect(&mut self, sample: Sample) -> Option<Vec<Sample>> {
        self.working.push(sample);
        if self.working.len() >= self.threshold {
            Some(std::mem::take(&mut self.working))
        } else {
            None
        }
    }

    /// Discard any partial accumulation, returning how many samples were
    /// dropped. Used at session end: leftovers below the threshold have no
    /// session to be attributed to once the connection is gone.
    pub fn discard(&mut self) -> usize {
        let dropped = self.working.len();
        self.working.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}
