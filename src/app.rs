//! Composition root: wires the transport, frame decoder, buffers,
//! accumulator and uploader into one event-driven pipeline.
//!
//! This module is intentionally decoupled from CLI parsing and process exit
//! codes so it can be tested deterministically with an injected transport
//! and uploader.

use crate::accumulator::{Accumulator, BATCH_THRESHOLD, Batch};
use crate::chart::ChartBuffer;
use crate::frame;
use crate::sample::Sample;
use crate::session::Session;
use crate::state::{ConnectionEvent, ConnectionState, DisconnectCause, StateError, transition};
use crate::transport::{
    DEFAULT_DEVICE_NAME, DEFAULT_SCAN_SECONDS, DiscoveredDevice, Transport, TransportError,
    TransportEvent, UART_SERVICE_UUID, UART_TX_CHARACTERISTIC_UUID,
};
use crate::uploader::Uploader;
use chrono::Local;
use clap::Parser;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Configuration for the ingestion pipeline.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Endpoint receiving flushed sample batches as JSON.
    #[arg(long, default_value = "http://localhost:3000/receive/arrs")]
    pub endpoint: String,

    /// Identifier of the monitored subject, attached to every session.
    #[arg(long)]
    pub subject_id: String,

    /// Name token the advertised device name must contain.
    #[arg(long, default_value = DEFAULT_DEVICE_NAME)]
    pub device_name: String,

    /// How long to scan for peripherals before picking a candidate.
    #[arg(long, default_value_t = DEFAULT_SCAN_SECONDS)]
    pub scan_seconds: u64,

    /// Report repeated advertisements of already-discovered peripherals.
    #[arg(long)]
    pub allow_duplicates: bool,

    /// Samples accumulated before a batch is flushed to the endpoint.
    #[arg(long, default_value_t = BATCH_THRESHOLD)]
    pub batch_size: usize,

    /// Verbose output, log per-frame decode and dispatch details
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Errors returned by the pipeline.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("no peripheral matching '{0}' found")]
    NoDeviceFound(String),
}

/// Counters reported after a run, for the binary and for tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub batches_uploaded: usize,
    pub batches_dropped: usize,
    pub samples_dropped: usize,
}

/// The telemetry ingestion pipeline.
///
/// Owns the connection state machine and both buffers; borrows the
/// transport and uploader seams. All mutation happens on the event-loop
/// task driving [`Pipeline::handle_event`], so the append-check-flush
/// sequence is never interleaved with another collect.
pub struct Pipeline<'a> {
    options: Options,
    transport: &'a dyn Transport,
    uploader: &'a dyn Uploader,
    state: ConnectionState,
    chart: ChartBuffer,
    accumulator: Accumulator,
    candidates: Vec<DiscoveredDevice>,
    summary: RunSummary,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: Options, transport: &'a dyn Transport, uploader: &'a dyn Uploader) -> Self {
        let accumulator = Accumulator::with_threshold(options.batch_size);
        Pipeline {
            options,
            transport,
            uploader,
            state: ConnectionState::Idle,
            chart: ChartBuffer::new(),
            accumulator,
            candidates: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Session metadata of the current connection, if any. Read-only query
    /// for external collaborators (e.g. a screen deciding whether to offer
    /// "start monitoring").
    pub fn session(&self) -> Option<&Session> {
        self.state.session()
    }

    pub fn is_connected(&self) -> bool {
        self.session().is_some()
    }

    /// False while connected but not receiving data (degraded condition
    /// after a failed notification subscription).
    pub fn is_receiving(&self) -> bool {
        matches!(self.state, ConnectionState::Subscribed { .. })
    }

    /// Current chart contents, oldest first. Owned copy; consumers must
    /// never mutate the buffer and cannot through this.
    pub fn chart_values(&self) -> Vec<f64> {
        self.chart.values()
    }

    /// Peripherals that passed the name filter during the last scan.
    pub fn candidates(&self) -> &[DiscoveredDevice] {
        &self.candidates
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Kick off a scan window. Discovery results arrive as events.
    pub async fn start_scan(&mut self) -> Result<(), RunError> {
        self.state = transition(&self.state, ConnectionEvent::ScanStarted)?;
        self.candidates.clear();
        self.transport
            .scan(
                Duration::from_secs(self.options.scan_seconds),
                self.options.allow_duplicates,
            )
            .await?;
        Ok(())
    }

    /// Connect to a discovered peripheral and begin a monitoring session.
    ///
    /// On success the notification subscription follows automatically; a
    /// subscription failure leaves the connection up but degraded, it does
    /// not roll back.
    pub async fn connect(&mut self, device: &DiscoveredDevice) -> Result<(), RunError> {
        self.state = transition(
            &self.state,
            ConnectionEvent::ConnectRequested {
                device_id: device.id.clone(),
            },
        )?;

        if let Err(err) = self.transport.connect(&device.id).await {
            log::warn!("connect to {} ({}) failed: {err}", device.name, device.id);
            self.state = transition(&self.state, ConnectionEvent::ConnectFailed)?;
            return Err(err.into());
        }

        let session = Session::begin(
            device.id.clone(),
            self.options.subject_id.clone(),
            Local::now(),
        );
        log::info!(
            "connected to {} ({}), session {}/{}",
            device.name,
            device.id,
            session.start_date,
            session.start_time
        );
        self.state = transition(&self.state, ConnectionEvent::Connected { session })?;

        match self
            .transport
            .subscribe(&device.id, UART_SERVICE_UUID, UART_TX_CHARACTERISTIC_UUID)
            .await
        {
            Ok(()) => {
                self.state = transition(&self.state, ConnectionEvent::SubscribeSucceeded)?;
            }
            Err(err) => {
                log::warn!("subscription failed, connected but not receiving data: {err}");
                self.state = transition(&self.state, ConnectionEvent::SubscribeFailed)?;
            }
        }
        Ok(())
    }

    /// Request a disconnect. Safe to call in any state; the resulting
    /// `Disconnected` event clears the session, the same as an unsolicited
    /// drop.
    pub async fn disconnect(&mut self) -> Result<(), RunError> {
        if let Some(session) = self.state.session() {
            let device_id = session.device_id.clone();
            self.transport.disconnect(&device_id).await?;
        }
        Ok(())
    }

    /// Dispatch one transport event.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::DeviceDiscovered(device) => {
                if !self.candidates.iter().any(|d| d.id == device.id) {
                    log::info!("candidate {} ({})", device.name, device.id);
                    self.candidates.push(device);
                }
            }
            TransportEvent::ScanStopped => {
                if let Ok(next) = transition(&self.state, ConnectionEvent::ScanStopped) {
                    self.state = next;
                }
                log::debug!("scan stopped, {} candidate(s)", self.candidates.len());
            }
            TransportEvent::Notification {
                characteristic,
                value,
            } => {
                self.handle_notification(characteristic, &value).await;
            }
            TransportEvent::Disconnected { device_id, cause } => {
                match cause {
                    DisconnectCause::Requested => log::info!("disconnected from {device_id}"),
                    DisconnectCause::Unexpected => {
                        log::warn!("connection to {device_id} dropped unexpectedly");
                    }
                }
                self.drop_partial();
                if let Ok(next) = transition(&self.state, ConnectionEvent::Disconnected { cause }) {
                    self.state = next;
                }
            }
        }
    }

    /// The per-notification decode-and-dispatch path. Must never panic:
    /// malformed frames degrade or are skipped, and a skipped frame touches
    /// neither buffer.
    async fn handle_notification(&mut self, characteristic: Uuid, value: &[u8]) {
        if characteristic != UART_TX_CHARACTERISTIC_UUID {
            return;
        }
        if self.state.session().is_none() {
            // Late event from a torn-down connection; nothing to attribute
            // it to.
            log::debug!("notification with no active session, dropped");
            return;
        }

        let Some(sample) = frame::decode(value) else {
            log::debug!("unparseable frame, skipped");
            return;
        };

        // The chart gets its own scalar; the accumulator owns the sample.
        self.chart.push(sample.ir as f64);
        if let Some(samples) = self.accumulator.collect(sample) {
            self.flush(samples).await;
        }
    }

    /// Hand a flush snapshot to the uploader, tagged with the active
    /// session. Fail-safe: with no session the batch is dropped with a
    /// warning, never uploaded unattributed and never raised as an error
    /// into the notification path.
    async fn flush(&mut self, samples: Vec<Sample>) {
        let Some(session) = self.state.session() else {
            log::warn!(
                "flush of {} samples with no active session, batch dropped",
                samples.len()
            );
            self.summary.batches_dropped += 1;
            self.summary.samples_dropped += samples.len();
            return;
        };

        let batch = Batch {
            session: session.clone(),
            samples,
        };
        match self.uploader.upload(&batch).await {
            Ok(()) => {
                log::info!("uploaded batch of {} samples", batch.samples.len());
                self.summary.batches_uploaded += 1;
            }
            Err(err) => {
                // Deliberately no retry loop: a transient failure loses the
                // batch, and that risk is accepted.
                log::warn!(
                    "upload failed, batch of {} samples lost: {err}",
                    batch.samples.len()
                );
                self.summary.batches_dropped += 1;
                self.summary.samples_dropped += batch.samples.len();
            }
        }
    }

    fn drop_partial(&mut self) {
        let dropped = self.accumulator.discard();
        if dropped > 0 {
            log::warn!("discarding {dropped} samples accumulated below the batch threshold");
            self.summary.samples_dropped += dropped;
        }
    }
}

/// Run the pipeline end to end: scan, connect to the first matching
/// candidate, stream notifications through the decode-and-dispatch path,
/// and stop when the connection ends or the transport goes away.
pub async fn run(
    options: Options,
    transport: &dyn Transport,
    mut events: mpsc::Receiver<TransportEvent>,
    uploader: &dyn Uploader,
) -> Result<RunSummary, RunError> {
    let device_name = options.device_name.clone();
    let mut pipeline = Pipeline::new(options, transport, uploader);

    pipeline.start_scan().await?;

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::ScanStopped => {
                pipeline.handle_event(TransportEvent::ScanStopped).await;
                if pipeline.is_connected() {
                    continue;
                }
                let Some(device) = pipeline.candidates().first().cloned() else {
                    return Err(RunError::NoDeviceFound(device_name));
                };
                pipeline.connect(&device).await?;
            }
            TransportEvent::Disconnected { .. } => {
                pipeline.handle_event(event).await;
                break;
            }
            other => pipeline.handle_event(other).await,
        }
    }

    Ok(pipeline.summary)
}
