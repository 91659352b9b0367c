//! Transport adapter abstraction over the platform BLE stack.
//!
//! The pipeline consumes four operations (scan, connect, disconnect,
//! subscribe) and one event stream. Concrete backends hand out the event
//! channel at construction time so the decoder and buffers can be tested by
//! feeding synthetic events without Bluetooth hardware.

#[cfg(feature = "btleplug")]
pub mod btleplug;

use crate::state::DisconnectCause;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use uuid::{Uuid, uuid};

/// UART-style service exposed by the biosensor firmware.
pub const UART_SERVICE_UUID: Uuid = uuid!("6e400001-b5a3-f393-e0a9-e50e24dcca9e");

/// TX characteristic carrying sample notifications.
pub const UART_TX_CHARACTERISTIC_UUID: Uuid = uuid!("6e400003-b5a3-f393-e0a9-e50e24dcca9e");

/// Name token the advertised local name must contain. Peripherals without
/// it never reach the pipeline.
pub const DEFAULT_DEVICE_NAME: &str = "Zephy";

/// How long to scan before picking a connection candidate.
pub const DEFAULT_SCAN_SECONDS: u64 = 7;

/// Channel buffer size for transport events.
pub const EVENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// A peripheral that passed the device-name filter during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub id: String,
    pub name: String,
}

/// Events a transport backend delivers to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A matching peripheral was discovered (already name-filtered).
    DeviceDiscovered(DiscoveredDevice),
    /// The scan window closed, by timeout or request.
    ScanStopped,
    /// Characteristic value change pushed by the peripheral.
    Notification { characteristic: Uuid, value: Vec<u8> },
    /// The link went down, solicited or not.
    Disconnected {
        device_id: String,
        cause: DisconnectCause,
    },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
}

pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Platform BLE operations the pipeline depends on.
pub trait Transport: Send + Sync {
    /// Start a scan that stops itself after `duration`. Calling while a
    /// scan is already in progress is a no-op that returns immediately.
    fn scan(&self, duration: Duration, allow_duplicates: bool) -> TransportFuture<'_, ()>;

    /// Connect to a previously discovered peripheral. Failure surfaces as
    /// an `Err`, never a panic.
    fn connect(&self, device_id: &str) -> TransportFuture<'_, ()>;

    /// Always safe to call; a no-op when the device is not connected.
    fn disconnect(&self, device_id: &str) -> TransportFuture<'_, ()>;

    /// Subscribe to characteristic notifications on a connected peripheral.
    fn subscribe(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportFuture<'_, ()>;
}

/// True when the advertised name carries the expected device token.
pub fn matches_device_name(local_name: Option<&str>, token: &str) -> bool {
    local_name.is_some_and(|name| name.contains(token))
}
