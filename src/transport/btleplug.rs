//! btleplug-backed transport adapter.
//!
//! Owns the platform Bluetooth state: the adapter, the central event pump,
//! the discovered-peripheral registry and the notification forwarders. All
//! pipeline-facing output goes through the event channel handed out by
//! [`BtleTransport::new`].

use super::{
    DiscoveredDevice, EVENT_CHANNEL_BUFFER_SIZE, Transport, TransportError, TransportEvent,
    TransportFuture, matches_device_name,
};
use crate::state::DisconnectCause;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

impl From<btleplug::Error> for TransportError {
    fn from(err: btleplug::Error) -> Self {
        TransportError::Bluetooth(err.to_string())
    }
}

type CentralEventStream = Pin<Box<dyn futures::Stream<Item = CentralEvent> + Send>>;

/// Tracks which peripherals have been announced during the current scan
/// window. The advertised local name frequently arrives only on a later
/// `DeviceUpdated`, after an initial nameless `DeviceDiscovered` that the
/// name filter rejects, so announcement must not depend on which event
/// kind carried the name: the first name-passing event for a device is
/// always announced, and `allow_duplicates` only gates re-announcements.
#[derive(Default)]
struct Announcer {
    announced: HashSet<String>,
}

impl Announcer {
    /// Forget all announcements; called when a new scan window opens.
    fn reset(&mut self) {
        self.announced.clear();
    }

    fn should_announce(&mut self, device_id: &str, allow_duplicates: bool) -> bool {
        let first = self.announced.insert(device_id.to_string());
        first || allow_duplicates
    }
}

/// Clears the scanning flag when dropped, so an error return between scan
/// start and stop cannot leave the flag set. A stuck flag would make every
/// later `scan` call take the idempotent no-op branch and never emit
/// `ScanStopped`.
struct ScanFlagGuard<'a>(&'a AtomicBool);

impl Drop for ScanFlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct BtleTransport {
    adapter: Adapter,
    tx: mpsc::Sender<TransportEvent>,
    device_name: String,
    scanning: AtomicBool,
    allow_duplicates: AtomicBool,
    /// Peripherals that passed the name filter, keyed by address string.
    known: Mutex<HashMap<String, PeripheralId>>,
    announcer: Mutex<Announcer>,
    /// Device id of an in-flight requested disconnect, for cause attribution.
    requested_disconnect: Mutex<Option<String>>,
}

impl BtleTransport {
    /// Initialize the first available Bluetooth adapter and start the
    /// central event pump. Returns the transport and its event stream.
    pub async fn new(
        device_name: impl Into<String>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<TransportEvent>), TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Bluetooth("no Bluetooth adapter found".into()))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);
        let transport = Arc::new(BtleTransport {
            adapter,
            tx,
            device_name: device_name.into(),
            scanning: AtomicBool::new(false),
            allow_duplicates: AtomicBool::new(false),
            known: Mutex::new(HashMap::new()),
            announcer: Mutex::new(Announcer::default()),
            requested_disconnect: Mutex::new(None),
        });

        let events = transport.adapter.events().await?;
        tokio::spawn(Self::pump(Arc::clone(&transport), events));

        Ok((transport, rx))
    }

    /// Forward central events into the pipeline's channel until the adapter
    /// stream or the receiver goes away.
    async fn pump(self: Arc<Self>, mut events: CentralEventStream) {
        while let Some(event) = events.next().await {
            match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                    self.handle_discovered(id).await
                }
                CentralEvent::DeviceDisconnected(id) => self.handle_disconnected(id).await,
                _ => {}
            }
        }
    }

    async fn handle_discovered(&self, id: PeripheralId) {
        let Ok(peripheral) = self.adapter.peripheral(&id).await else {
            return;
        };
        let Ok(Some(props)) = peripheral.properties().await else {
            return;
        };
        // Filter before anything reaches the pipeline: unrelated peripherals
        // are noise and must never become connect candidates.
        if !matches_device_name(props.local_name.as_deref(), &self.device_name) {
            return;
        }

        let device_id = peripheral.address().to_string();
        self.known.lock().await.insert(device_id.clone(), id);

        if !self.scanning.load(Ordering::SeqCst) {
            return;
        }
        let allow_duplicates = self.allow_duplicates.load(Ordering::SeqCst);
        if !self
            .announcer
            .lock()
            .await
            .should_announce(&device_id, allow_duplicates)
        {
            return;
        }

        let name = props.local_name.unwrap_or_default();
        log::debug!("discovered {name} ({device_id})");
        let _ = self
            .tx
            .send(TransportEvent::DeviceDiscovered(DiscoveredDevice {
                id: device_id,
                name,
            }))
            .await;
    }

    async fn handle_disconnected(&self, id: PeripheralId) {
        let Ok(peripheral) = self.adapter.peripheral(&id).await else {
            return;
        };
        let device_id = peripheral.address().to_string();

        let mut requested = self.requested_disconnect.lock().await;
        let cause = if requested.as_deref() == Some(device_id.as_str()) {
            requested.take();
            DisconnectCause::Requested
        } else {
            DisconnectCause::Unexpected
        };
        drop(requested);

        let _ = self
            .tx
            .send(TransportEvent::Disconnected { device_id, cause })
            .await;
    }

    async fn peripheral(&self, device_id: &str) -> Result<Peripheral, TransportError> {
        let id = self
            .known
            .lock()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| TransportError::UnknownDevice(device_id.to_string()))?;
        Ok(self.adapter.peripheral(&id).await?)
    }
}

impl Transport for BtleTransport {
    fn scan(&self, duration: Duration, allow_duplicates: bool) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            // Idempotent: a scan in progress makes this a no-op.
            if self.scanning.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            let guard = ScanFlagGuard(&self.scanning);
            self.allow_duplicates.store(allow_duplicates, Ordering::SeqCst);
            self.announcer.lock().await.reset();

            self.adapter.start_scan(ScanFilter::default()).await?;
            tokio::time::sleep(duration).await;
            let stopped = self.adapter.stop_scan().await;
            drop(guard);
            stopped?;

            let _ = self.tx.send(TransportEvent::ScanStopped).await;
            Ok(())
        })
    }

    fn connect(&self, device_id: &str) -> TransportFuture<'_, ()> {
        let device_id = device_id.to_string();
        Box::pin(async move {
            let peripheral = self.peripheral(&device_id).await?;
            peripheral.connect().await?;
            peripheral.discover_services().await?;
            Ok(())
        })
    }

    fn disconnect(&self, device_id: &str) -> TransportFuture<'_, ()> {
        let device_id = device_id.to_string();
        Box::pin(async move {
            let Ok(peripheral) = self.peripheral(&device_id).await else {
                // Never connected to it; nothing to do.
                return Ok(());
            };
            if peripheral.is_connected().await.unwrap_or(false) {
                *self.requested_disconnect.lock().await = Some(device_id);
                peripheral.disconnect().await?;
            }
            Ok(())
        })
    }

    fn subscribe(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportFuture<'_, ()> {
        let device_id = device_id.to_string();
        Box::pin(async move {
            let peripheral = self.peripheral(&device_id).await?;
            let target = peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.uuid == characteristic && c.service_uuid == service)
                .ok_or(TransportError::CharacteristicNotFound(characteristic))?;
            peripheral.subscribe(&target).await?;

            let mut notifications = peripheral.notifications().await?;
            let tx = self.tx.clone();
            tokio::spawn(async move {
                while let Some(notification) = notifications.next().await {
                    let event = TransportEvent::Notification {
                        characteristic: notification.uuid,
                        value: notification.value,
                    };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name_passing_event_is_announced_regardless_of_kind() {
        // A nameless advertisement never reaches the announcer (the name
        // filter rejects it first), so the device's first name-passing
        // event may well be a DeviceUpdated. It must still go out even
        // with duplicate reporting off.
        let mut announcer = Announcer::default();
        assert!(announcer.should_announce("dev-1", false));
    }

    #[test]
    fn test_repeat_advertisements_are_gated_by_allow_duplicates() {
        let mut announcer = Announcer::default();
        assert!(announcer.should_announce("dev-1", false));
        assert!(!announcer.should_announce("dev-1", false));

        let mut announcer = Announcer::default();
        assert!(announcer.should_announce("dev-1", true));
        assert!(announcer.should_announce("dev-1", true));
    }

    #[test]
    fn test_announcer_tracks_devices_independently() {
        let mut announcer = Announcer::default();
        assert!(announcer.should_announce("dev-1", false));
        assert!(announcer.should_announce("dev-2", false));
        assert!(!announcer.should_announce("dev-1", false));
    }

    #[test]
    fn test_reset_opens_a_fresh_announcement_window() {
        let mut announcer = Announcer::default();
        assert!(announcer.should_announce("dev-1", false));
        announcer.reset();
        assert!(announcer.should_announce("dev-1", false));
    }

    #[test]
    fn test_scan_flag_clears_on_early_return() {
        let scanning = AtomicBool::new(false);

        // First scan attempt: flag taken, then an error path drops the
        // guard before the normal stop sequence runs.
        assert!(!scanning.swap(true, Ordering::SeqCst));
        {
            let _guard = ScanFlagGuard(&scanning);
        }
        assert!(!scanning.load(Ordering::SeqCst));

        // A later scan attempt must not hit the no-op branch.
        assert!(!scanning.swap(true, Ordering::SeqCst));
    }
}
