//! Sensor discovery.
//!
//! Scans for a Wave Plus advertising a given serial number and connects to it.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::ble::btleplug_transport::BtleTransport;
use crate::ble::transport::{Advertisement, ConnectionParams, Transport};
use crate::ble::uuids::AIRTHINGS_MANUFACTURER_ID;
use crate::error::{Error, Result};
use crate::sensor::WaveSensor;
use crate::utils::parse_serial_number;

/// A sensor whose advertisement matched, waiting to be connected.
#[derive(Debug, Clone)]
struct PendingSensor {
    advertisement: Advertisement,
    serial_number: u32,
}

/// Single-slot handoff from the scan callback to the waiting caller.
///
/// The first match takes the sender; every later match finds the slot empty
/// and is dropped without blocking.
struct MatchSlot(Mutex<Option<oneshot::Sender<PendingSensor>>>);

impl MatchSlot {
    fn new() -> (Arc<Self>, oneshot::Receiver<PendingSensor>) {
        let (tx, rx) = oneshot::channel();
        (Arc::new(Self(Mutex::new(Some(tx)))), rx)
    }

    /// Hand off a match. Returns `false` if a match was already handed off.
    fn offer(&self, pending: PendingSensor) -> bool {
        let sender = self.0.lock().take();
        match sender {
            Some(tx) => tx.send(pending).is_ok(),
            None => false,
        }
    }
}

/// Check an advertisement for an Airthings serial number equal to `wanted`.
///
/// Malformed Airthings payloads are logged and skipped.
fn match_advertisement(advertisement: &Advertisement, wanted: u32) -> Option<u32> {
    for (company_id, data) in advertisement.manufacturer_data() {
        if *company_id != AIRTHINGS_MANUFACTURER_ID {
            continue;
        }

        match parse_serial_number(data) {
            Ok(serial_number) if serial_number == wanted => return Some(serial_number),
            Ok(serial_number) => {
                trace!(
                    "Ignoring Airthings device {} with serial {}",
                    advertisement.address,
                    serial_number
                );
            }
            Err(e) => {
                warn!(
                    "Found Airthings BT device {} but couldn't parse serial number: {}",
                    advertisement.address, e
                );
            }
        }
    }
    None
}

/// Finds a Wave Plus by serial number.
pub struct SensorScanner<T: Transport = BtleTransport> {
    transport: Arc<T>,
}

impl SensorScanner<BtleTransport> {
    /// Create a scanner on the first available Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn with_default_adapter() -> Result<Self> {
        Ok(Self::new(BtleTransport::new().await?))
    }
}

impl<T: Transport> SensorScanner<T> {
    /// Create a scanner over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Create a scanner sharing an existing transport.
    pub fn from_shared(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Scan for the sensor with `serial_number` and connect to it.
    ///
    /// Returns `Ok(None)` if `cancel` fires before a matching advertisement
    /// is seen. Once a match is found scanning stops and exactly one
    /// connection attempt is made; cancelling after that point has no effect.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the scan cannot be started or the
    /// connection attempt fails. Connections are not retried. Returns
    /// [`Error::ScanEnded`] if the transport stops delivering advertisements
    /// before a match.
    pub async fn find_sensor(
        &self,
        serial_number: u32,
        cancel: CancellationToken,
    ) -> Result<Option<WaveSensor<T::Connection>>> {
        if cancel.is_cancelled() {
            debug!("Search for {} cancelled before scanning", serial_number);
            return Ok(None);
        }

        info!("Scanning for sensor {}", serial_number);

        // The callback owns the only handle to the slot, so the receiver
        // fails once the transport drops the callback.
        let (slot, rx) = MatchSlot::new();
        self.transport
            .scan(Arc::new(move |advertisement: Advertisement| {
                if let Some(found) = match_advertisement(&advertisement, serial_number) {
                    let offered = slot.offer(PendingSensor {
                        advertisement,
                        serial_number: found,
                    });
                    if !offered {
                        trace!("Dropping duplicate match for {}", found);
                    }
                }
            }))
            .await?;

        let outcome = tokio::select! {
            pending = rx => pending.map(Some).map_err(|_| Error::ScanEnded),
            _ = cancel.cancelled() => Ok(None),
        };

        self.transport.stop_scan().await?;

        let Some(pending) = outcome? else {
            info!("Search for {} cancelled", serial_number);
            return Ok(None);
        };

        info!(
            "Found sensor {}, connecting using Bluetooth address {}",
            pending.serial_number, pending.advertisement.address
        );

        let connection = self
            .transport
            .connect(&pending.advertisement.address, ConnectionParams::default())
            .await?;

        debug!("Connected to {}, creating sensor", pending.serial_number);

        Ok(Some(WaveSensor::new(pending.serial_number, connection)))
    }
}
