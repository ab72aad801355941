//! btleplug-backed transport.
//!
//! Scans through the first (or a named) Bluetooth adapter and connects to
//! peripherals it has seen advertising.

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::transport::{
    matches_filter, Advertisement, AdvertisementCallback, Connection, ConnectionParams, Transport,
};
use crate::error::{Error, Result};

/// Transport over the platform BLE stack.
pub struct BtleTransport {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Whether scanning is currently active.
    is_scanning: Arc<RwLock<bool>>,
    /// Peripherals seen while scanning, by address.
    discovered: Arc<RwLock<HashMap<String, Peripheral>>>,
    /// Handle to the scanning task.
    scan_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl BtleTransport {
    /// Create a transport on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let adapter = Self::adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a transport on the adapter whose description contains `name`
    /// (for example `hci1`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::BluetoothUnavailable`] if no adapter matches.
    pub async fn with_adapter_name(name: &str) -> Result<Self> {
        for adapter in Self::adapters().await? {
            let adapter_info = adapter.adapter_info().await.map_err(Error::Bluetooth)?;
            if adapter_info.contains(name) {
                info!("Using Bluetooth adapter: {}", adapter_info);
                return Ok(Self::with_adapter(adapter));
            }
            debug!("Skipping adapter {}", adapter_info);
        }

        warn!("No Bluetooth adapter matching {:?}", name);
        Err(Error::BluetoothUnavailable)
    }

    /// Create a transport with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            is_scanning: Arc::new(RwLock::new(false)),
            discovered: Arc::new(RwLock::new(HashMap::new())),
            scan_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        *self.is_scanning.read()
    }

    async fn adapters() -> Result<Vec<Adapter>> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        manager.adapters().await.map_err(Error::Bluetooth)
    }

    /// Handle a BLE central event.
    async fn handle_event(
        event: CentralEvent,
        adapter: &Adapter,
        discovered: &RwLock<HashMap<String, Peripheral>>,
        callback: &AdvertisementCallback,
    ) {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                trace!("Device discovered or updated: {:?}", id);
                Self::process_peripheral(adapter, id, None, discovered, callback).await;
            }
            CentralEvent::ManufacturerDataAdvertisement {
                id,
                manufacturer_data,
            } => {
                trace!("Manufacturer data advertisement: {:?}", id);
                Self::process_peripheral(adapter, id, Some(manufacturer_data), discovered, callback)
                    .await;
            }
            _ => {}
        }
    }

    /// Turn a peripheral into an [`Advertisement`] and hand it to the callback.
    async fn process_peripheral(
        adapter: &Adapter,
        id: PeripheralId,
        manufacturer_data: Option<HashMap<u16, Vec<u8>>>,
        discovered: &RwLock<HashMap<String, Peripheral>>,
        callback: &AdvertisementCallback,
    ) {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let manufacturer_data = match manufacturer_data {
            Some(data) => data,
            None => match peripheral.properties().await {
                Ok(Some(properties)) => properties.manufacturer_data,
                _ => return,
            },
        };

        let address = peripheral_address(&peripheral);
        discovered.write().insert(address.clone(), peripheral);

        let mut entries: Vec<(u16, Vec<u8>)> = manufacturer_data.into_iter().collect();
        entries.sort_by_key(|(company_id, _)| *company_id);

        callback(Advertisement::new(address, entries));
    }
}

#[async_trait]
impl Transport for BtleTransport {
    type Connection = BtleConnection;

    async fn scan(&self, callback: AdvertisementCallback) -> Result<()> {
        if *self.is_scanning.read() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!("Starting BLE scan");

        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        *self.is_scanning.write() = true;

        let adapter = self.adapter.clone();
        let is_scanning = self.is_scanning.clone();
        let discovered = self.discovered.clone();

        // Ending the task drops `callback`, which is how callers learn the
        // event stream is gone.
        let handle = tokio::spawn(async move {
            while *is_scanning.read() {
                tokio::select! {
                    event = events.next() => match event {
                        Some(event) => {
                            Self::handle_event(event, &adapter, &discovered, &callback).await;
                        }
                        None => {
                            error!("Adapter event stream ended while scanning");
                            break;
                        }
                    },
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                }
            }

            debug!("Scan event loop ended");
        });

        *self.scan_handle.write() = Some(handle);

        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        if !*self.is_scanning.read() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");

        *self.is_scanning.write() = false;

        self.adapter.stop_scan().await.map_err(Error::Bluetooth)?;

        let handle = self.scan_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        Ok(())
    }

    async fn connect(&self, address: &str, params: ConnectionParams) -> Result<BtleConnection> {
        let peripheral = self
            .discovered
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                address: address.to_string(),
            })?;

        info!("Connecting to {}", address);

        match params.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, peripheral.connect())
                .await
                .map_err(|_| Error::Timeout)??,
            None => peripheral.connect().await?,
        }

        info!("Successfully connected to {}", address);

        Ok(BtleConnection {
            peripheral,
            address: address.to_string(),
        })
    }
}

impl Drop for BtleTransport {
    fn drop(&mut self) {
        *self.is_scanning.write() = false;
    }
}

/// A connected btleplug peripheral.
pub struct BtleConnection {
    peripheral: Peripheral,
    address: String,
}

impl BtleConnection {
    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    fn find_characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<Characteristic> {
        self.peripheral
            .services()
            .into_iter()
            .filter(|s| s.uuid == service)
            .flat_map(|s| s.characteristics)
            .find(|c| c.uuid == characteristic)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic.to_string(),
            })
    }
}

#[async_trait]
impl Connection for BtleConnection {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn discover_services(&self, filter: &[Uuid]) -> Result<Vec<Uuid>> {
        self.peripheral.discover_services().await?;

        let services: Vec<Uuid> = self
            .peripheral
            .services()
            .iter()
            .map(|s| s.uuid)
            .filter(|uuid| matches_filter(filter, uuid))
            .collect();

        debug!("Discovered {} services on {}", services.len(), self.address);

        Ok(services)
    }

    async fn discover_characteristics(&self, service: Uuid, filter: &[Uuid]) -> Result<Vec<Uuid>> {
        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: service.to_string(),
            })?;

        let characteristics: Vec<Uuid> = service
            .characteristics
            .iter()
            .map(|c| c.uuid)
            .filter(|uuid| matches_filter(filter, uuid))
            .collect();

        debug!(
            "Discovered {} characteristics in service {}",
            characteristics.len(),
            service.uuid
        );

        Ok(characteristics)
    }

    async fn read(&self, service: Uuid, characteristic: Uuid, buf: &mut [u8]) -> Result<usize> {
        let target = self.find_characteristic(service, characteristic)?;

        let data = self.peripheral.read(&target).await?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);

        trace!("Read {} bytes from characteristic {}", len, characteristic);

        Ok(len)
    }

    async fn disconnect(&self) -> Result<()> {
        match self.peripheral.disconnect().await {
            Ok(_) => {
                info!("Successfully disconnected from {}", self.address);
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect: {}", e);
                Err(Error::Bluetooth(e))
            }
        }
    }
}

/// Address string for a peripheral. Falls back to the peripheral ID where the
/// platform hides MAC addresses (macOS reports all zeros).
fn peripheral_address(peripheral: &Peripheral) -> String {
    let address = peripheral.address().to_string();
    if address == "00:00:00:00:00:00" {
        format!("{:?}", peripheral.id())
            .trim_start_matches("PeripheralId(")
            .trim_end_matches(')')
            .to_string()
    } else {
        address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BtleTransport>();
        assert_send_sync::<BtleConnection>();
    }
}
