//! Mock transport for testing.
//!
//! [`MockTransport`] and [`MockConnection`] implement the transport traits
//! without BLE hardware, so discovery and sensor sessions can be exercised in
//! unit tests.
//!
//! # Features
//!
//! - **Scripted advertisements**: queue advertisements for the next scan, or
//!   push them while a scan is running with [`MockTransport::advertise`]
//! - **Failure injection**: make scanning, connecting or reading fail, or end
//!   a running scan with [`MockTransport::end_scan`]
//! - **Call counters**: inspect how often the transport was used
//!
//! # Example
//!
//! ```
//! use airthings_wave_ble::mock::{MockConnection, MockTransport};
//! use airthings_wave_ble::ble::Advertisement;
//! use airthings_wave_ble::{SensorScanner, AIRTHINGS_MANUFACTURER_ID};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = MockTransport::new()
//!         .with_advertisement(Advertisement::new(
//!             "AA:BB:CC:DD:EE:FF",
//!             vec![(AIRTHINGS_MANUFACTURER_ID, vec![21, 217, 166, 174, 9, 0])],
//!         ))
//!         .with_device(MockConnection::wave_plus("AA:BB:CC:DD:EE:FF", &[1; 16]));
//!
//!     let scanner = SensorScanner::new(transport);
//!     let sensor = scanner
//!         .find_sensor(2930170133, CancellationToken::new())
//!         .await
//!         .unwrap();
//!     assert!(sensor.is_some());
//! }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::ble::transport::{
    matches_filter, Advertisement, AdvertisementCallback, Connection, ConnectionParams, Transport,
};
use crate::ble::uuids::{WAVE_PLUS_DATA_CHARACTERISTIC_UUID, WAVE_PLUS_DATA_SERVICE_UUID};
use crate::error::{Error, Result};

fn mock_failure(message: &str) -> Error {
    Error::Bluetooth(btleplug::Error::Other(message.to_string().into()))
}

/// A mock BLE stack.
#[derive(Default)]
pub struct MockTransport {
    pending: Mutex<Vec<Advertisement>>,
    devices: Mutex<HashMap<String, MockConnection>>,
    callback: Mutex<Option<AdvertisementCallback>>,
    scanning: AtomicBool,
    fail_scan: AtomicBool,
    fail_connect: AtomicBool,
    scan_count: AtomicU32,
    stop_scan_count: AtomicU32,
    connect_attempts: Mutex<Vec<(String, ConnectionParams)>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("scanning", &self.scanning.load(Ordering::Relaxed))
            .field("devices", &self.devices.lock().len())
            .finish()
    }
}

impl MockTransport {
    /// Create an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an advertisement to be delivered when the next scan starts.
    pub fn with_advertisement(self, advertisement: Advertisement) -> Self {
        self.pending.lock().push(advertisement);
        self
    }

    /// Register a device that can be connected to by its address.
    pub fn with_device(self, device: MockConnection) -> Self {
        self.devices.lock().insert(device.address(), device);
        self
    }

    /// Deliver an advertisement to the running scan, if any.
    ///
    /// Returns `false` if no scan is running.
    pub fn advertise(&self, advertisement: Advertisement) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) if self.scanning.load(Ordering::SeqCst) => {
                callback(advertisement);
                true
            }
            _ => false,
        }
    }

    /// End the running scan from the stack side, dropping its callback
    /// without a `stop_scan` call.
    pub fn end_scan(&self) {
        self.scanning.store(false, Ordering::SeqCst);
        *self.callback.lock() = None;
    }

    /// Make the next scans fail to start.
    pub fn set_fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    /// Make connection attempts fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Check if a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Number of scans started.
    pub fn scan_count(&self) -> u32 {
        self.scan_count.load(Ordering::SeqCst)
    }

    /// Number of times a running scan was stopped.
    pub fn stop_scan_count(&self) -> u32 {
        self.stop_scan_count.load(Ordering::SeqCst)
    }

    /// Addresses passed to `connect`, in call order.
    pub fn connect_attempts(&self) -> Vec<String> {
        self.connect_attempts
            .lock()
            .iter()
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Parameters passed to `connect`, in call order.
    pub fn connect_params(&self) -> Vec<ConnectionParams> {
        self.connect_attempts
            .lock()
            .iter()
            .map(|(_, params)| *params)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn scan(&self, callback: AdvertisementCallback) -> Result<()> {
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(mock_failure("mock scan failure"));
        }

        self.scan_count.fetch_add(1, Ordering::SeqCst);
        self.scanning.store(true, Ordering::SeqCst);
        *self.callback.lock() = Some(callback);

        let pending: Vec<Advertisement> = self.pending.lock().drain(..).collect();
        for advertisement in pending {
            self.advertise(advertisement);
        }

        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        if self.scanning.swap(false, Ordering::SeqCst) {
            self.stop_scan_count.fetch_add(1, Ordering::SeqCst);
        }
        *self.callback.lock() = None;
        Ok(())
    }

    async fn connect(&self, address: &str, params: ConnectionParams) -> Result<MockConnection> {
        self.connect_attempts
            .lock()
            .push((address.to_string(), params));

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(mock_failure("mock connect failure"));
        }

        let device = self
            .devices
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                address: address.to_string(),
            })?;
        device.state.lock().connected = true;

        Ok(device)
    }
}

#[derive(Debug, Default)]
struct MockService {
    uuid: Uuid,
    characteristics: Vec<(Uuid, Vec<u8>)>,
}

#[derive(Debug, Default)]
struct MockConnectionState {
    services: Vec<MockService>,
    connected: bool,
    fail_discovery: bool,
    fail_reads: bool,
    read_count: u32,
    disconnect_count: u32,
}

/// A mock connected device.
///
/// Clones share state, so a test can keep a handle to a device it gave to a
/// [`MockTransport`] and inspect or modify it later.
#[derive(Debug, Clone)]
pub struct MockConnection {
    address: String,
    state: Arc<Mutex<MockConnectionState>>,
}

impl MockConnection {
    /// Create a device with no services.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: Arc::new(Mutex::new(MockConnectionState::default())),
        }
    }

    /// Create a Wave Plus device whose data characteristic holds `record`.
    pub fn wave_plus(address: impl Into<String>, record: &[u8]) -> Self {
        Self::new(address).with_characteristic(
            WAVE_PLUS_DATA_SERVICE_UUID,
            WAVE_PLUS_DATA_CHARACTERISTIC_UUID,
            record.to_vec(),
        )
    }

    /// Add a service, without characteristics if it does not exist yet.
    pub fn with_service(self, service: Uuid) -> Self {
        {
            let mut state = self.state.lock();
            if !state.services.iter().any(|s| s.uuid == service) {
                state.services.push(MockService {
                    uuid: service,
                    characteristics: Vec::new(),
                });
            }
        }
        self
    }

    /// Add a characteristic with an initial value, creating its service if needed.
    pub fn with_characteristic(self, service: Uuid, characteristic: Uuid, value: Vec<u8>) -> Self {
        let this = self.with_service(service);
        if let Some(s) = this
            .state
            .lock()
            .services
            .iter_mut()
            .find(|s| s.uuid == service)
        {
            s.characteristics.push((characteristic, value));
        }
        this
    }

    /// Replace the value of an existing characteristic.
    pub fn set_value(&self, service: Uuid, characteristic: Uuid, value: Vec<u8>) {
        let mut state = self.state.lock();
        let slot = state
            .services
            .iter_mut()
            .filter(|s| s.uuid == service)
            .flat_map(|s| s.characteristics.iter_mut())
            .find(|(uuid, _)| *uuid == characteristic);
        if let Some((_, current)) = slot {
            *current = value;
        }
    }

    /// Replace the Wave Plus data record.
    pub fn set_record(&self, record: &[u8]) {
        self.set_value(
            WAVE_PLUS_DATA_SERVICE_UUID,
            WAVE_PLUS_DATA_CHARACTERISTIC_UUID,
            record.to_vec(),
        );
    }

    /// Make service discovery fail.
    pub fn set_fail_discovery(&self, fail: bool) {
        self.state.lock().fail_discovery = fail;
    }

    /// Make characteristic reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Check if the device is connected.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of characteristic reads performed.
    pub fn read_count(&self) -> u32 {
        self.state.lock().read_count
    }

    /// Number of disconnect calls.
    pub fn disconnect_count(&self) -> u32 {
        self.state.lock().disconnect_count
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn discover_services(&self, filter: &[Uuid]) -> Result<Vec<Uuid>> {
        let state = self.state.lock();
        if state.fail_discovery {
            return Err(mock_failure("mock discovery failure"));
        }
        Ok(state
            .services
            .iter()
            .map(|s| s.uuid)
            .filter(|uuid| matches_filter(filter, uuid))
            .collect())
    }

    async fn discover_characteristics(&self, service: Uuid, filter: &[Uuid]) -> Result<Vec<Uuid>> {
        let state = self.state.lock();
        if state.fail_discovery {
            return Err(mock_failure("mock discovery failure"));
        }
        let found = state
            .services
            .iter()
            .find(|s| s.uuid == service)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: service.to_string(),
            })?;
        Ok(found
            .characteristics
            .iter()
            .map(|(uuid, _)| *uuid)
            .filter(|uuid| matches_filter(filter, uuid))
            .collect())
    }

    async fn read(&self, service: Uuid, characteristic: Uuid, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.fail_reads {
            return Err(mock_failure("mock read failure"));
        }
        state.read_count += 1;

        let value = state
            .services
            .iter()
            .filter(|s| s.uuid == service)
            .flat_map(|s| s.characteristics.iter())
            .find(|(uuid, _)| *uuid == characteristic)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic.to_string(),
            })?;

        let len = value.len().min(buf.len());
        buf[..len].copy_from_slice(&value[..len]);
        Ok(len)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.connected = false;
        state.disconnect_count += 1;
        Ok(())
    }
}
