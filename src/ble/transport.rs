//! Transport abstraction.
//!
//! The scanner and sensor session only talk to the radio through the
//! [`Transport`] and [`Connection`] traits. [`BtleTransport`] implements them
//! on top of btleplug; [`MockTransport`] implements them for tests.
//!
//! [`BtleTransport`]: crate::ble::btleplug_transport::BtleTransport
//! [`MockTransport`]: crate::mock::MockTransport

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// A single advertisement observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Address of the advertising device.
    pub address: String,
    /// Manufacturer-specific data entries, as (company ID, payload).
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
}

impl Advertisement {
    /// Create a new advertisement.
    pub fn new(address: impl Into<String>, manufacturer_data: Vec<(u16, Vec<u8>)>) -> Self {
        Self {
            address: address.into(),
            manufacturer_data,
        }
    }

    /// Manufacturer-specific data entries carried by this advertisement.
    pub fn manufacturer_data(&self) -> &[(u16, Vec<u8>)] {
        &self.manufacturer_data
    }
}

/// Callback invoked by a transport for every advertisement it receives.
///
/// Transports call this from their own task, so it must not block.
pub type AdvertisementCallback = Arc<dyn Fn(Advertisement) + Send + Sync>;

/// Parameters for a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionParams {
    /// Give up on the connection attempt after this long. `None` waits for
    /// the BLE stack to decide.
    pub connect_timeout: Option<Duration>,
}

impl ConnectionParams {
    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// A BLE stack able to scan for advertisements and open connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection handle produced by [`Transport::connect`].
    type Connection: Connection;

    /// Start a continuous scan, delivering every advertisement to `callback`
    /// until [`Transport::stop_scan`] is called.
    async fn scan(&self, callback: AdvertisementCallback) -> Result<()>;

    /// Stop a running scan. Stopping when not scanning is a no-op.
    async fn stop_scan(&self) -> Result<()>;

    /// Connect to the device with the given address.
    async fn connect(&self, address: &str, params: ConnectionParams) -> Result<Self::Connection>;
}

/// An established connection to a single device.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Address of the connected device.
    fn address(&self) -> String;

    /// Discover services, keeping only those in `filter`. An empty filter
    /// returns every service.
    async fn discover_services(&self, filter: &[Uuid]) -> Result<Vec<Uuid>>;

    /// Discover the characteristics of `service`, keeping only those in
    /// `filter`. An empty filter returns every characteristic.
    async fn discover_characteristics(&self, service: Uuid, filter: &[Uuid]) -> Result<Vec<Uuid>>;

    /// Read a characteristic value into `buf`, returning the number of bytes
    /// written. Values longer than `buf` are truncated.
    async fn read(&self, service: Uuid, characteristic: Uuid, buf: &mut [u8]) -> Result<usize>;

    /// Disconnect from the device.
    async fn disconnect(&self) -> Result<()>;
}

/// Apply a discovery filter. An empty filter matches everything.
pub(crate) fn matches_filter(filter: &[Uuid], uuid: &Uuid) -> bool {
    filter.is_empty() || filter.contains(uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_params_default() {
        let params = ConnectionParams::default();
        assert_eq!(params.connect_timeout, None);

        let params = params.with_connect_timeout(Duration::from_secs(10));
        assert_eq!(params.connect_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_matches_filter() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        assert!(matches_filter(&[], &a));
        assert!(matches_filter(&[a], &a));
        assert!(!matches_filter(&[a], &b));
    }

    #[test]
    fn test_advertisement_manufacturer_data() {
        let adv = Advertisement::new("AA:BB", vec![(0x0334, vec![1, 2, 3])]);
        assert_eq!(adv.manufacturer_data(), &[(0x0334, vec![1, 2, 3])]);
        assert_eq!(adv.address, "AA:BB");
    }
}
