//! Sensor session.
//!
//! Represents a connected Airthings Wave Plus sensor.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::ble::btleplug_transport::BtleConnection;
use crate::ble::transport::Connection;
use crate::ble::uuids::*;
use crate::data::{DeviceProfile, SensorReadings, ServiceProfile};
use crate::error::{Error, Result};
use crate::protocol::TelemetryRecord;

/// A connected Airthings Wave Plus sensor.
///
/// Created by [`SensorScanner::find_sensor`](crate::SensorScanner::find_sensor).
/// The session owns the connection; readings are only updated by
/// [`WaveSensor::refresh`].
pub struct WaveSensor<C: Connection = BtleConnection> {
    /// Serial number from the advertisement that matched.
    serial_number: u32,
    /// The connected device.
    connection: C,
    /// Whether `disconnect` has been called.
    connected: bool,
    /// Most recent measurements.
    readings: SensorReadings,
    /// When readings were last written.
    last_refreshed: Option<DateTime<Utc>>,
}

impl<C: Connection> std::fmt::Debug for WaveSensor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveSensor")
            .field("serial_number", &self.serial_number)
            .field("address", &self.connection.address())
            .field("connected", &self.connected)
            .field("readings", &self.readings)
            .finish()
    }
}

impl<C: Connection> WaveSensor<C> {
    /// Wrap a connected device.
    pub fn new(serial_number: u32, connection: C) -> Self {
        Self {
            serial_number,
            connection,
            connected: true,
            readings: SensorReadings::new(),
            last_refreshed: None,
        }
    }

    // === Identification ===

    /// Get the serial number.
    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    /// Get the serial number as a decimal string, as printed on the device.
    pub fn serial_number_string(&self) -> String {
        self.serial_number.to_string()
    }

    /// Get the Bluetooth address.
    pub fn address(&self) -> String {
        self.connection.address()
    }

    /// Check if the session is still connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    // === Readings ===

    /// Get all current readings.
    pub fn readings(&self) -> SensorReadings {
        self.readings
    }

    /// When readings were last updated by [`WaveSensor::refresh`].
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    /// Relative humidity, %rH.
    pub fn humidity(&self) -> f32 {
        self.readings.humidity
    }

    /// Light level, %.
    pub fn illuminance(&self) -> f32 {
        self.readings.illuminance
    }

    /// 24 hour radon average, Bq/m³.
    pub fn radon_short_term_avg(&self) -> f32 {
        self.readings.radon_short_term_avg
    }

    /// Long-term radon average, Bq/m³.
    pub fn radon_long_term_avg(&self) -> f32 {
        self.readings.radon_long_term_avg
    }

    /// Temperature, °C.
    pub fn temperature(&self) -> f32 {
        self.readings.temperature
    }

    /// Relative atmospheric pressure, hPa.
    pub fn relative_atmospheric_pressure(&self) -> f32 {
        self.readings.relative_atmospheric_pressure
    }

    /// CO2 level, ppm.
    pub fn co2_level(&self) -> f32 {
        self.readings.co2_level
    }

    /// VOC level, ppb.
    pub fn voc_level(&self) -> f32 {
        self.readings.voc_level
    }

    // === Operations ===

    /// Read the current measurements from the sensor.
    ///
    /// # Errors
    ///
    /// Transport and protocol errors leave the readings untouched. An
    /// [`Error::RadonOutOfRange`] is returned *after* the readings have been
    /// updated: the offending radon average is reset to
    /// [`SensorReadings::UNSET`] and every other value holds the new record.
    pub async fn refresh(&mut self) -> Result<()> {
        self.ensure_connected()?;

        let address = self.connection.address();
        debug!("Getting characteristics of device {}", address);

        let service = self
            .connection
            .discover_services(&[WAVE_PLUS_DATA_SERVICE_UUID])
            .await?
            .into_iter()
            .find(is_wave_plus_service)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: WAVE_PLUS_DATA_SERVICE_UUID.to_string(),
            })?;

        debug!("Discovering characteristics for service {}", service);

        let characteristic = self
            .connection
            .discover_characteristics(service, &[WAVE_PLUS_DATA_CHARACTERISTIC_UUID])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: WAVE_PLUS_DATA_CHARACTERISTIC_UUID.to_string(),
            })?;

        let mut buf = [0u8; MAX_ATTRIBUTE_LEN];
        let len = self
            .connection
            .read(service, characteristic, &mut buf)
            .await?;
        let data = &buf[..len.min(buf.len())];

        debug!("Read {} bytes from {}: {:02X?}", len, address, data);

        let record = TelemetryRecord::parse(data)?;

        // Version errors return before anything is written.
        record.check_version()?;
        let result = self.readings.apply(&record);
        self.last_refreshed = Some(Utc::now());

        result
    }

    /// List every service and characteristic the sensor exposes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyServiceList`] if the device reports no services.
    pub async fn device_profile(&mut self) -> Result<DeviceProfile> {
        self.ensure_connected()?;

        let services = self.connection.discover_services(&[]).await?;
        if services.is_empty() {
            return Err(Error::EmptyServiceList);
        }

        let mut profile = Vec::with_capacity(services.len());
        for service in services {
            let characteristics = self.connection.discover_characteristics(service, &[]).await?;
            debug!(
                "Service {} has {} characteristics",
                service,
                characteristics.len()
            );
            profile.push(ServiceProfile::new(service, characteristics));
        }

        Ok(profile.into_iter().collect())
    }

    /// Disconnect from the sensor.
    ///
    /// Readings stay available; further `refresh` or `device_profile` calls
    /// fail with [`Error::NotConnected`]. Disconnecting twice is a no-op.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }

        info!("Disconnecting from sensor {}", self.serial_number);

        self.connected = false;
        self.connection.disconnect().await
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnection;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    const ADDRESS: &str = "C4:64:E3:00:00:01";
    const SERIAL: u32 = 2930170133;

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            version: 1,
            humidity: 80,
            illuminance: 5,
            radon_short_term_avg: 120,
            radon_long_term_avg: 95,
            temperature: 1987,
            relative_pressure: 50350,
            co2: 1020,
            voc: 240,
        }
    }

    fn sensor_with(record: &TelemetryRecord) -> (WaveSensor<MockConnection>, MockConnection) {
        let device = MockConnection::wave_plus(ADDRESS, &record.to_bytes());
        (WaveSensor::new(SERIAL, device.clone()), device)
    }

    #[test]
    fn test_new_sensor_is_unset() {
        let (sensor, _) = sensor_with(&record());
        assert_eq!(sensor.serial_number(), SERIAL);
        assert_eq!(sensor.serial_number_string(), "2930170133");
        assert_eq!(sensor.address(), ADDRESS);
        assert_eq!(sensor.readings(), SensorReadings::new());
        assert_eq!(sensor.temperature(), -1.0);
        assert!(sensor.last_refreshed().is_none());
    }

    #[tokio::test]
    async fn test_refresh() {
        let (mut sensor, device) = sensor_with(&record());

        sensor.refresh().await.unwrap();

        assert_eq!(sensor.humidity(), 40.0);
        assert_eq!(sensor.illuminance(), 5.0);
        assert_eq!(sensor.radon_short_term_avg(), 120.0);
        assert_eq!(sensor.radon_long_term_avg(), 95.0);
        assert_eq!(sensor.temperature(), 1987.0 / 100.0);
        assert_eq!(sensor.relative_atmospheric_pressure(), 1007.0);
        assert_eq!(sensor.co2_level(), 1020.0);
        assert_eq!(sensor.voc_level(), 240.0);
        assert!(sensor.last_refreshed().is_some());
        assert_eq!(device.read_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let (mut sensor, _) = sensor_with(&record());

        sensor.refresh().await.unwrap();
        let first = sensor.readings();
        sensor.refresh().await.unwrap();

        assert_eq!(sensor.readings(), first);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_values() {
        let (mut sensor, device) = sensor_with(&record());
        sensor.refresh().await.unwrap();

        device.set_record(&TelemetryRecord { co2: 400, ..record() }.to_bytes());
        sensor.refresh().await.unwrap();

        assert_eq!(sensor.co2_level(), 400.0);
    }

    #[tokio::test]
    async fn test_refresh_wrong_version_keeps_state() {
        let (mut sensor, device) = sensor_with(&record());
        sensor.refresh().await.unwrap();
        let before = sensor.readings();

        device.set_record(&TelemetryRecord { version: 7, ..record() }.to_bytes());
        let result = sensor.refresh().await;

        assert!(matches!(
            result,
            Err(Error::UnsupportedVersion { version: 7, .. })
        ));
        assert_eq!(sensor.readings(), before);
    }

    #[tokio::test]
    async fn test_refresh_radon_out_of_range_is_partial() {
        let rec = TelemetryRecord {
            radon_short_term_avg: 16384,
            ..record()
        };
        let (mut sensor, _) = sensor_with(&rec);

        let err = sensor.refresh().await.unwrap_err();

        assert!(err.is_range());
        assert_eq!(sensor.radon_short_term_avg(), -1.0);
        assert_eq!(sensor.radon_long_term_avg(), 95.0);
        assert_eq!(sensor.co2_level(), 1020.0);
        assert_eq!(sensor.voc_level(), 240.0);
        assert_eq!(sensor.humidity(), 40.0);
    }

    #[tokio::test]
    async fn test_refresh_short_record() {
        let device = MockConnection::wave_plus(ADDRESS, &record().to_bytes()[..10]);
        let mut sensor = WaveSensor::new(SERIAL, device);

        let result = sensor.refresh().await;

        assert!(matches!(result, Err(Error::InvalidData { .. })));
        assert_eq!(sensor.readings(), SensorReadings::new());
    }

    #[tokio::test]
    async fn test_refresh_accepts_full_twenty_byte_record() {
        let mut data = record().to_bytes().to_vec();
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let device = MockConnection::wave_plus(ADDRESS, &data);
        let mut sensor = WaveSensor::new(SERIAL, device);

        sensor.refresh().await.unwrap();
        assert_eq!(sensor.voc_level(), 240.0);
    }

    #[tokio::test]
    async fn test_refresh_missing_service() {
        let device = MockConnection::new(ADDRESS).with_service(Uuid::from_u128(0x1800));
        let mut sensor = WaveSensor::new(SERIAL, device);

        let result = sensor.refresh().await;
        assert!(matches!(result, Err(Error::ServiceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_refresh_missing_characteristic() {
        let device = MockConnection::new(ADDRESS).with_service(WAVE_PLUS_DATA_SERVICE_UUID);
        let mut sensor = WaveSensor::new(SERIAL, device);

        let result = sensor.refresh().await;
        assert!(matches!(result, Err(Error::CharacteristicNotFound { .. })));
    }

    #[tokio::test]
    async fn test_refresh_read_failure_is_transport_error() {
        let (mut sensor, device) = sensor_with(&record());
        device.set_fail_reads(true);

        let err = sensor.refresh().await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(sensor.readings(), SensorReadings::new());
    }

    #[tokio::test]
    async fn test_refresh_discovery_failure_is_transport_error() {
        let (mut sensor, device) = sensor_with(&record());
        sensor.refresh().await.unwrap();
        let before = sensor.readings();
        let refreshed_at = sensor.last_refreshed();

        device.set_record(&TelemetryRecord { co2: 400, ..record() }.to_bytes());
        device.set_fail_discovery(true);
        let err = assert_err!(sensor.refresh().await);

        assert!(err.is_transport());
        assert_eq!(sensor.readings(), before);
        assert_eq!(sensor.last_refreshed(), refreshed_at);
        assert_eq!(device.read_count(), 1);
    }

    #[tokio::test]
    async fn test_device_profile_discovery_failure() {
        let (mut sensor, device) = sensor_with(&record());
        device.set_fail_discovery(true);

        let err = assert_err!(sensor.device_profile().await);

        assert!(err.is_transport());
        assert!(sensor.is_connected());

        device.set_fail_discovery(false);
        let profile = assert_ok!(sensor.device_profile().await);
        assert_eq!(profile.len(), 1);
    }

    #[tokio::test]
    async fn test_device_profile() {
        let info_service = Uuid::from_u128(0x0000_180a_0000_1000_8000_00805f9b34fb);
        let empty_service = Uuid::from_u128(0x0000_1801_0000_1000_8000_00805f9b34fb);
        let device = MockConnection::wave_plus(ADDRESS, &record().to_bytes())
            .with_service(empty_service)
            .with_characteristic(info_service, Uuid::from_u128(0x2a29), b"Airthings".to_vec());
        let mut sensor = WaveSensor::new(SERIAL, device);

        let profile = sensor.device_profile().await.unwrap();

        assert_eq!(
            profile.services,
            vec![
                ServiceProfile::new(
                    WAVE_PLUS_DATA_SERVICE_UUID,
                    vec![WAVE_PLUS_DATA_CHARACTERISTIC_UUID]
                ),
                ServiceProfile::new(empty_service, vec![]),
                ServiceProfile::new(info_service, vec![Uuid::from_u128(0x2a29)]),
            ]
        );
    }

    #[tokio::test]
    async fn test_device_profile_service_without_characteristics() {
        let service = Uuid::from_u128(0x1800);
        let device = MockConnection::new(ADDRESS).with_service(service);
        let mut sensor = WaveSensor::new(SERIAL, device);

        let profile = sensor.device_profile().await.unwrap();

        assert_eq!(profile.len(), 1);
        assert_eq!(profile.services[0], ServiceProfile::new(service, vec![]));
    }

    #[tokio::test]
    async fn test_device_profile_no_services() {
        let mut sensor = WaveSensor::new(SERIAL, MockConnection::new(ADDRESS));
        let err = assert_err!(sensor.device_profile().await);
        assert!(matches!(err, Error::EmptyServiceList));
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (mut sensor, device) = sensor_with(&record());
        sensor.refresh().await.unwrap();

        assert_ok!(sensor.disconnect().await);
        assert_ok!(sensor.disconnect().await);

        assert!(!sensor.is_connected());
        assert_eq!(device.disconnect_count(), 1);
        assert!(matches!(sensor.refresh().await, Err(Error::NotConnected)));
        assert!(matches!(
            sensor.device_profile().await,
            Err(Error::NotConnected)
        ));
        // Readings survive the disconnect.
        assert_eq!(sensor.co2_level(), 1020.0);
    }
}
