// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # airthings-wave-ble
//!
//! A cross-platform Rust library for reading Airthings Wave Plus
//! environmental sensors via Bluetooth Low Energy.
//!
//! The sensor is found by the serial number printed on the device, which it
//! broadcasts in its manufacturer-specific advertising data. Once connected,
//! the current readings are read from a single GATT characteristic.
//!
//! ## Features
//!
//! - **Discovery by serial number**: scan until the requested sensor advertises
//! - **Current readings**: humidity, light, radon (24h and long-term averages),
//!   temperature, relative pressure, CO2 and VOC
//! - **Device profile**: list every service and characteristic for diagnostics
//! - **Transport abstraction**: swap btleplug for [`mock::MockTransport`] in tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use airthings_wave_ble::{Result, SensorScanner};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let scanner = SensorScanner::with_default_adapter().await?;
//!
//!     let Some(mut sensor) = scanner
//!         .find_sensor(2930170133, CancellationToken::new())
//!         .await?
//!     else {
//!         return Ok(());
//!     };
//!
//!     sensor.refresh().await?;
//!     println!("Radon (24h): {:.1} Bq/m3", sensor.radon_short_term_avg());
//!     println!("CO2: {:.1} ppm", sensor.co2_level());
//!
//!     sensor.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod data;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod sensor;
pub mod utils;

// Re-exports for convenience
pub use ble::scanner::SensorScanner;
pub use ble::uuids::{
    AIRTHINGS_MANUFACTURER_ID, WAVE_PLUS_DATA_CHARACTERISTIC_UUID, WAVE_PLUS_DATA_SERVICE_UUID,
};
pub use data::{DeviceProfile, SensorReadings, ServiceProfile};
pub use error::{Error, ErrorKind, Result};
pub use protocol::TelemetryRecord;
pub use sensor::WaveSensor;
pub use utils::parse_serial_number;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<SensorScanner>();
        let _ = std::any::TypeId::of::<WaveSensor>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<SensorReadings>();
        let _ = std::any::TypeId::of::<DeviceProfile>();
        let _ = std::any::TypeId::of::<TelemetryRecord>();
    }

    #[test]
    fn test_serial_number_example() {
        assert_eq!(
            parse_serial_number(&[21, 217, 166, 174, 9, 0]).unwrap(),
            2930170133
        );
    }
}
