//! Data structures for sensor data.
//!
//! This module contains the decoded measurement set and the diagnostic
//! GATT profile of a connected sensor.

pub mod profile;
pub mod readings;

pub use profile::{DeviceProfile, ServiceProfile};
pub use readings::SensorReadings;
