//! BLE communication module.
//!
//! This module provides the transport abstraction, its btleplug
//! implementation, and discovery of Wave Plus sensors.

pub mod btleplug_transport;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use btleplug_transport::{BtleConnection, BtleTransport};
pub use scanner::SensorScanner;
pub use transport::{Advertisement, AdvertisementCallback, Connection, ConnectionParams, Transport};
pub use uuids::*;
