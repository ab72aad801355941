//! BLE Service and Characteristic UUIDs.
//!
//! Contains the identifiers used to find and read an Airthings Wave Plus.

use uuid::Uuid;

// Wave Plus Data Service (Airthings Custom)
/// Airthings Wave Plus data service UUID.
pub const WAVE_PLUS_DATA_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xb42e_1c08_ade7_11e4_89d3_123b93f75cba);
/// Wave Plus current readings characteristic UUID (Read).
pub const WAVE_PLUS_DATA_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xb42e_2a68_ade7_11e4_89d3_123b93f75cba);

// Airthings manufacturer ID for advertising data
/// Airthings AS Bluetooth manufacturer ID.
pub const AIRTHINGS_MANUFACTURER_ID: u16 = 0x0334;

/// Largest attribute value a BLE characteristic can hold.
pub const MAX_ATTRIBUTE_LEN: usize = 512;

/// Check if a service UUID is the Wave Plus data service.
pub fn is_wave_plus_service(uuid: &Uuid) -> bool {
    *uuid == WAVE_PLUS_DATA_SERVICE_UUID
}
