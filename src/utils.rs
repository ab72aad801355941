//! Utility functions for the airthings-wave-ble crate.

use bytes::Buf;

use crate::error::{Error, Result};

/// Length of the serial number payload in Airthings manufacturer data.
pub const SERIAL_NUMBER_PAYLOAD_LEN: usize = 6;

/// Decode an Airthings serial number from manufacturer-specific advertising data.
///
/// The payload is six bytes long. The first four bytes hold the serial number
/// as a little-endian `u32`; the last two are unused by this protocol version.
///
/// # Errors
///
/// Returns [`Error::InvalidSerialNumberLength`] unless `data` is exactly six
/// bytes long.
///
/// # Example
///
/// ```
/// use airthings_wave_ble::parse_serial_number;
///
/// let serial = parse_serial_number(&[21, 217, 166, 174, 9, 0]).unwrap();
/// assert_eq!(serial, 2930170133);
/// ```
pub fn parse_serial_number(data: &[u8]) -> Result<u32> {
    if data.len() != SERIAL_NUMBER_PAYLOAD_LEN {
        return Err(Error::InvalidSerialNumberLength {
            length: data.len(),
            expected: SERIAL_NUMBER_PAYLOAD_LEN,
        });
    }

    let mut buf = data;
    Ok(buf.get_u32_le())
}
