//! Error types for the airthings-wave-ble crate.

use thiserror::Error;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The radio or BLE stack failed (scan, connect, discovery, read).
    Transport,
    /// The device answered, but not with what the Wave Plus protocol expects.
    Protocol,
    /// A radon reading was outside the representable range.
    Range,
    /// A vendor payload in an advertisement could not be decoded.
    MalformedAdvertisement,
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No peripheral with this address has been seen by the transport.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was looked up.
        address: String,
    },

    /// Operation requires a connection but the sensor has been disconnected.
    #[error("Sensor not connected")]
    NotConnected,

    /// The connection attempt did not finish within the configured timeout.
    #[error("Connection timed out")]
    Timeout,

    /// The scan stopped delivering advertisements before the sensor was seen.
    #[error("Scan ended before the sensor was found")]
    ScanEnded,

    /// Service not found on the device.
    #[error("Service not found: {uuid} (empty service list discovered)")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid} (empty characteristic list discovered)")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// The device exposes no services at all.
    #[error("Empty service list discovered")]
    EmptyServiceList,

    /// Invalid data was received from the sensor.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// The telemetry record carries a version this crate cannot decode.
    #[error("Incorrect record version: {version} (expected {expected})")]
    UnsupportedVersion {
        /// The version byte found in the record.
        version: u8,
        /// The only supported version.
        expected: u8,
    },

    /// A radon average exceeded the sensor's representable range.
    #[error("Radon value outside bounds: {field} = {value}")]
    RadonOutOfRange {
        /// Which radon average was out of range.
        field: &'static str,
        /// The raw value read from the record.
        value: u16,
    },

    /// A serial number payload did not have the expected length.
    #[error("Invalid serial number length: {length} bytes (expected {expected})")]
    InvalidSerialNumberLength {
        /// Length of the payload that was supplied.
        length: usize,
        /// Required payload length.
        expected: usize,
    },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bluetooth(_)
            | Self::BluetoothUnavailable
            | Self::DeviceNotFound { .. }
            | Self::NotConnected
            | Self::Timeout
            | Self::ScanEnded => ErrorKind::Transport,
            Self::ServiceNotFound { .. }
            | Self::CharacteristicNotFound { .. }
            | Self::EmptyServiceList
            | Self::InvalidData { .. }
            | Self::UnsupportedVersion { .. } => ErrorKind::Protocol,
            Self::RadonOutOfRange { .. } => ErrorKind::Range,
            Self::InvalidSerialNumberLength { .. } => ErrorKind::MalformedAdvertisement,
        }
    }

    /// Check if this error came from the BLE transport.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Check if this is a radon range error.
    ///
    /// A refresh that fails with a range error has still committed every
    /// other field of the record.
    pub fn is_range(&self) -> bool {
        self.kind() == ErrorKind::Range
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
