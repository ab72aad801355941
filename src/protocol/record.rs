//! Wave Plus telemetry record decoding.
//!
//! The current-readings characteristic holds a packed little-endian record.
//! Each field is described by a [`FieldSpec`] and read by the generic
//! [`FieldSpec::read_raw`], so decoding never depends on in-memory layout.

use bytes::Buf;
use tracing::debug;

use crate::error::{Error, Result};

/// The only record version this crate understands.
pub const SUPPORTED_RECORD_VERSION: u8 = 1;

/// Bytes required to decode a record (everything up to and including VOC).
pub const RECORD_LEN: usize = 16;

/// Radon averages above this value are outside the sensor's range.
pub const RADON_MAX_VALID: u16 = 16383;

/// Byte order of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

/// Location, width and scaling of one record field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Field name, used in log and error messages.
    pub name: &'static str,
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// Width in bytes (1 or 2).
    pub width: usize,
    /// Byte order for multi-byte fields.
    pub byte_order: ByteOrder,
    /// Divisor converting the raw value into physical units.
    pub divisor: f32,
}

impl FieldSpec {
    const fn le(name: &'static str, offset: usize, width: usize, divisor: f32) -> Self {
        Self {
            name,
            offset,
            width,
            byte_order: ByteOrder::Little,
            divisor,
        }
    }

    /// Read the raw unsigned value of this field from `data`.
    ///
    /// Returns `None` if `data` is too short to contain the field.
    pub fn read_raw(&self, data: &[u8]) -> Option<u16> {
        let mut buf = data.get(self.offset..self.offset + self.width)?;
        match (self.width, self.byte_order) {
            (1, _) => Some(buf.get_u8() as u16),
            (2, ByteOrder::Little) => Some(buf.get_u16_le()),
            (2, ByteOrder::Big) => Some(buf.get_u16()),
            _ => None,
        }
    }

    /// Convert a raw value into physical units.
    pub fn scaled(&self, raw: u16) -> f32 {
        raw as f32 / self.divisor
    }
}

/// Record field table.
pub mod fields {
    use super::FieldSpec;

    /// Record version (byte 0).
    pub const VERSION: FieldSpec = FieldSpec::le("version", 0, 1, 1.0);
    /// Relative humidity, half-percent steps.
    pub const HUMIDITY: FieldSpec = FieldSpec::le("humidity", 1, 1, 2.0);
    /// Ambient light level, percent.
    pub const ILLUMINANCE: FieldSpec = FieldSpec::le("illuminance", 2, 1, 1.0);
    // Byte 3 is reserved.
    /// 24 hour radon average, Bq/m³.
    pub const RADON_SHORT_TERM_AVG: FieldSpec = FieldSpec::le("radon_short_term_avg", 4, 2, 1.0);
    /// Long-term radon average, Bq/m³.
    pub const RADON_LONG_TERM_AVG: FieldSpec = FieldSpec::le("radon_long_term_avg", 6, 2, 1.0);
    /// Temperature, hundredths of a degree Celsius.
    pub const TEMPERATURE: FieldSpec = FieldSpec::le("temperature", 8, 2, 100.0);
    /// Relative atmospheric pressure, fiftieths of a hPa.
    pub const RELATIVE_PRESSURE: FieldSpec = FieldSpec::le("relative_pressure", 10, 2, 50.0);
    /// CO2 level, ppm.
    pub const CO2: FieldSpec = FieldSpec::le("co2", 12, 2, 1.0);
    /// VOC level, ppb.
    pub const VOC: FieldSpec = FieldSpec::le("voc", 14, 2, 1.0);
    // Bytes 16-19 are reserved and not required.

    /// All decoded fields in record order.
    pub const ALL: [FieldSpec; 9] = [
        VERSION,
        HUMIDITY,
        ILLUMINANCE,
        RADON_SHORT_TERM_AVG,
        RADON_LONG_TERM_AVG,
        TEMPERATURE,
        RELATIVE_PRESSURE,
        CO2,
        VOC,
    ];
}

/// Raw Wave Plus telemetry record, as read from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryRecord {
    /// Record format version.
    pub version: u8,
    /// Raw humidity (half-percent steps).
    pub humidity: u8,
    /// Raw illuminance (percent).
    pub illuminance: u8,
    /// Raw 24 hour radon average (Bq/m³).
    pub radon_short_term_avg: u16,
    /// Raw long-term radon average (Bq/m³).
    pub radon_long_term_avg: u16,
    /// Raw temperature (hundredths of °C).
    pub temperature: u16,
    /// Raw relative pressure (fiftieths of hPa).
    pub relative_pressure: u16,
    /// Raw CO2 (ppm).
    pub co2: u16,
    /// Raw VOC (ppb).
    pub voc: u16,
}

impl TelemetryRecord {
    /// Parse a record from characteristic data.
    ///
    /// Only the length is checked here; the version is validated when the
    /// record is applied to a reading set, see
    /// [`SensorReadings::apply`](crate::data::SensorReadings::apply).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RECORD_LEN {
            return Err(Error::InvalidData {
                context: format!(
                    "Telemetry record too short: {} bytes (need at least {})",
                    data.len(),
                    RECORD_LEN
                ),
            });
        }

        let read = |field: &FieldSpec| {
            field.read_raw(data).ok_or_else(|| Error::InvalidData {
                context: format!("Failed to read field {}", field.name),
            })
        };

        let record = Self {
            version: read(&fields::VERSION)? as u8,
            humidity: read(&fields::HUMIDITY)? as u8,
            illuminance: read(&fields::ILLUMINANCE)? as u8,
            radon_short_term_avg: read(&fields::RADON_SHORT_TERM_AVG)?,
            radon_long_term_avg: read(&fields::RADON_LONG_TERM_AVG)?,
            temperature: read(&fields::TEMPERATURE)?,
            relative_pressure: read(&fields::RELATIVE_PRESSURE)?,
            co2: read(&fields::CO2)?,
            voc: read(&fields::VOC)?,
        };

        debug!("Parsed telemetry record: {:?}", record);

        Ok(record)
    }

    /// Check that this record uses the supported version.
    pub fn check_version(&self) -> Result<()> {
        if self.version != SUPPORTED_RECORD_VERSION {
            return Err(Error::UnsupportedVersion {
                version: self.version,
                expected: SUPPORTED_RECORD_VERSION,
            });
        }
        Ok(())
    }

    /// Encode the record into its 16-byte wire form.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0] = self.version;
        out[1] = self.humidity;
        out[2] = self.illuminance;
        out[4..6].copy_from_slice(&self.radon_short_term_avg.to_le_bytes());
        out[6..8].copy_from_slice(&self.radon_long_term_avg.to_le_bytes());
        out[8..10].copy_from_slice(&self.temperature.to_le_bytes());
        out[10..12].copy_from_slice(&self.relative_pressure.to_le_bytes());
        out[12..14].copy_from_slice(&self.co2.to_le_bytes());
        out[14..16].copy_from_slice(&self.voc.to_le_bytes());
        out
    }
}

/// Validate a raw radon average, returning it in Bq/m³.
pub fn radon_value(field: &FieldSpec, raw: u16) -> Result<f32> {
    if raw > RADON_MAX_VALID {
        return Err(Error::RadonOutOfRange {
            field: field.name,
            value: raw,
        });
    }
    Ok(field.scaled(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_bytes() -> Vec<u8> {
        vec![
            0x01, // version
            0x5A, // humidity 90 -> 45.0 %
            0x14, // illuminance 20
            0x00, // reserved
            0x2A, 0x00, // radon 24h 42
            0x1F, 0x00, // radon long-term 31
            0x06, 0x08, // temperature 2054 -> 20.54 °C
            0xC2, 0xC5, // pressure 50626 -> 1012.52 hPa
            0x20, 0x03, // co2 800
            0x7D, 0x00, // voc 125
            0x00, 0x00, 0x00, 0x00, // reserved
        ]
    }

    #[test]
    fn test_parse_record() {
        let record = TelemetryRecord::parse(&sample_bytes()).unwrap();
        assert_eq!(
            record,
            TelemetryRecord {
                version: 1,
                humidity: 90,
                illuminance: 20,
                radon_short_term_avg: 42,
                radon_long_term_avg: 31,
                temperature: 2054,
                relative_pressure: 50626,
                co2: 800,
                voc: 125,
            }
        );
        assert!(record.check_version().is_ok());
    }

    #[test]
    fn test_parse_without_trailing_reserved_bytes() {
        let data = sample_bytes();
        let full = TelemetryRecord::parse(&data).unwrap();
        let short = TelemetryRecord::parse(&data[..RECORD_LEN]).unwrap();
        assert_eq!(full, short);
    }

    #[test]
    fn test_parse_too_short() {
        let data = sample_bytes();
        let result = TelemetryRecord::parse(&data[..RECORD_LEN - 1]);
        assert!(matches!(result, Err(Error::InvalidData { .. })));
        assert!(TelemetryRecord::parse(&[]).is_err());
    }

    #[test]
    fn test_check_version() {
        let mut data = sample_bytes();
        data[0] = 2;
        let record = TelemetryRecord::parse(&data).unwrap();
        assert!(matches!(
            record.check_version(),
            Err(Error::UnsupportedVersion {
                version: 2,
                expected: 1
            })
        ));
    }

    #[test]
    fn test_field_table_layout() {
        let mut end = 0;
        for field in fields::ALL.iter() {
            assert!(field.offset >= end, "{} overlaps previous field", field.name);
            end = field.offset + field.width;
        }
        assert_eq!(end, RECORD_LEN);
    }

    #[test]
    fn test_read_raw_byte_order() {
        let data = [0x12, 0x34];
        let le = FieldSpec::le("le", 0, 2, 1.0);
        let be = FieldSpec {
            byte_order: ByteOrder::Big,
            ..le
        };
        assert_eq!(le.read_raw(&data), Some(0x3412));
        assert_eq!(be.read_raw(&data), Some(0x1234));
        assert_eq!(le.read_raw(&data[..1]), None);
    }

    #[test]
    fn test_scaling() {
        assert!((fields::HUMIDITY.scaled(91) - 45.5).abs() < 0.001);
        assert!((fields::TEMPERATURE.scaled(2054) - 20.54).abs() < 0.001);
        assert!((fields::RELATIVE_PRESSURE.scaled(50626) - 1012.52).abs() < 0.01);
    }

    #[test]
    fn test_radon_value_bounds() {
        let field = fields::RADON_SHORT_TERM_AVG;
        assert_eq!(radon_value(&field, 0).unwrap(), 0.0);
        assert_eq!(radon_value(&field, RADON_MAX_VALID).unwrap(), 16383.0);
        assert!(matches!(
            radon_value(&field, RADON_MAX_VALID + 1),
            Err(Error::RadonOutOfRange {
                field: "radon_short_term_avg",
                value: 16384
            })
        ));
    }

    #[test]
    fn test_to_bytes_matches_wire_layout() {
        let data = sample_bytes();
        let record = TelemetryRecord::parse(&data).unwrap();
        assert_eq!(&record.to_bytes()[..], &data[..RECORD_LEN]);
    }
}
