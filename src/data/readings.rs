//! Decoded sensor measurements.

use tracing::warn;

use crate::error::{Error, Result};
use crate::protocol::record::{fields, radon_value, FieldSpec, TelemetryRecord};

/// The most recent measurements of a Wave Plus sensor.
///
/// Every field starts at [`SensorReadings::UNSET`] (`-1.0`) and keeps that
/// value until a record has been decoded successfully. The radon averages fall
/// back to `UNSET` whenever the sensor reports an out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorReadings {
    /// Relative humidity, %rH.
    pub humidity: f32,
    /// Light level, %.
    pub illuminance: f32,
    /// 24 hour radon average, Bq/m³.
    pub radon_short_term_avg: f32,
    /// Long-term radon average, Bq/m³.
    pub radon_long_term_avg: f32,
    /// Temperature, °C.
    pub temperature: f32,
    /// Relative atmospheric pressure, hPa.
    pub relative_atmospheric_pressure: f32,
    /// CO2 level, ppm.
    pub co2_level: f32,
    /// VOC level, ppb.
    pub voc_level: f32,
}

impl Default for SensorReadings {
    fn default() -> Self {
        Self {
            humidity: Self::UNSET,
            illuminance: Self::UNSET,
            radon_short_term_avg: Self::UNSET,
            radon_long_term_avg: Self::UNSET,
            temperature: Self::UNSET,
            relative_atmospheric_pressure: Self::UNSET,
            co2_level: Self::UNSET,
            voc_level: Self::UNSET,
        }
    }
}

impl SensorReadings {
    /// Sentinel for a value that has never been read successfully.
    pub const UNSET: f32 = -1.0;

    /// Create a reading set with every value unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if any value has been read.
    pub fn has_values(&self) -> bool {
        *self != Self::default()
    }

    /// Apply a decoded record.
    ///
    /// A record with an unsupported version is rejected before anything is
    /// written. Otherwise every field is updated; a radon average above
    /// [`RADON_MAX_VALID`](crate::protocol::RADON_MAX_VALID) is stored as
    /// [`Self::UNSET`] and reported as [`Error::RadonOutOfRange`] once the
    /// other fields have been committed.
    pub fn apply(&mut self, record: &TelemetryRecord) -> Result<()> {
        record.check_version()?;

        let mut range_error: Option<Error> = None;
        let mut radon = |field: &FieldSpec, raw: u16| match radon_value(field, raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("{}", e);
                if range_error.is_none() {
                    range_error = Some(e);
                }
                Self::UNSET
            }
        };

        let radon_short_term_avg =
            radon(&fields::RADON_SHORT_TERM_AVG, record.radon_short_term_avg);
        let radon_long_term_avg = radon(&fields::RADON_LONG_TERM_AVG, record.radon_long_term_avg);

        *self = Self {
            humidity: fields::HUMIDITY.scaled(record.humidity as u16),
            illuminance: fields::ILLUMINANCE.scaled(record.illuminance as u16),
            radon_short_term_avg,
            radon_long_term_avg,
            temperature: fields::TEMPERATURE.scaled(record.temperature),
            relative_atmospheric_pressure: fields::RELATIVE_PRESSURE
                .scaled(record.relative_pressure),
            co2_level: fields::CO2.scaled(record.co2),
            voc_level: fields::VOC.scaled(record.voc),
        };

        match range_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for SensorReadings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1} %rH {:.1} % {:.1} Bq/m3 {:.1} Bq/m3 {:.1} degC {:.1} hPa {:.1} ppm {:.1} ppb",
            self.humidity,
            self.illuminance,
            self.radon_short_term_avg,
            self.radon_long_term_avg,
            self.temperature,
            self.relative_atmospheric_pressure,
            self.co2_level,
            self.voc_level
        )
    }
}
