//! Protocol module for decoding sensor data.
//!
//! This module contains the Wave Plus telemetry record layout and decoder.

pub mod record;

pub use record::{
    fields, ByteOrder, FieldSpec, TelemetryRecord, RADON_MAX_VALID, RECORD_LEN,
    SUPPORTED_RECORD_VERSION,
};
