//! # Register Block Decoder
//!
//! Data-driven decoding of register read responses.
//!
//! A device is described by a `ReadRequest` plus a list of `ScaledField`s instead of
//! bespoke code: each field names a word offset inside the block, how the words are
//! interpreted, a scale factor and a plausibility range.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::protocol::READ_RESPONSE_OVERHEAD;
use crate::error::{Rs485Error, Result};

/// How a field's register words are interpreted (big-endian words, high word first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    U16,
    I16,
    U32,
    I32,
}

impl FieldKind {
    /// Number of 16-bit registers the field spans
    pub fn words(&self) -> usize {
        match self {
            FieldKind::U16 | FieldKind::I16 => 1,
            FieldKind::U32 | FieldKind::I32 => 2,
        }
    }
}

/// One scaled value inside a register block
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScaledField {
    pub name: String,

    /// Word offset from the block's first register
    pub offset: usize,

    #[serde(default = "default_kind")]
    pub kind: FieldKind,

    /// Engineering value = raw * scale
    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default = "default_min")]
    pub min: f64,

    #[serde(default = "default_max")]
    pub max: f64,

    /// Offset or layout not yet confirmed on hardware
    #[serde(default)]
    pub provisional: bool,
}

fn default_kind() -> FieldKind { FieldKind::U16 }
fn default_scale() -> f64 { 1.0 }
fn default_min() -> f64 { f64::MIN }
fn default_max() -> f64 { f64::MAX }

impl ScaledField {
    /// Unbounded field with scale 1
    pub fn new(name: impl Into<String>, offset: usize, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            offset,
            kind,
            scale: default_scale(),
            min: default_min(),
            max: default_max(),
            provisional: false,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn provisional(mut self) -> Self {
        self.provisional = true;
        self
    }

    /// Last word offset this field touches, exclusive
    pub fn end(&self) -> usize {
        self.offset + self.kind.words()
    }
}

/// A decoded, range-checked field value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub name: String,
    pub value: f64,
}

/// Split a validated read response into its big-endian register words
///
/// # Errors
///
/// Returns `Protocol` error if the byte count field disagrees with the frame length
pub fn response_words(frame: &[u8]) -> Result<Vec<u16>> {
    if frame.len() < READ_RESPONSE_OVERHEAD {
        return Err(Rs485Error::Protocol(format!(
            "read response too short: {} bytes",
            frame.len()
        )));
    }

    let byte_count = frame[2] as usize;
    if byte_count % 2 != 0 || frame.len() != READ_RESPONSE_OVERHEAD + byte_count {
        return Err(Rs485Error::Protocol(format!(
            "byte count {} does not match frame length {}",
            byte_count,
            frame.len()
        )));
    }

    Ok(frame[3..3 + byte_count]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Decode and range-check one field from a block of register words
///
/// # Errors
///
/// Returns error if:
/// - The field reaches past the end of the block (`Protocol`)
/// - The scaled value is outside `min..=max` (`OutOfRange`)
pub fn decode_field(words: &[u16], field: &ScaledField) -> Result<Reading> {
    if field.end() > words.len() {
        return Err(Rs485Error::Protocol(format!(
            "field '{}' spans words {}..{} but block has {}",
            field.name,
            field.offset,
            field.end(),
            words.len()
        )));
    }

    if field.provisional {
        warn!(
            "Field '{}' uses an unconfirmed register layout (offset {}); verify on hardware",
            field.name, field.offset
        );
    }

    let w = &words[field.offset..field.end()];
    let raw = match field.kind {
        FieldKind::U16 => w[0] as f64,
        FieldKind::I16 => w[0] as i16 as f64,
        FieldKind::U32 => (((w[0] as u32) << 16) | w[1] as u32) as f64,
        FieldKind::I32 => ((((w[0] as u32) << 16) | w[1] as u32) as i32) as f64,
    };
    let value = raw * field.scale;

    if value < field.min || value > field.max {
        return Err(Rs485Error::OutOfRange {
            name: field.name.clone(),
            value,
            min: field.min,
            max: field.max,
        });
    }

    Ok(Reading {
        name: field.name.clone(),
        value,
    })
}

/// Decode every field; the first failure aborts the whole block
pub fn decode_fields(words: &[u16], fields: &[ScaledField]) -> Result<Vec<Reading>> {
    fields.iter().map(|field| decode_field(words, field)).collect()
}
