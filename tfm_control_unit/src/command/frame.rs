//! Typed tokenizer for operator records.
//!
//! A record is the text before the `Z` terminator:
//!
//! ```text
//! <opcode>,<twist>,<initial_len>,<tube_diam>,<draw_ratio>,<fr_pitch>,<coil_pitch>,<mandrel_diam>
//! ```
//!
//! [`FrameFields::tokenize`] splits it once and hands out each field as a
//! [`FieldValue`], so the parser decides per policy what a bad field means.

use heapless::Vec;
use thiserror::Error;
use tfm_common::consts::{FRAME_DELIMITER, FRAME_FIELD_COUNT, FRAME_TERMINATOR};

/// Field names in record order, used in diagnostics.
pub const FIELD_NAMES: [&str; FRAME_FIELD_COUNT] = [
    "opcode",
    "twist_angle_deg",
    "initial_length_mm",
    "tube_diameter_mm",
    "draw_ratio",
    "fr_pitch_mm",
    "coil_pitch_mm",
    "mandrel_diam_mm",
];

/// Reasons a record is rejected under the strict frame policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("expected {expected} fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("field {index} ({name}) is empty")]
    EmptyField { index: usize, name: &'static str },

    #[error("field {index} ({name}) is not a finite number")]
    InvalidNumber { index: usize, name: &'static str },
}

/// Interpretation of one numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(f64),
    /// Present but blank.
    Empty,
    /// Record ended before this field.
    Missing,
    /// Present but not a finite number (`inf` and `NaN` included).
    Invalid,
}

/// Locate the first terminated record in `input`.
///
/// Returns the record text and the number of bytes it occupies including
/// the terminator, or `None` if no terminator has arrived yet.
pub fn find_record(input: &str) -> Option<(&str, usize)> {
    let end = input.find(FRAME_TERMINATOR)?;
    Some((&input[..end], end + FRAME_TERMINATOR.len_utf8()))
}

/// Fields of one record, whitespace-trimmed.
#[derive(Debug, Clone)]
pub struct FrameFields<'a> {
    fields: Vec<&'a str, FRAME_FIELD_COUNT>,
    /// Number of fields in the record, including any beyond the eighth.
    total: usize,
}

impl<'a> FrameFields<'a> {
    pub fn tokenize(record: &'a str) -> Self {
        let mut fields = Vec::new();
        let mut total = 0;
        for field in record.trim().split(FRAME_DELIMITER) {
            total += 1;
            // Fields past the eighth are only counted.
            let _ = fields.push(field.trim());
        }
        Self { fields, total }
    }

    #[inline]
    pub fn field_count(&self) -> usize {
        self.total
    }

    /// Opcode text; empty when the record is blank.
    #[inline]
    pub fn opcode(&self) -> &'a str {
        self.fields.first().copied().unwrap_or("")
    }

    /// Numeric field at `index` (1..=7).
    pub fn value(&self, index: usize) -> FieldValue {
        match self.fields.get(index) {
            None => FieldValue::Missing,
            Some(text) if text.is_empty() => FieldValue::Empty,
            Some(text) => match text.parse::<f64>() {
                Ok(v) if v.is_finite() => FieldValue::Number(v),
                _ => FieldValue::Invalid,
            },
        }
    }

    /// Require exactly [`FRAME_FIELD_COUNT`] fields.
    pub fn check_count(&self) -> Result<(), FrameError> {
        if self.total == FRAME_FIELD_COUNT {
            Ok(())
        } else {
            Err(FrameError::FieldCount {
                expected: FRAME_FIELD_COUNT,
                actual: self.total,
            })
        }
    }
}
