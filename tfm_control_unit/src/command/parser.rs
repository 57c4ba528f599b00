//! Operator command parser.
//!
//! Non-blocking: [`CommandParser::parse`] looks at whatever text the
//! transport has buffered and returns `None` until a terminator arrives.
//! A terminated record is always consumed, whether it is accepted or not.
//!
//! ## Opcode Table
//!
//! | Opcode | Mode            | Opcode | Mode            |
//! |--------|-----------------|--------|-----------------|
//! | `A`    | Home            | `G`    | JogFollowerUp   |
//! | `B`    | ColdDraw        | `H`    | JogFollowerDown |
//! | `C`    | FrLayup         | `I`    | JogRunnerUp     |
//! | `D`    | Twist           | `J`    | JogRunnerDown   |
//! | `E`    | Coil            | `K`    | Spin            |
//! | `F`    | Stop            | other  | Stop            |

use tfm_common::config::FramePolicy;
use tfm_common::process::MachineParameters;
use tfm_common::state::Mode;
use tracing::{debug, warn};

use super::Command;
use super::frame::{FIELD_NAMES, FieldValue, FrameError, FrameFields, find_record};

/// Result of parsing one terminated record.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFrame {
    /// Bytes of input the record occupied, terminator included.
    pub consumed: usize,
    pub result: Result<Command, FrameError>,
}

/// Map an opcode to its mode. Anything outside the table stops the machine.
pub fn mode_for_opcode(opcode: &str) -> Mode {
    match opcode {
        "A" => Mode::Home,
        "B" => Mode::ColdDraw,
        "C" => Mode::FrLayup,
        "D" => Mode::Twist,
        "E" => Mode::Coil,
        "F" => Mode::Stop,
        "G" => Mode::JogFollowerUp,
        "H" => Mode::JogFollowerDown,
        "I" => Mode::JogRunnerUp,
        "J" => Mode::JogRunnerDown,
        "K" => Mode::Spin,
        _ => Mode::Stop,
    }
}

/// Stateless record parser configured with a [`FramePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandParser {
    policy: FramePolicy,
}

impl CommandParser {
    pub const fn new(policy: FramePolicy) -> Self {
        Self { policy }
    }

    #[inline]
    pub const fn policy(&self) -> FramePolicy {
        self.policy
    }

    /// Parse the first terminated record in `input`.
    pub fn parse(&self, input: &str) -> Option<ParsedFrame> {
        let (record, consumed) = find_record(input)?;
        let fields = FrameFields::tokenize(record);
        let result = self.build(&fields);
        if let Err(e) = &result {
            warn!("rejected frame {:?}: {e}", record.trim());
        }
        Some(ParsedFrame { consumed, result })
    }

    fn build(&self, fields: &FrameFields<'_>) -> Result<Command, FrameError> {
        match self.policy {
            FramePolicy::Strict => fields.check_count()?,
            FramePolicy::Lenient => {
                if fields.field_count() > FIELD_NAMES.len() {
                    debug!(
                        "ignoring {} extra frame fields",
                        fields.field_count() - FIELD_NAMES.len()
                    );
                }
            }
        }

        let mut values = [0.0_f64; 7];
        for (slot, index) in values.iter_mut().zip(1..) {
            *slot = self.field(fields, index)?;
        }
        let [
            twist_angle_deg,
            initial_length_mm,
            tube_diameter_mm,
            draw_ratio,
            fr_pitch_mm,
            coil_pitch_mm,
            mandrel_diam_mm,
        ] = values;

        Ok(Command {
            mode: mode_for_opcode(fields.opcode()),
            params: MachineParameters {
                twist_angle_deg,
                initial_length_mm,
                tube_diameter_mm,
                draw_ratio,
                fr_pitch_mm,
                coil_pitch_mm,
                mandrel_diam_mm,
            },
        })
    }

    fn field(&self, fields: &FrameFields<'_>, index: usize) -> Result<f64, FrameError> {
        let name = FIELD_NAMES[index];
        match (fields.value(index), self.policy) {
            (FieldValue::Number(v), _) => Ok(v),
            (FieldValue::Empty, FramePolicy::Strict) => Err(FrameError::EmptyField { index, name }),
            (FieldValue::Invalid, FramePolicy::Strict) => {
                Err(FrameError::InvalidNumber { index, name })
            }
            // Strict has already rejected short records.
            (FieldValue::Missing, _) => {
                warn!("frame field {name} missing, using 0");
                Ok(0.0)
            }
            (FieldValue::Empty, FramePolicy::Lenient) => {
                warn!("frame field {name} empty, using 0");
                Ok(0.0)
            }
            (FieldValue::Invalid, FramePolicy::Lenient) => {
                warn!("frame field {name} not numeric, using 0");
                Ok(0.0)
            }
        }
    }
}
