//! Command processing root.
//!
//! Frame tokenizing and the opcode table that turns an operator record into
//! a [`Command`].

pub mod frame;
pub mod parser;

pub use frame::FrameError;
pub use parser::{CommandParser, ParsedFrame};

use tfm_common::process::MachineParameters;
use tfm_common::state::Mode;

/// One accepted operator command: the requested mode and the parameters
/// that replace the current set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub mode: Mode,
    pub params: MachineParameters,
}
