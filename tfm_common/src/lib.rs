//! TFM Common Library
//!
//! Shared constants, data types and configuration loading for the
//! tube-forming machine workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Frame format, axis count and built-in machine constants
//! - [`config`] - TOML machine configuration and validation
//! - [`state`] - Mode, axis identifiers and limit sensor flags
//! - [`process`] - Operator parameters and derived process geometry
//! - [`hal`] - Traits implemented by axis drives and limit inputs
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod process;
pub mod state;
