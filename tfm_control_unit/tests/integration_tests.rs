//! Integration tests for the TFM Control Unit.
//!
//! These drive the full tick (ingest, dispatch, safety, stepping) against
//! the simulated drive bank and limit switches.

mod integration;
