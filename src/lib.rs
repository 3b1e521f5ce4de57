//! Tunisian license plate recognition.
//!
//! Facade over the workspace crates: the plate engine, the shared data model
//! and the logging/metrics setup.

pub use common::plates;
pub use lpr_engine::*;
pub use telemetry;
