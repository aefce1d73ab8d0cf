//! # adana-backend
//!
//! Adana's coverage engine: the instrumentation pass, the runtime counter store with the
//! execution host that feeds it, and the analysis turning raw counts into reports.

#[macro_use]
extern crate tracing;

pub mod analysis;
pub mod error;
pub mod instrumentation;
pub mod runtime;

pub use analysis::report::{analyze, CoverageReport, Summary, Tally};
pub use error::{Error, Result};
pub use instrumentation::{InstrumentOptions, Instrumenter, Metadata};
pub use runtime::{CoverageStore, Interpreter, RawCoverage, RuntimeError};
