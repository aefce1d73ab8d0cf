//! Executing instrumented programs and collecting their counts.

mod interpreter;
mod store;
mod value;

pub use interpreter::{Control, Interpreter, RuntimeError, MAX_CALL_DEPTH};
pub use store::{global_store, CoverageStore, RawCoverage};
pub use value::{number_to_string, Object, ObjectKind, Value};
