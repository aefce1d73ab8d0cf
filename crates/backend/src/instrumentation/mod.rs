//! Source instrumentation: coverage keys, the instrumentation pass and the metadata it records.

mod instrumenter;
mod key;
mod metadata;

pub use instrumenter::{InstrumentOptions, Instrumenter, RETHROW_BINDING, THREW_BINDING};
pub use key::{key, CoverageKey, IMPLICIT_ARM_TAG};
pub use metadata::{
    BranchGroup, BranchKind, BranchSlot, CoverageEntry, EntryKind, GroupId, Metadata,
};
