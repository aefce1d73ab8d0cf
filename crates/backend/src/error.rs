use adana_syntax::NodeId;
use thiserror::Error;

use crate::instrumentation::EntryKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A coverable node has no source location to derive its key from.
    #[error("cannot derive a {kind} coverage key for node {} without source location", node.as_u64())]
    InvalidNode { node: NodeId, kind: EntryKind },
    #[error("malformed coverage metadata: {0}")]
    MalformedMetadata(String),
}
