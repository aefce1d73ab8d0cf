use std::{borrow::Borrow, fmt, sync::Arc};

use adana_syntax::{ast::Node, Loc};
use serde::{Deserialize, Serialize};

use super::EntryKind;
use crate::error::{Error, Result};

/// Tag of branch arms that have no source code of their own.
pub const IMPLICIT_ARM_TAG: char = 'i';

/// Identity of a coverable unit within one file, derived from its kind and source range.
///
/// Rendered as `{tag}:{start line}:{start column}:{end line}:{end column}`, where the tag is
/// `s`, `b` or `f` for statements, branch arms and functions. Branch arms with no code of their
/// own (a created `else`, a loop exit, an unmatched `switch`, a `try` without `catch`) are
/// located at their construct and tagged `i`, since an enclosing construct may use that same
/// range for one of its explicit arms.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageKey(Arc<str>);

impl CoverageKey {
    pub fn new(kind: EntryKind, loc: &Loc) -> Self {
        Self::tagged(kind.tag(), loc)
    }

    /// Key of an implicit branch arm located at its construct.
    pub fn implicit_arm(loc: &Loc) -> Self {
        Self::tagged(IMPLICIT_ARM_TAG, loc)
    }

    fn tagged(tag: char, loc: &Loc) -> Self {
        Self(Arc::from(format!(
            "{}:{}:{}:{}:{}",
            tag,
            loc.start.line,
            loc.start.column,
            loc.end.line,
            loc.end.column
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_arc(&self) -> &Arc<str> {
        &self.0
    }
}

impl From<Arc<str>> for CoverageKey {
    fn from(key: Arc<str>) -> Self {
        Self(key)
    }
}

impl From<&str> for CoverageKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl Borrow<str> for CoverageKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoverageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of the unit of `kind` located at `node`. Fails for nodes without source location.
pub fn key(kind: EntryKind, node: &Node) -> Result<CoverageKey> {
    let loc = node.loc.as_ref().ok_or(Error::InvalidNode { node: node.id, kind })?;
    Ok(CoverageKey::new(kind, loc))
}

#[cfg(test)]
mod tests {
    use adana_syntax::Position;

    use super::*;

    fn loc() -> Loc {
        Loc::new(Position::new(3, 4), Position::new(5, 1))
    }

    #[test]
    fn test_key_format() {
        let node = Node::new(loc());
        assert_eq!(key(EntryKind::Statement, &node).unwrap().as_str(), "s:3:4:5:1");
        assert_eq!(key(EntryKind::Branch, &node).unwrap().as_str(), "b:3:4:5:1");
        assert_eq!(key(EntryKind::Function, &node).unwrap().as_str(), "f:3:4:5:1");
    }

    #[test]
    fn test_implicit_arm_key_differs_from_explicit() {
        let implicit = CoverageKey::implicit_arm(&loc());
        assert_eq!(implicit.as_str(), "i:3:4:5:1");
        assert_ne!(implicit, CoverageKey::new(EntryKind::Branch, &loc()));
    }

    #[test]
    fn test_key_depends_only_on_location() {
        let a = Node::new(loc());
        let b = Node::new(loc());
        assert_ne!(a.id, b.id);
        assert_eq!(key(EntryKind::Statement, &a).unwrap(), key(EntryKind::Statement, &b).unwrap());
    }

    #[test]
    fn test_key_without_location_fails() {
        let node = Node::synthetic();
        let err = key(EntryKind::Branch, &node).unwrap_err();
        assert!(matches!(err, Error::InvalidNode { kind: EntryKind::Branch, .. }));
    }

    #[test]
    fn test_key_serializes_as_string() {
        let key = CoverageKey::new(EntryKind::Function, &loc());
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"f:3:4:5:1\"");
    }
}
