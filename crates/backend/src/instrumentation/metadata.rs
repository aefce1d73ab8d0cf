use std::fmt;

use adana_syntax::{ast::LogicalOp, Loc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::CoverageKey;
use crate::error::{Error, Result};

/// Kind of a coverable unit.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    Statement,
    Branch,
    Function,
}

impl EntryKind {
    /// Tag used in coverage keys.
    pub fn tag(self) -> char {
        match self {
            Self::Statement => 's',
            Self::Branch => 'b',
            Self::Function => 'f',
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The decision point a branch arm belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum BranchKind {
    If,
    Conditional,
    Logical { operator: LogicalOp },
    Switch,
    While,
    DoWhile,
    Try,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchGroup {
    pub id: GroupId,
    pub kind: BranchKind,
    pub loc: Loc,
    pub arms: u32,
}

/// Position of a branch arm within its group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSlot {
    pub group_id: GroupId,
    pub branch_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub key: CoverageKey,
    pub kind: EntryKind,
    pub loc: Loc,
    /// Declared or binding name of a function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchSlot>,
}

/// Everything instrumented in one file, in visitation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub filename: String,
    pub entries: Vec<CoverageEntry>,
    pub groups: Vec<BranchGroup>,
}

impl Metadata {
    pub fn new(filename: impl Into<String>) -> Self {
        Self { filename: filename.into(), ..Default::default() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_of(&self, kind: EntryKind) -> impl Iterator<Item = &CoverageEntry> + '_ {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }

    pub fn group(&self, id: GroupId) -> Option<&BranchGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub(crate) fn push_group(&mut self, kind: BranchKind, loc: Loc, arms: u32) -> GroupId {
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(BranchGroup { id, kind, loc, arms });
        id
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| Error::MalformedMetadata(err.to_string()))
    }

    /// Decode metadata, rejecting unknown entry kinds and missing fields.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::MalformedMetadata(err.to_string()))
    }
}
