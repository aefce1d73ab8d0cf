use std::collections::BTreeMap;

use adana_syntax::Loc;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    instrumentation::{BranchKind, CoverageEntry, CoverageKey, EntryKind, GroupId, Metadata},
    runtime::RawCoverage,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementCoverage {
    pub key: CoverageKey,
    pub loc: Loc,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCoverage {
    pub key: CoverageKey,
    pub loc: Loc,
    pub group_id: GroupId,
    pub branch_index: u32,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCoverage {
    pub key: CoverageKey,
    pub loc: Loc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub count: u64,
}

/// Counts of one decision point, in arm order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCoverage {
    pub id: GroupId,
    pub kind: BranchKind,
    pub loc: Loc,
    pub counts: Vec<u64>,
}

/// How many units of one kind ran at least once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub covered: usize,
    pub total: usize,
    pub percent: f64,
}

impl Tally {
    fn of(counts: impl Iterator<Item = u64>) -> Self {
        let (covered, total) =
            counts.fold((0, 0), |(covered, total), count| (covered + usize::from(count > 0), total + 1));
        let percent = if total == 0 { 100.0 } else { covered as f64 * 100.0 / total as f64 };
        Self { covered, total, percent }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub statements: Tally,
    pub branches: Tally,
    pub functions: Tally,
}

/// Coverage of one file: every instrumented unit with its final count, in metadata order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub filename: String,
    pub statements: Vec<StatementCoverage>,
    pub branches: Vec<BranchCoverage>,
    pub functions: Vec<FunctionCoverage>,
    pub groups: Vec<GroupCoverage>,
}

impl CoverageReport {
    pub fn summary(&self) -> Summary {
        Summary {
            statements: Tally::of(self.statements.iter().map(|s| s.count)),
            branches: Tally::of(self.branches.iter().map(|b| b.count)),
            functions: Tally::of(self.functions.iter().map(|f| f.count)),
        }
    }

    /// Branch records keyed by the decision point they belong to.
    pub fn branches_by_group(&self) -> BTreeMap<GroupId, Vec<&BranchCoverage>> {
        let mut groups: BTreeMap<_, Vec<_>> = BTreeMap::new();
        for branch in &self.branches {
            groups.entry(branch.group_id).or_default().push(branch);
        }
        groups
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupCoverage> {
        self.groups.iter().find(|group| group.id == id)
    }
}

/// Combine the counts of one file with its metadata.
///
/// Keys without a count were never reached and report 0. Counts without a metadata entry are
/// ignored.
pub fn analyze(raw: &RawCoverage, metadata: &Metadata) -> Result<CoverageReport> {
    let mut report = CoverageReport {
        filename: metadata.filename.clone(),
        groups: metadata
            .groups
            .iter()
            .map(|group| GroupCoverage {
                id: group.id,
                kind: group.kind,
                loc: group.loc,
                counts: vec![0; group.arms as usize],
            })
            .collect(),
        ..Default::default()
    };

    for entry in &metadata.entries {
        let CoverageEntry { key, kind, loc, name, branch } = entry;
        let count = raw.get(key.as_str());
        match (kind, branch) {
            (EntryKind::Statement, None) => {
                report.statements.push(StatementCoverage { key: key.clone(), loc: *loc, count })
            }
            (EntryKind::Function, None) => report.functions.push(FunctionCoverage {
                key: key.clone(),
                loc: *loc,
                name: name.clone(),
                count,
            }),
            (EntryKind::Branch, Some(slot)) => {
                let group = report
                    .groups
                    .iter_mut()
                    .find(|group| group.id == slot.group_id)
                    .ok_or_else(|| {
                        Error::MalformedMetadata(format!(
                            "branch {key} refers to unknown group {}",
                            slot.group_id
                        ))
                    })?;
                let arms = group.counts.len();
                let arm = group.counts.get_mut(slot.branch_index as usize).ok_or_else(|| {
                    Error::MalformedMetadata(format!(
                        "branch {key} has index {} but group {} has {arms} arms",
                        slot.branch_index, slot.group_id
                    ))
                })?;
                *arm = count;
                report.branches.push(BranchCoverage {
                    key: key.clone(),
                    loc: *loc,
                    group_id: slot.group_id,
                    branch_index: slot.branch_index,
                    count,
                });
            }
            (EntryKind::Branch, None) => {
                return Err(Error::MalformedMetadata(format!("branch {key} has no group")))
            }
            (_, Some(_)) => {
                return Err(Error::MalformedMetadata(format!("{kind} {key} has a branch group")))
            }
        }
    }

    let orphans = raw.iter().filter(|(key, _)| !metadata.entries.iter().any(|e| &e.key == *key));
    for (key, count) in orphans {
        warn!(file = %metadata.filename, %key, count, "ignoring counter without metadata entry");
    }

    debug!(
        file = %metadata.filename,
        statements = report.statements.len(),
        branches = report.branches.len(),
        functions = report.functions.len(),
        "analyzed coverage"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use adana_syntax::Position;

    use super::*;
    use crate::instrumentation::BranchSlot;

    fn loc(line: u32) -> Loc {
        Loc::new(Position::new(line, 0), Position::new(line, 10))
    }

    fn entry(kind: EntryKind, line: u32, branch: Option<BranchSlot>) -> CoverageEntry {
        CoverageEntry { key: CoverageKey::new(kind, &loc(line)), kind, loc: loc(line), name: None, branch }
    }

    fn metadata() -> Metadata {
        let mut metadata = Metadata::new("a.js");
        let group_id = GroupId(0);
        metadata.groups.push(crate::instrumentation::BranchGroup {
            id: group_id,
            kind: BranchKind::If,
            loc: loc(2),
            arms: 2,
        });
        metadata.entries = vec![
            entry(EntryKind::Statement, 1, None),
            entry(EntryKind::Function, 1, None),
            entry(EntryKind::Branch, 3, Some(BranchSlot { group_id, branch_index: 0 })),
            entry(EntryKind::Branch, 4, Some(BranchSlot { group_id, branch_index: 1 })),
            entry(EntryKind::Statement, 5, None),
        ];
        metadata
    }

    #[test]
    fn test_analyze_partitions_and_counts() {
        let metadata = metadata();
        let raw: RawCoverage = [(metadata.entries[0].key.clone(), 2), (metadata.entries[2].key.clone(), 1)]
            .into_iter()
            .collect();
        let report = analyze(&raw, &metadata).unwrap();

        assert_eq!(report.filename, "a.js");
        assert_eq!(report.statements.iter().map(|s| s.count).collect::<Vec<_>>(), vec![2, 0]);
        assert_eq!(report.functions.len(), 1);
        assert_eq!(report.functions[0].count, 0);
        assert_eq!(report.branches.iter().map(|b| b.branch_index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(report.group(GroupId(0)).unwrap().counts, vec![1, 0]);
        assert_eq!(report.branches_by_group()[&GroupId(0)].len(), 2);
    }

    #[test]
    fn test_summary() {
        let metadata = metadata();
        let raw: RawCoverage = [(metadata.entries[0].key.clone(), 1)].into_iter().collect();
        let summary = analyze(&raw, &metadata).unwrap().summary();
        assert_eq!(summary.statements, Tally { covered: 1, total: 2, percent: 50.0 });
        assert_eq!(summary.branches.covered, 0);
        assert_eq!(summary.functions.total, 1);

        let empty = analyze(&RawCoverage::new(), &Metadata::new("b.js")).unwrap().summary();
        assert_eq!(empty.branches.percent, 100.0);
    }

    #[test]
    fn test_orphan_counters_are_ignored() {
        let metadata = metadata();
        let raw: RawCoverage = [(CoverageKey::from("s:99:0:99:1"), 4)].into_iter().collect();
        let report = analyze(&raw, &metadata).unwrap();
        assert!(report.statements.iter().all(|s| s.count == 0));
    }

    #[test]
    fn test_malformed_metadata() {
        let mut missing_slot = metadata();
        missing_slot.entries[2].branch = None;
        assert!(matches!(
            analyze(&RawCoverage::new(), &missing_slot),
            Err(Error::MalformedMetadata(_))
        ));

        let mut stray_slot = metadata();
        stray_slot.entries[0].branch = Some(BranchSlot { group_id: GroupId(0), branch_index: 0 });
        assert!(matches!(analyze(&RawCoverage::new(), &stray_slot), Err(Error::MalformedMetadata(_))));

        let mut unknown_group = metadata();
        unknown_group.groups.clear();
        assert!(matches!(
            analyze(&RawCoverage::new(), &unknown_group),
            Err(Error::MalformedMetadata(_))
        ));

        let mut out_of_range = metadata();
        out_of_range.groups[0].arms = 1;
        assert!(matches!(
            analyze(&RawCoverage::new(), &out_of_range),
            Err(Error::MalformedMetadata(_))
        ));
    }
}
