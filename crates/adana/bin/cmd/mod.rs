pub mod instrument;
pub mod report;
pub mod run;

use std::{fs, path::Path};

use adana_backend::{CoverageReport, Instrumenter, Metadata, Tally};
use adana_syntax::{ast::Program, parse};
use eyre::{Result, WrapErr};
use yansi::Paint;

use crate::opts::InstrumentOpts;

/// Name a file's counters are recorded under.
pub fn coverage_name(path: &Path) -> String {
    path.display().to_string()
}

/// Read, parse and instrument one source file.
pub fn instrument_file(path: &Path, opts: &InstrumentOpts) -> Result<(Program, Metadata)> {
    let source = fs::read_to_string(path).wrap_err_with(|| format!("cannot read {}", path.display()))?;
    let mut program = parse(&source).wrap_err_with(|| format!("cannot parse {}", path.display()))?;
    let metadata = Instrumenter::new(coverage_name(path))
        .with_options(opts.options())
        .instrument(&mut program)?;
    debug!(file = %path.display(), entries = metadata.len(), "instrumented");
    Ok((program, metadata))
}

fn tally_line(label: &str, tally: &Tally) -> String {
    let percent = format!("{:>6.2}%", tally.percent);
    let percent = if tally.covered == tally.total {
        percent.green().to_string()
    } else if tally.covered == 0 {
        percent.red().to_string()
    } else {
        percent.yellow().to_string()
    };
    format!("{label:<11}{percent} ({}/{})", tally.covered, tally.total)
}

/// Human-readable summary of a report.
pub fn summary_lines(report: &CoverageReport) -> Vec<String> {
    let summary = report.summary();
    vec![
        report.filename.bold().to_string(),
        tally_line("statements", &summary.statements),
        tally_line("branches", &summary.branches),
        tally_line("functions", &summary.functions),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        fs::write(&path, "let a = 1;\nif (a) { a = 2; }").unwrap();

        let (_, metadata) = instrument_file(&path, &InstrumentOpts::default()).unwrap();
        assert_eq!(metadata.filename, coverage_name(&path));
        assert!(!metadata.is_empty());

        let opts = InstrumentOpts { no_branches: true, ..Default::default() };
        let (_, statements_only) = instrument_file(&path, &opts).unwrap();
        assert!(statements_only.groups.is_empty());
    }

    #[test]
    fn test_instrument_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(instrument_file(&dir.path().join("missing.js"), &InstrumentOpts::default()).is_err());

        let path = dir.path().join("bad.js");
        fs::write(&path, "if (").unwrap();
        let err = instrument_file(&path, &InstrumentOpts::default()).unwrap_err();
        assert!(err.to_string().starts_with("cannot parse"));
    }
}
