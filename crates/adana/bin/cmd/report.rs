use std::path::PathBuf;

use adana_backend::{analyze, CoverageReport};
use adana_utils::cache::label_for;
use clap::Parser;
use eyre::{eyre, Result};

use crate::{cmd::summary_lines, opts::CacheOpts};

/// CLI arguments for `adana report`.
#[derive(Clone, Debug, Parser)]
pub struct ReportArgs {
    /// The source file whose recorded coverage to report.
    pub file: PathBuf,

    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub cache: CacheOpts,
}

impl ReportArgs {
    pub fn run(self) -> Result<()> {
        let json = self.json;
        let report = self.load()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            for line in summary_lines(&report) {
                println!("{line}");
            }
        }
        Ok(())
    }

    /// Analyze the cached coverage of the file. A file that was instrumented but never run
    /// reports every count as 0.
    pub fn load(&self) -> Result<CoverageReport> {
        let label = label_for(&self.file);
        let metadata = self.cache.metadata_cache()?.load_cache(label.clone()).ok_or_else(|| {
            eyre!("no instrumentation metadata cached for {}", self.file.display())
        })?;
        let raw = self.cache.coverage_cache()?.load_cache(label).unwrap_or_default();
        Ok(analyze(&raw, &metadata)?)
    }
}
