use std::{path::PathBuf, sync::Arc};

use adana_backend::{analyze, CoverageStore, Interpreter};
use adana_utils::cache::label_for;
use clap::Parser;
use eyre::{bail, Result};

use crate::{
    cmd::{coverage_name, instrument_file, summary_lines},
    opts::{CacheOpts, InstrumentOpts},
};

/// CLI arguments for `adana run`.
#[derive(Clone, Debug, Parser)]
pub struct RunArgs {
    /// The program to execute.
    pub file: PathBuf,

    /// Do not print the coverage summary after the run.
    #[arg(long, short)]
    pub quiet: bool,

    #[command(flatten)]
    pub instrument: InstrumentOpts,

    #[command(flatten)]
    pub cache: CacheOpts,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let Self { file, quiet, instrument, cache } = self;
        let (program, metadata) = instrument_file(&file, &instrument)?;

        let store = Arc::new(CoverageStore::new());
        let mut interpreter = Interpreter::new(store.clone());
        let result = interpreter.run(&program);
        for line in interpreter.take_output() {
            println!("{line}");
        }

        // counters reached before a throw are still recorded
        let raw = store.snapshot(&coverage_name(&file)).unwrap_or_default();
        let label = label_for(&file);
        cache.metadata_cache()?.save_cache(label.clone(), &metadata)?;
        cache.coverage_cache()?.save_cache(label, &raw)?;

        if !quiet {
            for line in summary_lines(&analyze(&raw, &metadata)?) {
                eprintln!("{line}");
            }
        }

        if let Err(err) = result {
            bail!("{} failed: {err}", file.display());
        }
        Ok(())
    }
}
