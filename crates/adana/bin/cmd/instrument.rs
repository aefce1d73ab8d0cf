use std::{fs, path::PathBuf};

use adana_syntax::{print, PrintOptions};
use adana_utils::{cache::label_for, init_progress, update_progress};
use clap::Parser;
use eyre::{OptionExt, Result, WrapErr};

use crate::{
    cmd::instrument_file,
    opts::{CacheOpts, InstrumentOpts},
};

/// CLI arguments for `adana instrument`.
#[derive(Clone, Debug, Parser)]
pub struct InstrumentArgs {
    /// The source files to instrument.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Write each instrumented file into this directory instead of printing it.
    #[arg(long, short, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Leave out the definition of the counter function.
    #[arg(long)]
    pub no_prelude: bool,

    #[command(flatten)]
    pub instrument: InstrumentOpts,

    #[command(flatten)]
    pub cache: CacheOpts,
}

impl InstrumentArgs {
    pub fn run(self) -> Result<()> {
        let Self { files, out_dir, no_prelude, instrument, cache } = self;
        let print_opts = PrintOptions { prelude: !no_prelude, ..Default::default() };
        let metadata_cache = cache.metadata_cache()?;

        if let Some(out_dir) = &out_dir {
            fs::create_dir_all(out_dir)
                .wrap_err_with(|| format!("cannot create {}", out_dir.display()))?;
        }

        let pb = out_dir.as_ref().map(|_| init_progress!(files, "instrumenting"));
        for (index, path) in files.iter().enumerate() {
            let (program, metadata) = instrument_file(path, &instrument)?;
            let code = print(&program, &print_opts);
            metadata_cache.save_cache(label_for(path), &metadata)?;

            match &out_dir {
                Some(out_dir) => {
                    let name = path.file_name().ok_or_eyre("source path has no file name")?;
                    let target = out_dir.join(name);
                    fs::write(&target, code)
                        .wrap_err_with(|| format!("cannot write {}", target.display()))?;
                    trace!(source = %path.display(), target = %target.display(), "written");
                }
                None => println!("{code}"),
            }

            if let Some(pb) = &pb {
                update_progress!(pb, index, path);
            }
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        Ok(())
    }
}
