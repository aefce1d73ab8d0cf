use std::path::PathBuf;

use adana_backend::{Metadata, RawCoverage};
use adana_utils::cache::{Cache, CachePath};
use clap::Parser;
use eyre::{OptionExt, Result};
use serde::Serialize;

#[derive(Clone, Debug, Default, Serialize, Parser)]
pub struct CacheOpts {
    /// The root directory for the cache. If not provided, the default is `~/.adana/cache`.
    #[clap(long, env = "ADANA_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl CacheOpts {
    pub fn cache_path(&self) -> CachePath {
        CachePath::new(self.cache_dir.clone())
    }

    pub fn metadata_cache(&self) -> Result<Cache<Metadata>> {
        let dir = self.cache_path().metadata_cache_dir().ok_or_eyre("no home directory to cache in")?;
        Cache::new(Some(dir))
    }

    pub fn coverage_cache(&self) -> Result<Cache<RawCoverage>> {
        let dir = self.cache_path().coverage_cache_dir().ok_or_eyre("no home directory to cache in")?;
        Cache::new(Some(dir))
    }
}
