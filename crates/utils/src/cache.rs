use std::{
    fs,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use eyre::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Version stamped into every cache file. Files written by another version are discarded.
const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct CachePath {
    root: Option<PathBuf>,
}

impl CachePath {
    /// New cache path.
    pub fn new(root: Option<impl Into<PathBuf>>) -> Self {
        Self { root: root.map(Into::into) }
    }

    /// Returns the path to adana's cache dir: `~/.adana/cache` by default.
    pub fn adana_cache_dir(&self) -> Option<PathBuf> {
        self.root.clone().or_else(|| dirs_next::home_dir().map(|p| p.join(".adana").join("cache")))
    }

    /// Returns the path to the instrumentation metadata cache dir: `<cache_root>/metadata`.
    pub fn metadata_cache_dir(&self) -> Option<PathBuf> {
        Some(self.adana_cache_dir()?.join("metadata"))
    }

    /// Returns the path to the raw coverage cache dir: `<cache_root>/coverage`.
    pub fn coverage_cache_dir(&self) -> Option<PathBuf> {
        Some(self.adana_cache_dir()?.join("coverage"))
    }
}

/// Cache label of a source file: its absolute path with every separator flattened, so that
/// `src/a.js` and `lib/a.js` never share an entry.
pub fn label_for(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let label: String = path
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') { c } else { '_' })
        .collect();
    label.trim_start_matches('_').to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheWrapper<T> {
    pub data: T,
    pub version: String,
}

impl<T> CacheWrapper<T> {
    pub fn new(data: T) -> Self {
        Self { data, version: CACHE_VERSION.to_string() }
    }

    pub fn is_stale(&self) -> bool {
        self.version != CACHE_VERSION
    }
}

/// A cache manager that stores data in the file system.
///  - `T` is the type of the data to be cached.
///  - `cache_dir` is the directory where the cache files are stored. If it is `None`, nothing is
///    ever loaded or saved.
#[derive(Debug, Clone)]
pub struct Cache<T> {
    cache_dir: Option<PathBuf>,
    phantom: PhantomData<T>,
}

impl<T> Cache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(cache_dir: Option<impl Into<PathBuf>>) -> Result<Self> {
        let cache_dir = cache_dir
            .map(|p| {
                let p = p.into();
                fs::create_dir_all(&p)?;
                Ok::<_, std::io::Error>(p)
            })
            .transpose()?;

        Ok(Self { cache_dir, phantom: PhantomData })
    }

    pub fn cache_dir(&self) -> Option<&PathBuf> {
        self.cache_dir.as_ref()
    }

    fn cache_file(&self, label: impl Into<String>) -> Option<PathBuf> {
        Some(self.cache_dir()?.join(format!("{}.json", label.into())))
    }

    pub fn load_cache(&self, label: impl Into<String>) -> Option<T> {
        let cache_file = self.cache_file(label)?;
        trace!("loading cache: {:?}", cache_file);
        if !cache_file.exists() {
            return None;
        }

        let content = fs::read_to_string(&cache_file).ok()?;
        let cache: CacheWrapper<_> = if let Ok(cache) = serde_json::from_str(&content) {
            cache
        } else {
            warn!("the cache file has been corrupted: {:?}", cache_file);
            let _ = fs::remove_file(&cache_file); // we do not care about the result
            return None;
        };

        if cache.is_stale() {
            trace!("the cache file was written by adana {}: {:?}", cache.version, cache_file);
            let _ = fs::remove_file(&cache_file);
            None
        } else {
            trace!("hit the cache: {:?}", cache_file);
            Some(cache.data)
        }
    }

    pub fn save_cache(&self, label: impl Into<String>, data: &T) -> Result<()> {
        if let Some(cache_file) = self.cache_file(label) {
            trace!("saving cache: {:?}", cache_file);

            let cache = CacheWrapper::new(data);
            let content = serde_json::to_string(&cache)?;
            fs::write(&cache_file, content)?;
        }
        Ok(())
    }
}
