mod cache;
mod instrument;

pub use cache::CacheOpts;
pub use instrument::InstrumentOpts;
