#[macro_use]
extern crate tracing;

pub mod cache;
pub mod progress_bar;
