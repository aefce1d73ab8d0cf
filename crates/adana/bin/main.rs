#[macro_use]
extern crate tracing;

mod args;
mod cmd;
mod opts;
mod utils;

use args::{AdanaArgs, AdanaSubcommand};
use clap::Parser;
use eyre::Result;

fn main() -> Result<()> {
    utils::install_error_handler();
    utils::subscriber();
    utils::enable_paint();

    let opts = AdanaArgs::parse();

    match opts.cmd {
        AdanaSubcommand::Instrument(cmd) => cmd.run(),
        AdanaSubcommand::Run(cmd) => cmd.run(),
        AdanaSubcommand::Report(cmd) => cmd.run(),
    }
}
