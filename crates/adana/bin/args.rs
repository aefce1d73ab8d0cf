use crate::cmd::{instrument::InstrumentArgs, report::ReportArgs, run::RunArgs};
use clap::{Parser, Subcommand};

/// Adana: source coverage for JavaScript.
#[derive(Parser, Debug)]
#[command(
    name = "adana",
    version,
    after_help = "Coverage is cached under `~/.adana/cache` unless `--cache-dir` is given.",
    next_display_order = None,
)]
pub struct AdanaArgs {
    #[command(subcommand)]
    pub cmd: AdanaSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum AdanaSubcommand {
    /// Instrument source files and print the instrumented code.
    #[command(visible_alias = "i")]
    Instrument(InstrumentArgs),

    /// Instrument and execute a file, recording its coverage.
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Report the recorded coverage of a file.
    Report(ReportArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        AdanaArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let args = AdanaArgs::try_parse_from(["adana", "report", "a.js", "--json"]).unwrap();
        assert!(matches!(args.cmd, AdanaSubcommand::Report(ref report) if report.json));

        let args =
            AdanaArgs::try_parse_from(["adana", "i", "a.js", "b.js", "--out-dir", "out"]).unwrap();
        let AdanaSubcommand::Instrument(instrument) = args.cmd else { panic!("not instrument") };
        assert_eq!(instrument.files.len(), 2);

        assert!(AdanaArgs::try_parse_from(["adana", "run"]).is_err());
    }
}
