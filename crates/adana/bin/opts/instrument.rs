use adana_backend::InstrumentOptions;
use clap::Parser;
use serde::Serialize;

/// Which kinds of coverage to collect.
#[derive(Clone, Debug, Default, Serialize, Parser)]
pub struct InstrumentOpts {
    /// Do not count statements.
    #[clap(long)]
    pub no_statements: bool,

    /// Do not count branches.
    #[clap(long)]
    pub no_branches: bool,

    /// Do not count function entries.
    #[clap(long)]
    pub no_functions: bool,
}

impl InstrumentOpts {
    pub fn options(&self) -> InstrumentOptions {
        InstrumentOptions {
            statements: !self.no_statements,
            branches: !self.no_branches,
            functions: !self.no_functions,
        }
    }
}
