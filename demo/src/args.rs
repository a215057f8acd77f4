use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Scenario {
    All,
    Crud,
    Read,
    Mars,
    Transaction,
    Prepare,
    Image,
    Xml,
}

impl Scenario {
    const ORDERED: [Scenario; 7] = [
        Scenario::Crud,
        Scenario::Read,
        Scenario::Mars,
        Scenario::Transaction,
        Scenario::Prepare,
        Scenario::Image,
        Scenario::Xml,
    ];

    /// Scenarios to run, in execution order.
    pub(crate) fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => Self::ORDERED.to_vec(),
            one => vec![one],
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "mssql-fluent walkthrough against AdventureWorks")]
pub(crate) struct Args {
    /// JSON settings file with a `ConnectionStrings` section.
    #[arg(long, default_value = "appsettings.json")]
    pub(crate) settings: PathBuf,
    /// Name of the connection string to use.
    #[arg(long, default_value = "DefaultConnection")]
    pub(crate) connection: String,
    #[arg(long, value_enum, default_value = "all")]
    pub(crate) scenario: Scenario,
    /// Also write the log to this file.
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    /// Include the library's debug events.
    #[arg(long)]
    pub(crate) verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_everything() {
        let args = Args::parse_from(["demo"]);
        assert_eq!(args.settings, PathBuf::from("appsettings.json"));
        assert_eq!(args.connection, "DefaultConnection");
        assert_eq!(args.scenario, Scenario::All);
        assert!(!args.verbose);
        assert_eq!(args.scenario.expand().len(), 7);
        assert_eq!(args.scenario.expand()[0], Scenario::Crud);
    }

    #[test]
    fn single_scenario() {
        let args = Args::parse_from(["demo", "--scenario", "mars", "--log", "demo.log", "--verbose"]);
        assert_eq!(args.scenario.expand(), vec![Scenario::Mars]);
        assert_eq!(args.log, Some(PathBuf::from("demo.log")));
        assert!(args.verbose);
    }

    #[test]
    fn unknown_scenario_is_rejected() {
        assert!(Args::try_parse_from(["demo", "--scenario", "bulk"]).is_err());
    }
}
