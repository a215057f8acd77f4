mod args;
mod commands;
mod error;
mod logging;
mod models;
mod services;

use clap::Parser;
use tracing::Level;

use mssql_fluent::AppSettings;

use crate::args::Args;
use crate::commands::Commands;
use crate::error::{DemoError, DemoResult};
use crate::logging::LogWriter;

async fn run(args: Args) -> DemoResult<()> {
    let settings = AppSettings::from_file(&args.settings)?;
    let commands = Commands::new(&settings, &args.connection)?;
    commands.run(args.scenario).await
}

fn init_logging(args: &Args) -> DemoResult<()> {
    let writer = LogWriter::new(args.log.clone())?;
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(level)
        .try_init()
        .map_err(|e| DemoError::Logging(format!("cannot install log subscriber: {e}")))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = init_logging(&args) {
        eprintln!("failed to set up logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(args).await {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
