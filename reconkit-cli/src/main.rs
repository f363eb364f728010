//! reconkit CLI - reconcile two tabular sources from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logger;
mod output;

use commands::{logs, normalize, preview, reconcile};

/// reconkit - match two tables by key and classify every row
#[derive(Parser)]
#[command(name = "rk", version, about, long_about = None)]
struct Cli {
    /// Print more diagnostics to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header and first rows of a delimited file
    Preview {
        /// Path to the file
        file: PathBuf,
        /// Number of rows to show
        #[arg(long, short = 'n', default_value_t = 3)]
        rows: usize,
        /// Field delimiter (e.g. ",", ";", "tab")
        #[arg(long)]
        delimiter: Option<String>,
        /// Also total this amount column over the whole file
        #[arg(long)]
        amount: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile source A against source B
    Reconcile(Box<reconcile::ReconcileArgs>),

    /// Parse a single value the way the loader does
    Normalize {
        #[command(subcommand)]
        command: normalize::NormalizeCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Preview { .. } => "preview",
            Commands::Reconcile(_) => "reconcile",
            Commands::Normalize { .. } => "normalize",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let event_log = commands::get_logger();
    logger::init(cli.verbose, commands::get_logger());

    let command = cli.command.name();
    let result = run(cli);

    match result {
        Ok(()) => {
            commands::log_event(&event_log, reconkit_core::LogEvent::new("command_executed").with_command(command));
            ExitCode::SUCCESS
        }
        Err(e) => {
            commands::log_event(
                &event_log,
                reconkit_core::LogEvent::new("command_failed")
                    .with_command(command)
                    .with_error(e.to_string())
                    .with_error_details(format!("{:#}", e)),
            );
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Preview { file, rows, delimiter, amount, json } => {
            preview::run(&file, rows, delimiter.as_deref(), amount.as_deref(), json)
        }
        Commands::Reconcile(args) => reconcile::run(*args),
        Commands::Normalize { command } => normalize::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
