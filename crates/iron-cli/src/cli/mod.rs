mod commands;
mod helpers;

use clap::Parser;
use iron_core::domain::IronError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let compatibility_error = error.as_iron_error();
            eprintln!("{}", compatibility_error.diagnostic_line());
            eprintln!("{}", compatibility_error.fatal_exit_line());
            compatibility_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "info" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(name = "iron-norm", about = "Pairwise microarray intensity normalization")]
struct Cli {
    /// Log normalization progress at info level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Scale every chip of a chip set toward a model chip
    Normalize(commands::NormalizeArgs),
    /// Clamp low intensities of every chip
    Floor(commands::FloorArgs),
    /// Convert log2 probeset values back to the linear scale
    Unlog(commands::UnlogArgs),
    /// Print the volatility-weighted mean of each chip's probesets
    WeightedMean(commands::WeightedMeanArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Normalize(args) => commands::run_normalize_command(args),
        CliCommand::Floor(args) => commands::run_floor_command(args),
        CliCommand::Unlog(args) => commands::run_unlog_command(args),
        CliCommand::WeightedMean(args) => commands::run_weighted_mean_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(IronError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_iron_error(&self) -> IronError {
        match self {
            Self::Usage(message) => IronError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => IronError::internal("IO.CLI", format!("{error:#}")),
        }
    }
}
