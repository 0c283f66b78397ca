// vaxtldr CLI - reconcile vaccination reports into one consistent series

mod exit_codes;
mod records;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "vaxtldr")]
#[command(about = "Reconcile daily and weekly vaccination reports and project them forward")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the inference pipeline over an observation CSV
    #[command(after_help = "\
Examples:
  vaxtldr run observations.csv
  vaxtldr run observations.csv --config inference.toml --output inferred.csv
  vaxtldr run observations.csv --json > result.json
  vaxtldr run observations.csv --summary public/")]
    Run {
        /// Observation CSV (origin,data_date,real_date,period,dose,group,location,vaccinated,...)
        input: PathBuf,

        /// Inference config (TOML); defaults apply when omitted
        #[arg(long, short = 'c', env = "VAXTLDR_CONFIG")]
        config: Option<PathBuf>,

        /// Write inferred observations as CSV
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Output the full result as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write latest.csv, line.csv and freshness.txt into this directory
        #[arg(long, value_name = "DIR")]
        summary: Option<PathBuf>,
    },

    /// Validate an inference config without running
    #[command(after_help = "\
Examples:
  vaxtldr validate inference.toml")]
    Validate {
        /// Path to the inference config
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("VAXTLDR_COMMIT"), ")",
        "\nbuild:   ", env!("VAXTLDR_PROFILE"),
        "\ntarget:  ", env!("VAXTLDR_TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Only the first init in a process wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { input, config, output, json, summary } => {
            run::cmd_run(input, config, output, json, summary)
        }
        Commands::Validate { config } => run::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
