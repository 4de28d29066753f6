use clap::Parser;
use iiko_report::args::{Args, Command};
use iiko_report::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // This allows for running the program without an iiko server. When IIKO_REPORT_IN_TEST_MODE
    // is set and non-zero in length, then the mode will be Mode::Test, otherwise it will be
    // Mode::Iiko.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::Bases => commands::bases(Config::load(home).await?).await?.print(),

        Command::Ledger(report_args) => {
            let config = Config::load(home).await?;
            commands::ledger(config, report_args.clone(), mode)
                .await?
                .print()
        }

        Command::Pivot(report_args) => {
            let config = Config::load(home).await?;
            commands::pivot(config, report_args.clone(), mode)
                .await?
                .print()
        }

        Command::Writeoff(report_args) => {
            let config = Config::load(home).await?;
            commands::writeoff(config, report_args.clone(), mode)
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
