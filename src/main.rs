use clap::Parser;
use receipt_sync::args::{Args, Command, SettingsAction};
use receipt_sync::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
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
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().receipt_home().path();

    // This allows for testing the program without calling Gemini or a webhook. When
    // RECEIPT_SYNC_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::Live.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::Settings(settings_args) => {
            let config = Config::load(home).await?;
            match settings_args.action() {
                SettingsAction::Save(save) => {
                    commands::settings_save(config, save.webhook(), save.sheet())
                        .await?
                        .print()
                }
                SettingsAction::Show => commands::settings_show(config).await?.print(),
            }
        }

        Command::TestConnection => {
            let config = Config::load(home).await?;
            commands::test_connection(config, mode).await?.print()
        }

        Command::Analyze(analyze_args) => {
            let config = Config::load(home).await?;
            commands::analyze(config, mode, analyze_args.image())
                .await?
                .print_json()
        }

        Command::Scan(scan_args) => {
            let config = Config::load(home).await?;
            commands::scan(config, mode, scan_args.clone())
                .await?
                .print()
        }

        Command::Setup => commands::setup().print(),
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
            // RUST_LOG does not exist; use default log level for this package only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
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
