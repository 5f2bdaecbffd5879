pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod sheet;
pub mod shutdown;
pub mod source;
pub mod sync;
pub mod watch;

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use cli::{Cli, Commands, SyncArgs};
use config::{load_config, SyncConfig, Trigger};
use error::Result;
use sheet::{load_access_token, GoogleSheetsClient};
use shutdown::{listen_for_signals, Shutdown};
use source::{DirectorySource, InputWatcher, RowSource};
use sync::{PassReport, SyncDriver};
use watch::WatchLoop;

pub const EXIT_OK: u8 = 0;
pub const EXIT_ROW_ERRORS: u8 = 1;
pub const EXIT_FATAL: u8 = 2;

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let code = match cli.command {
        Commands::Sync(args) => runtime.block_on(run_sync(args)),
    };
    ExitCode::from(code)
}

async fn run_sync(args: SyncArgs) -> u8 {
    let config = match load_config(args.config.as_deref(), &args.overrides()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{}", e);
            return EXIT_FATAL;
        }
    };

    let client = match build_client(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            return EXIT_FATAL;
        }
    };

    let shutdown = Shutdown::new();
    let _signals = listen_for_signals(shutdown.clone());

    let source = DirectorySource::new(
        config.input_dir.clone(),
        config.file_pattern.clone(),
        config.delimiter,
    );
    let driver = SyncDriver::new(config.clone(), client);

    let outcome = if config.watch {
        run_watch(&config, driver, source, shutdown).await
    } else {
        run_once(driver, source, &shutdown).await
    };

    match outcome {
        None => EXIT_OK,
        Some(Ok(report)) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => error!("Failed to serialize report: {}", e),
                }
            }
            if report.is_success(config.max_row_errors) {
                EXIT_OK
            } else {
                error!(
                    errored = report.errored,
                    max_row_errors = config.max_row_errors,
                    "Too many row errors"
                );
                EXIT_ROW_ERRORS
            }
        }
        Some(Err(e)) => {
            error!("{}", e);
            EXIT_FATAL
        }
    }
}

fn build_client(config: &SyncConfig) -> Result<GoogleSheetsClient> {
    let token = load_access_token(&config.credentials_path)?;
    let client = GoogleSheetsClient::new(
        &config.api_base_url,
        config.spreadsheet_id.clone(),
        token,
        config.request_timeout,
        config.max_retries,
    )?;
    Ok(client.with_request_delay(config.request_delay))
}

async fn run_once(
    driver: SyncDriver<GoogleSheetsClient>,
    mut source: DirectorySource,
    shutdown: &Shutdown,
) -> Option<Result<PassReport>> {
    let batch = match source.next_batch() {
        Ok(batch) => batch,
        Err(e) => return Some(Err(e)),
    };

    if batch.is_empty() {
        info!(dir = %source.dir().display(), "No new input files");
        return None;
    }

    Some(driver.run_pass(&batch, shutdown).await)
}

async fn run_watch(
    config: &SyncConfig,
    driver: SyncDriver<GoogleSheetsClient>,
    source: DirectorySource,
    shutdown: Shutdown,
) -> Option<Result<PassReport>> {
    let mut watch_loop = WatchLoop::new(driver, source, shutdown);

    // Keep the watcher alive for the whole loop
    let _watcher = match config.trigger {
        Trigger::Files => {
            match InputWatcher::start(&config.input_dir, config.file_pattern.clone(), config.debounce) {
                Ok((watcher, triggers)) => {
                    watch_loop = watch_loop.with_triggers(triggers);
                    Some(watcher)
                }
                Err(e) => return Some(Err(e)),
            }
        }
        Trigger::Interval => None,
    };

    watch_loop.run().await
}
