mod cli;
mod config;
mod listener;
mod logger;
mod server;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use crate::cli::Cli;
use crate::config::Config;
use crate::listener::ListenerSet;
use crate::logger::Logger;

// One thread of control services every listener through readiness
// dispatch; there is no worker pool.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let config = Config::from(cli);
    if let Err(e) = config.validate() {
        eprintln!("tcptrap: {e}");
        return ExitCode::FAILURE;
    }

    let logger = match &config.log_file {
        Some(path) => match Logger::to_file(path, config.log_level) {
            Ok(logger) => logger,
            Err(e) => {
                // The open failure and everything after it go to stderr.
                let fallback = Logger::to_stderr(config.log_level);
                fallback.error(&format!("Unable to open log file '{}'", path.display()));
                fallback.error(&format!("IO error: {e}"));
                return ExitCode::FAILURE;
            }
        },
        None => Logger::to_stderr(config.log_level),
    };

    match serve(&config, &logger).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: &Config, logger: &Logger) -> Result<()> {
    logger.info(&format!(
        "{} v{} ({}, {} port(s))",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.family,
        config.ports.len(),
    ));

    let set = ListenerSet::bind(config, logger).context("Startup aborted")?;

    // Flipped false exactly once, by the shutdown path inside the loop.
    let running = AtomicBool::new(true);
    server::run(set, logger, &running).await
}
