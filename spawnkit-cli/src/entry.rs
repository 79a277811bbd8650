//! Implements the command-line interface for `spawnkit`.

use clap::Parser;

use crate::args::CommandLineArgs;
use crate::config;
use crate::error::CliError;
use crate::events;
use crate::run;

/// Name under which crash reports are filed.
const PRODUCT_NAME: &str = "spawnkit";

/// Main entry point for `spawnkit`. Exits the process with the command's exit
/// code.
pub fn run() {
    //
    // Set up panic handler. On release builds, it will capture panic details to a
    // temporary .toml file and report a human-readable message to the screen.
    //
    human_panic::setup_panic!(
        human_panic::Metadata::new(PRODUCT_NAME, env!("CARGO_PKG_VERSION"))
            .homepage(env!("CARGO_PKG_REPOSITORY"))
    );

    let parsed_args = match CommandLineArgs::try_parse() {
        Ok(parsed_args) => parsed_args,
        Err(e) => {
            let _ = e.print();

            // clap reports `--help` and `--version` as errors too.
            let exit_code = match e.kind() {
                clap::error::ErrorKind::DisplayVersion | clap::error::ErrorKind::DisplayHelp => 0,
                _ => 2,
            };

            std::process::exit(exit_code);
        }
    };

    let exit_code = match run_with_args(&parsed_args) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("error: {err:#}");
            err.exit_code()
        }
    };

    std::process::exit(exit_code);
}

/// Loads configuration, then runs the command described by `args`. Returns the
/// command's exit code.
pub fn run_with_args(args: &CommandLineArgs) -> Result<i32, CliError> {
    let mut event_config = events::TraceEventConfig::init(&args.enabled_debug_events);

    let loaded = config::load_config(args.no_config, args.config_file.as_deref());
    if let Some(source) = loaded.error {
        let path = loaded.path.unwrap_or_default();
        if loaded.explicit_path {
            return Err(CliError::Config { path, source });
        }

        tracing::warn!("ignoring configuration from {}: {source}", path.display());
    }

    let config = loaded.config;
    if let Err(e) = event_config.enable_all(&config.debug.events) {
        tracing::warn!("{e}");
    }

    tracing::debug!(
        target: spawnkit_core::trace_categories::SPAWN,
        "enabled trace events: {:?}",
        event_config.get_enabled_events()
    );

    let options = config.to_run_options(args)?;
    run::run_command(
        &args.command,
        &options,
        args.stdin.as_deref(),
        args.stdout.as_deref(),
        args.stderr.as_deref(),
    )
}
