//! lpac-bridge - runs an eSIM engine against an AT-command modem.
//!
//! This is the binary entry point. See the `lpac_bridge` library for the
//! bridge itself.

use anyhow::{Context, Result};
use clap::Parser;
use lpac_bridge::{constants, discovery, open_backend, Config, EngineCommand, RequestBridge};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Environment variable naming a file to write logs to instead of stderr.
const LOG_FILE_VAR: &str = "LPAC_BRIDGE_LOG_FILE";

/// Exit code for setup and bridge-level failures.
const FAILURE_EXIT_CODE: i32 = -1;

#[derive(Parser, Debug)]
#[command(name = "lpac-bridge")]
#[command(version, about = "Stdio APDU backend bridge for AT-command modems", long_about = None)]
struct Cli {
    /// Engine executable to launch
    #[arg(long, env = "LPAC_BRIDGE_ENGINE")]
    engine: Option<String>,

    /// Arguments forwarded verbatim to the engine
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn init_logging() {
    let builder_env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(builder_env);
    builder.format_timestamp_secs();

    // Stdout mirrors engine traffic, so logs never go there.
    match std::env::var(LOG_FILE_VAR) {
        Ok(path) => match std::fs::File::create(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Failed to create log file at {path:?}: {e}");
                builder.target(env_logger::Target::Stderr);
            }
        },
        Err(_) => {
            builder.target(env_logger::Target::Stderr);
        }
    }
    builder.init();
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load()?;
    log::debug!("Loaded config: {config:?}");

    if discovery::is_listing_request(cli.args.as_slice()) {
        let mut backend = open_backend(&config, false)?;
        let items = backend.list_backends();
        log::info!("Discovered {} backend(s)", items.len());
        let listing = discovery::listing_response(&items)
            .context("Failed to encode backend listing")?;
        println!("{listing}");
        return Ok(0);
    }

    let backend = open_backend(&config, true)?;
    let program = cli.engine.unwrap_or_else(constants::default_engine);
    let engine = EngineCommand::new(program, cli.args);

    let mut bridge = RequestBridge::new(backend);
    bridge.run(&engine)
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("{e:#}");
            FAILURE_EXIT_CODE
        }
    };
    std::process::exit(code);
}
