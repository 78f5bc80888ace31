mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use telelink_peer::PeerConfig;

use crate::cmd::{load_registry, Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "telelink", version, about = "Telemetry link frame tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Extra message definitions: a catalog file or a directory of them.
    #[arg(long, value_name = "PATH", env = "TELELINK_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// System id stamped on outgoing frames.
    #[arg(long, env = "TELELINK_SYSTEM_ID", default_value = "255", global = true)]
    system_id: u8,

    /// Component id stamped on outgoing frames.
    #[arg(long, env = "TELELINK_COMPONENT_ID", default_value = "1", global = true)]
    component_id: u8,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = load_registry(cli.catalog.as_ref()).and_then(|registry| {
        let ctx = Context {
            format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
            registry: Arc::new(registry),
            peer: PeerConfig {
                system_id: cli.system_id,
                component_id: cli.component_id,
                ..PeerConfig::default()
            },
        };
        cmd::run(cli.command, &ctx)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
