use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use telelink_peer::PeerConfig;
use telelink_schema::{MessageDescriptor, MessageRegistry};

use crate::exit::{schema_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod catalog;
pub mod decode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack one message and transmit it (or print its wire bytes).
    Send(SendArgs),
    /// Read a link device and print received messages.
    Listen(ListenArgs),
    /// Decode frames from a captured byte dump.
    Decode(DecodeArgs),
    /// List registered message definitions.
    Catalog(CatalogArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every command.
#[derive(Debug)]
pub struct Context {
    pub format: OutputFormat,
    pub registry: Arc<MessageRegistry>,
    pub peer: PeerConfig,
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, ctx),
        Command::Listen(args) => listen::run(args, ctx),
        Command::Decode(args) => decode::run(args, ctx),
        Command::Catalog(args) => catalog::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

/// Built-in messages plus any catalog file or directory given.
pub fn load_registry(catalog: Option<&PathBuf>) -> CliResult<MessageRegistry> {
    let mut registry =
        MessageRegistry::builtin().map_err(|err| schema_error("built-in catalog", err))?;

    if let Some(path) = catalog {
        let extra = MessageRegistry::from_path(path)
            .map_err(|err| schema_error(&format!("loading {}", path.display()), err))?;
        registry
            .merge(extra)
            .map_err(|err| schema_error(&format!("merging {}", path.display()), err))?;
    }

    Ok(registry)
}

/// Find a message by name (case-insensitive) or numeric id.
pub fn resolve_message<'r>(
    registry: &'r MessageRegistry,
    selector: &str,
) -> CliResult<&'r MessageDescriptor> {
    let found = match selector.parse::<u8>() {
        Ok(id) => registry.lookup(id),
        Err(_) => registry.lookup_by_name(selector),
    };
    found.ok_or_else(|| CliError::new(USAGE, format!("unknown message: {selector}")))
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Message name or id (e.g. PI_TRIGGER or 185).
    #[arg(long, short = 'm')]
    pub message: String,
    /// Field value as NAME=VALUE; repeatable. Unnamed fields are zero.
    #[arg(long = "field", short = 'f', value_name = "NAME=VALUE")]
    pub fields: Vec<String>,
    /// Link device to write to. Without it the frame is only printed.
    #[arg(long, env = "TELELINK_DEVICE")]
    pub device: Option<PathBuf>,
    /// Sequence number for a printed-only frame.
    #[arg(long, default_value = "0", conflicts_with = "device")]
    pub sequence: u8,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Link device to read from.
    #[arg(long, env = "TELELINK_DEVICE")]
    pub device: PathBuf,
    /// Only print these message ids (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub messages: Option<Vec<u8>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex dump, e.g. "FE 01 00 FF 01 B9 7B 8B 82".
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,
    /// Binary capture file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Show a single message with its field layout.
    #[arg(long, short = 'm')]
    pub message: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_by_name_or_id() {
        let registry = MessageRegistry::builtin().unwrap();
        assert_eq!(resolve_message(&registry, "185").unwrap().name(), "PI_TRIGGER");
        assert_eq!(resolve_message(&registry, "heartbeat").unwrap().id(), 0);

        let err = resolve_message(&registry, "NOPE").unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn load_registry_merges_catalog_file() {
        let dir = std::env::temp_dir().join(format!("telelink-cli-catalog-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("extra.catalog.json");
        std::fs::write(
            &path,
            r#"[{ "id": 201, "name": "RANGEFINDER_LITE", "fields": [
                { "name": "distance", "type": "float" },
                { "name": "voltage", "type": "float" } ] }]"#,
        )
        .unwrap();

        let registry = load_registry(Some(&path)).unwrap();
        assert!(registry.contains(201));
        assert!(registry.contains(185));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_registry_reports_bad_catalog() {
        let missing = PathBuf::from("/definitely/not/a/catalog.json");
        let err = load_registry(Some(&missing)).unwrap_err();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }
}
