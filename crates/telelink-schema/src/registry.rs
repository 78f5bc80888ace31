use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::catalog;
use crate::config::RegistryConfig;
use crate::descriptor::{MessageDefinition, MessageDescriptor};
use crate::error::{Result, SchemaError};

const MESSAGE_FILE_SUFFIX: &str = ".message.json";
const CATALOG_FILE_SUFFIX: &str = ".catalog.json";

/// Message-id keyed registry of message descriptors.
///
/// Populated once at startup and read-only afterwards; share it behind an
/// `Arc` (or a plain `&`) between encoders and parsers on any thread.
#[derive(Debug, Clone)]
pub struct MessageRegistry {
    messages: HashMap<u8, MessageDescriptor>,
    config: RegistryConfig,
}

impl MessageRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            messages: HashMap::new(),
            config,
        }
    }

    /// Registry preloaded with the built-in message catalog.
    pub fn builtin() -> Result<Self> {
        Self::from_descriptors(catalog::builtin()?)
    }

    /// Register a descriptor.
    ///
    /// Registering an identical descriptor again is a no-op; registering a
    /// different descriptor under an id already in use is a
    /// [`SchemaError::SchemaConflict`].
    pub fn register(&mut self, descriptor: MessageDescriptor) -> Result<()> {
        if let Some(existing) = self.messages.get(&descriptor.id()) {
            if *existing == descriptor {
                return Ok(());
            }
            return Err(SchemaError::SchemaConflict {
                id: descriptor.id(),
                existing: existing.name().to_string(),
            });
        }

        debug!(
            id = descriptor.id(),
            name = descriptor.name(),
            len = descriptor.payload_length(),
            crc_extra = descriptor.crc_extra(),
            "registered message"
        );
        self.messages.insert(descriptor.id(), descriptor);
        Ok(())
    }

    /// Register a message from its catalog definition.
    pub fn register_definition(&mut self, definition: &MessageDefinition) -> Result<()> {
        self.register(MessageDescriptor::from_definition(definition)?)
    }

    /// Build a registry from descriptors.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = MessageDescriptor>) -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Register every message of `other`, with the same conflict rules as
    /// [`MessageRegistry::register`].
    pub fn merge(&mut self, other: MessageRegistry) -> Result<()> {
        let mut incoming: Vec<_> = other.messages.into_values().collect();
        incoming.sort_by_key(MessageDescriptor::id);
        for descriptor in incoming {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Load a JSON catalog: an array of message definitions.
    pub fn from_json(catalog_json: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.extend_from_json(catalog_json)?;
        Ok(registry)
    }

    /// Register every definition of a JSON catalog array.
    pub fn extend_from_json(&mut self, catalog_json: &str) -> Result<()> {
        let definitions: Vec<MessageDefinition> = serde_json::from_str(catalog_json)?;
        for definition in &definitions {
            self.register_definition(definition)?;
        }
        Ok(())
    }

    /// Load a catalog file.
    ///
    /// `*.message.json` holds one definition, anything else an array.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut registry = Self::new();
        let content = read_limited(path, registry.config.max_catalog_file_size)?;
        registry.extend_from_file_content(path, &content)?;
        Ok(registry)
    }

    /// Load a catalog file, or every catalog file of a directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::from_directory(path)
        } else {
            Self::from_file(path)
        }
    }

    /// Load message definitions from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load message definitions from a directory with explicit config.
    ///
    /// Reads `*.message.json` (one definition) and `*.catalog.json` (array of
    /// definitions) files; other files are ignored, symlinks are refused.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        let mut loaded_file_count = 0usize;

        let mut entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
        // Directory order is unspecified; load deterministically.
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let is_catalog_file =
                file_name.ends_with(MESSAGE_FILE_SUFFIX) || file_name.ends_with(CATALOG_FILE_SUFFIX);
            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_type = path_metadata.file_type();

            if file_type.is_symlink() {
                if is_catalog_file {
                    return Err(SchemaError::LoadFailed(format!(
                        "refusing to load catalog symlink: {file_name}"
                    )));
                }
                continue;
            }
            if !file_type.is_file() || !is_catalog_file {
                continue;
            }

            loaded_file_count = loaded_file_count.saturating_add(1);
            if loaded_file_count > registry.config.max_messages_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "catalog file count exceeds configured max ({}): {}",
                    registry.config.max_messages_from_directory, loaded_file_count
                )));
            }

            let content = read_limited(&entry_path, registry.config.max_catalog_file_size)?;
            registry.extend_from_file_content(&entry_path, &content)?;
        }

        info!(
            path = %path.display(),
            messages = registry.len(),
            "loaded message catalog"
        );
        Ok(registry)
    }

    fn extend_from_file_content(&mut self, path: &Path, content: &str) -> Result<()> {
        let single = path
            .file_name()
            .map(|name| name.to_string_lossy().ends_with(MESSAGE_FILE_SUFFIX))
            .unwrap_or(false);

        if single {
            let definition: MessageDefinition = serde_json::from_str(content)?;
            self.register_definition(&definition)
        } else {
            self.extend_from_json(content)
        }
    }

    /// Descriptor registered under `message_id`.
    pub fn lookup(&self, message_id: u8) -> Option<&MessageDescriptor> {
        self.messages.get(&message_id)
    }

    /// Descriptor registered under `name` (case-insensitive).
    pub fn lookup_by_name(&self, name: &str) -> Option<&MessageDescriptor> {
        self.messages
            .values()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }

    /// Check if a message id is registered.
    pub fn contains(&self, message_id: u8) -> bool {
        self.messages.contains_key(&message_id)
    }

    /// Registered message ids, ascending.
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.messages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Registered descriptors, ascending by id.
    pub fn descriptors(&self) -> Vec<&MessageDescriptor> {
        let mut descriptors: Vec<&MessageDescriptor> = self.messages.values().collect();
        descriptors.sort_unstable_by_key(|d| d.id());
        descriptors
    }

    /// Number of registered messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn read_limited(path: &Path, max_bytes: usize) -> Result<String> {
    let path_metadata = std::fs::symlink_metadata(path)
        .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
    if path_metadata.file_type().is_symlink() {
        return Err(SchemaError::LoadFailed(format!(
            "refusing to load catalog symlink: {}",
            path.display()
        )));
    }

    let file = std::fs::File::open(path).map_err(|err| {
        SchemaError::LoadFailed(format!("failed opening catalog {}: {err}", path.display()))
    })?;
    let opened_metadata = file
        .metadata()
        .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;

    #[cfg(unix)]
    {
        if !same_file_identity(&path_metadata, &opened_metadata) {
            return Err(SchemaError::LoadFailed(format!(
                "catalog file changed during load: {}",
                path.display()
            )));
        }
    }

    if opened_metadata.len() > max_bytes as u64 {
        return Err(SchemaError::LoadFailed(format!(
            "catalog file too large ({} bytes): {}",
            opened_metadata.len(),
            path.display()
        )));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            SchemaError::LoadFailed(format!("failed reading catalog {}: {err}", path.display()))
        })?;
    if content.len() > max_bytes {
        return Err(SchemaError::LoadFailed(format!(
            "catalog file too large while reading: {}",
            path.display()
        )));
    }

    Ok(content)
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}
