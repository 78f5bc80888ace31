/// Controls message catalog loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of message files loaded from a directory.
    pub max_messages_from_directory: usize,
    /// Maximum bytes allowed per catalog file.
    pub max_catalog_file_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_messages_from_directory: 256,
            max_catalog_file_size: 256 * 1024,
        }
    }
}
