/// Controls how the registry compiles schemas and treats unknown ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, object schemas reject properties they do not declare.
    pub strict_mode: bool,
    /// When true, ids without a registered schema fail with
    /// `SchemaError::UnknownSchema`; otherwise any payload is accepted.
    pub fail_on_missing_schema: bool,
    /// Maximum number of schema files loaded from a directory.
    pub max_schemas_from_directory: usize,
    /// Maximum size in bytes of one schema file loaded from a directory.
    pub max_schema_file_size: usize,
}

impl RegistryConfig {
    /// Configuration where only registered schema ids are accepted.
    pub fn closed() -> Self {
        Self {
            fail_on_missing_schema: true,
            ..Self::default()
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            fail_on_missing_schema: false,
            max_schemas_from_directory: 256,
            max_schema_file_size: 256 * 1024,
        }
    }
}
