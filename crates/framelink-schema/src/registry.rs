use std::collections::BTreeMap;
use std::fs::Metadata;
use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::validator::validate_payload;

const FILE_PREFIX: &str = "schema_";
const FILE_SUFFIX: &str = ".schema.json";

/// Compiled JSON Schema validators keyed by message schema id.
pub struct SchemaRegistry {
    validators: BTreeMap<u16, Validator>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            validators: BTreeMap::new(),
            config,
        }
    }

    /// Register a schema document for `schema_id`, replacing any previous one.
    pub fn register(&mut self, schema_id: u16, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(schema_id, &schema)
    }

    /// Register an already parsed schema document for `schema_id`.
    pub fn register_value(&mut self, schema_id: u16, schema: &Value) -> Result<()> {
        let mut document = schema.clone();
        if self.config.strict_mode {
            close_object_schemas(&mut document);
        }

        let compiled =
            jsonschema::validator_for(&document).map_err(|err| SchemaError::CompileFailed {
                schema_id,
                message: err.to_string(),
            })?;

        self.validators.insert(schema_id, compiled);
        debug!(schema_id, "schema registered");
        Ok(())
    }

    /// Load every `schema_<id>.schema.json` file from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load schema files from a directory with explicit config.
    ///
    /// Symlinked schema files and files exceeding the configured size are
    /// refused. Files without the `.schema.json` suffix are ignored.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        let mut loaded = 0usize;

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let is_schema_file = file_name.to_ascii_lowercase().ends_with(FILE_SUFFIX);
            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_type = path_metadata.file_type();

            if file_type.is_symlink() {
                if is_schema_file {
                    return Err(SchemaError::LoadFailed(format!(
                        "refusing to load schema symlink: {file_name}"
                    )));
                }
                continue;
            }
            if !file_type.is_file() || !is_schema_file {
                continue;
            }

            let Some(schema_id) = schema_id_from_file_name(&file_name) else {
                return Err(SchemaError::LoadFailed(format!(
                    "unrecognized schema filename: {file_name}"
                )));
            };

            loaded = loaded.saturating_add(1);
            if loaded > registry.config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({})",
                    registry.config.max_schemas_from_directory
                )));
            }

            let content = read_bounded(&entry_path, &path_metadata, registry.config.max_schema_file_size)?;
            registry.register(schema_id, &content)?;
        }

        Ok(registry)
    }

    /// Build a registry from `(schema_id, document)` pairs.
    pub fn from_embedded(schemas: &[(u16, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (schema_id, schema) in schemas {
            registry.register(*schema_id, schema)?;
        }
        Ok(registry)
    }

    /// Check a payload against the schema registered for `schema_id`.
    pub fn validate(&self, schema_id: u16, payload: &[u8]) -> Result<()> {
        match self.validators.get(&schema_id) {
            Some(validator) => validate_payload(schema_id, payload, validator),
            None if self.config.fail_on_missing_schema => Err(SchemaError::UnknownSchema(schema_id)),
            None => Ok(()),
        }
    }

    /// Whether `schema_id` is acceptable at all, regardless of payload.
    pub fn accepts(&self, schema_id: u16) -> bool {
        !self.config.fail_on_missing_schema || self.validators.contains_key(&schema_id)
    }

    /// Check if a schema id has a registered schema.
    pub fn has_schema(&self, schema_id: u16) -> bool {
        self.validators.contains_key(&schema_id)
    }

    /// Registered schema ids in ascending order.
    pub fn schema_ids(&self) -> Vec<u16> {
        self.validators.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schema_ids", &self.schema_ids())
            .field("config", &self.config)
            .finish()
    }
}

fn read_bounded(path: &Path, path_metadata: &Metadata, max_bytes: usize) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|err| {
        SchemaError::LoadFailed(format!("failed opening schema {}: {err}", path.display()))
    })?;
    let opened = file
        .metadata()
        .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;

    #[cfg(unix)]
    {
        if !same_file_identity(path_metadata, &opened) {
            return Err(SchemaError::LoadFailed(format!(
                "schema file changed during load: {}",
                path.display()
            )));
        }
    }
    #[cfg(not(unix))]
    let _ = path_metadata;

    if opened.len() > max_bytes as u64 {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large ({} bytes): {}",
            opened.len(),
            path.display()
        )));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            SchemaError::LoadFailed(format!("failed reading schema {}: {err}", path.display()))
        })?;
    if content.len() > max_bytes {
        return Err(SchemaError::LoadFailed(format!(
            "schema file grew past limit while reading: {}",
            path.display()
        )));
    }
    Ok(content)
}

fn schema_id_from_file_name(file_name: &str) -> Option<u16> {
    let lower = file_name.to_ascii_lowercase();
    lower
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

/// Add `additionalProperties: false` to every object schema that leaves it open.
fn close_object_schemas(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for key in ["properties", "patternProperties", "$defs", "definitions"] {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    children.values_mut().for_each(close_object_schemas);
                }
            }
            for key in ["items", "additionalProperties", "not", "if", "then", "else"] {
                if let Some(child) = map.get_mut(key) {
                    close_object_schemas(child);
                }
            }
            for key in ["prefixItems", "allOf", "anyOf", "oneOf"] {
                if let Some(Value::Array(children)) = map.get_mut(key) {
                    children.iter_mut().for_each(close_object_schemas);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_object_schemas),
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds
            .iter()
            .any(|kind| matches!(kind, Value::String(k) if k == "object")),
        _ => ["properties", "patternProperties", "required"]
            .iter()
            .any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(unix)]
fn same_file_identity(path_metadata: &Metadata, opened_metadata: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const POSITION_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "lat": { "type": "number" },
            "lon": { "type": "number" }
        },
        "required": ["lat", "lon"]
    }"#;

    #[test]
    fn register_and_validate() {
        let mut registry = SchemaRegistry::new();
        registry.register(3, POSITION_SCHEMA).unwrap();

        assert!(registry.validate(3, br#"{"lat":1.5,"lon":2}"#).is_ok());
        assert!(matches!(
            registry.validate(3, br#"{"lat":"north","lon":2}"#),
            Err(SchemaError::ValidationFailed { schema_id: 3, .. })
        ));
    }

    #[test]
    fn unknown_id_is_accepted_when_open() {
        let registry = SchemaRegistry::new();
        assert!(registry.accepts(42));
        assert!(registry.validate(42, b"anything").is_ok());
    }

    #[test]
    fn unknown_id_is_rejected_when_closed() {
        let mut registry = SchemaRegistry::with_config(RegistryConfig::closed());
        registry.register(0, r#"{"type":"string"}"#).unwrap();

        assert!(registry.accepts(0));
        assert!(!registry.accepts(7));
        assert!(matches!(
            registry.validate(7, br#"{}"#),
            Err(SchemaError::UnknownSchema(7))
        ));
    }

    #[test]
    fn strict_mode_rejects_undeclared_properties() {
        let mut open = SchemaRegistry::new();
        open.register(1, POSITION_SCHEMA).unwrap();
        let mut strict = SchemaRegistry::with_config(RegistryConfig {
            strict_mode: true,
            ..RegistryConfig::default()
        });
        strict.register(1, POSITION_SCHEMA).unwrap();

        let payload = br#"{"lat":1,"lon":2,"alt":3}"#;
        assert!(open.validate(1, payload).is_ok());
        assert!(strict.validate(1, payload).is_err());
    }

    #[test]
    fn strict_mode_reaches_nested_objects() {
        let schema = r#"{
            "type": "object",
            "properties": {
                "fix": { "properties": { "q": { "type": "integer" } } }
            }
        }"#;
        let mut strict = SchemaRegistry::with_config(RegistryConfig {
            strict_mode: true,
            ..RegistryConfig::default()
        });
        strict.register(1, schema).unwrap();

        assert!(strict.validate(1, br#"{"fix":{"q":1}}"#).is_ok());
        assert!(strict.validate(1, br#"{"fix":{"q":1,"x":0}}"#).is_err());
    }

    #[test]
    fn invalid_json_payload_fails() {
        let registry = SchemaRegistry::from_embedded(&[(1, POSITION_SCHEMA)]).unwrap();
        assert!(matches!(
            registry.validate(1, b"not-json"),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    #[test]
    fn invalid_schema_fails_compile() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.register(9, r#"{"type":"no-such-type"}"#),
            Err(SchemaError::CompileFailed { schema_id: 9, .. })
        ));
    }

    #[test]
    fn from_directory_loads_numbered_files() {
        let dir = temp_schema_dir("load");
        write_file(&dir, "schema_1.schema.json", POSITION_SCHEMA);
        write_file(&dir, "schema_20.schema.json", r#"{"type":"array"}"#);
        write_file(&dir, "notes.txt", "ignored");

        let registry = SchemaRegistry::from_directory(&dir).unwrap();
        assert_eq!(registry.schema_ids(), vec![1, 20]);
        assert!(registry.validate(20, b"[1,2]").is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_directory_rejects_unnumbered_schema_file() {
        let dir = temp_schema_dir("unnumbered");
        write_file(&dir, "position.schema.json", POSITION_SCHEMA);

        assert!(matches!(
            SchemaRegistry::from_directory(&dir),
            Err(SchemaError::LoadFailed(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn directory_limits_are_enforced() {
        let dir = temp_schema_dir("limits");
        write_file(&dir, "schema_1.schema.json", POSITION_SCHEMA);
        write_file(&dir, "schema_2.schema.json", POSITION_SCHEMA);

        let too_many = RegistryConfig {
            max_schemas_from_directory: 1,
            ..RegistryConfig::default()
        };
        assert!(SchemaRegistry::from_directory_with_config(&dir, too_many).is_err());

        let too_big = RegistryConfig {
            max_schema_file_size: 8,
            ..RegistryConfig::default()
        };
        assert!(SchemaRegistry::from_directory_with_config(&dir, too_big).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_schema_is_rejected() {
        let dir = temp_schema_dir("symlink");
        let target = dir.join("target.json");
        std::fs::write(&target, POSITION_SCHEMA).unwrap();
        std::os::unix::fs::symlink(&target, dir.join("schema_1.schema.json")).unwrap();

        assert!(matches!(
            SchemaRegistry::from_directory(&dir),
            Err(SchemaError::LoadFailed(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_name_parsing() {
        assert_eq!(schema_id_from_file_name("schema_0.schema.json"), Some(0));
        assert_eq!(schema_id_from_file_name("SCHEMA_65535.schema.json"), Some(65535));
        assert_eq!(schema_id_from_file_name("schema_65536.schema.json"), None);
        assert_eq!(schema_id_from_file_name("schema_x.schema.json"), None);
        assert_eq!(schema_id_from_file_name("channel_1.schema.json"), None);
    }

    fn temp_schema_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "framelink-schema-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}
