// src/config/loader.rs
//! Layered configuration loader: defaults, TOML files, then environment

use crate::config::{constants::paths, BoardConfig};
use crate::error::{BoardError, BoardResult};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Loads a [`BoardConfig`] by merging every existing file in `config_paths`
/// over the defaults, then applying `BIOSIG_<SECTION>_<KEY>` variables
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    current_config: Arc<RwLock<BoardConfig>>,
}

impl ConfigLoader {
    /// Loader over the working-directory config files
    pub fn new() -> Self {
        Self::with_paths(vec![
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            PathBuf::from(paths::LOCAL_CONFIG_FILE),
        ])
    }

    /// Later paths override earlier ones; missing files are skipped
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            current_config: Arc::new(RwLock::new(BoardConfig::default())),
        }
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load, validate and remember the merged configuration
    pub fn load(&mut self) -> BoardResult<BoardConfig> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        Ok(config)
    }

    /// Last successfully loaded configuration
    pub fn current(&self) -> BoardConfig {
        self.current_config.read().clone()
    }

    /// Parse and validate a single file without touching the current config
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> BoardResult<()> {
        let value = load_config_file(path.as_ref())?;
        let mut merged = default_value()?;
        merge_toml_values(&mut merged, value);
        into_validated(merged).map(|_| ())
    }

    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> BoardResult<()> {
        let text = toml::to_string_pretty(&self.current())
            .map_err(|e| BoardError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), text)
            .map_err(|e| BoardError::Config(format!("{}: {}", path.as_ref().display(), e)))
    }

    fn load_and_merge_configs(&self) -> BoardResult<BoardConfig> {
        let mut merged = default_value()?;

        for path in &self.config_paths {
            if path.exists() {
                debug!(path = %path.display(), "merging config file");
                merge_toml_values(&mut merged, load_config_file(path)?);
            }
        }

        apply_environment_overrides(&mut merged, std::env::vars());
        into_validated(merged)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn default_value() -> BoardResult<toml::Value> {
    toml::Value::try_from(BoardConfig::default()).map_err(|e| BoardError::Config(e.to_string()))
}

fn into_validated(value: toml::Value) -> BoardResult<BoardConfig> {
    let config: BoardConfig = value
        .try_into()
        .map_err(|e: toml::de::Error| BoardError::Config(e.to_string()))?;
    config
        .validate()
        .map_err(|errors| BoardError::Config(errors.join("; ")))?;
    Ok(config)
}

fn load_config_file(path: &Path) -> BoardResult<toml::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| BoardError::Config(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| BoardError::Config(format!("{}: {}", path.display(), e)))
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_toml_values(base_value, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base_value, overlay_value) => *base_value = overlay_value,
    }
}

/// `BIOSIG_BOARD_IP_ADDRESS=10.0.0.2` sets `board.ip_address`
fn apply_environment_overrides(config: &mut toml::Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(paths::ENV_PREFIX) else {
            continue;
        };
        let rest = rest.to_lowercase();
        let Some((section, field)) = rest.split_once('_') else {
            continue;
        };
        if let toml::Value::Table(root) = config {
            let table = root
                .entry(section.to_string())
                .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
            if let toml::Value::Table(table) = table {
                debug!(section, field, "config override from environment");
                table.insert(field.to_string(), parse_env_value(&value));
            }
        }
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else {
        toml::Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hal::types::BoardKind;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", text).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_missing_files_give_defaults() {
        let mut loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/biosig.toml")]);
        let config = loader.load().unwrap();
        assert_eq!(config, BoardConfig::default());
    }

    #[test]
    #[serial]
    fn test_later_files_override_earlier() {
        let base = write_config(
            r#"
[board]
kind = "cyton"
serial_port = "/dev/ttyUSB0"

[stream]
buffer_capacity = 1000
"#,
        );
        let local = write_config(
            r#"
[board]
serial_port = "/dev/ttyUSB1"
"#,
        );

        let mut loader =
            ConfigLoader::with_paths(vec![base.path().to_path_buf(), local.path().to_path_buf()]);
        let config = loader.load().unwrap();

        assert_eq!(config.board.kind, BoardKind::Cyton);
        assert_eq!(config.board.serial_port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.stream.buffer_capacity, 1000);
        assert_eq!(loader.current(), config);
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        unsafe {
            std::env::set_var("BIOSIG_BOARD_IP_ADDRESS", "10.1.2.3");
            std::env::set_var("BIOSIG_STREAM_BUFFER_CAPACITY", "2048");
        }

        let mut loader = ConfigLoader::with_paths(Vec::new());
        let config = loader.load();

        unsafe {
            std::env::remove_var("BIOSIG_BOARD_IP_ADDRESS");
            std::env::remove_var("BIOSIG_STREAM_BUFFER_CAPACITY");
        }

        let config = config.unwrap();
        assert_eq!(config.board.ip_address.as_deref(), Some("10.1.2.3"));
        assert_eq!(config.stream.buffer_capacity, 2048);
    }

    #[test]
    fn test_env_parsing_is_isolated_from_process_env() {
        let mut value = default_value().unwrap();
        apply_environment_overrides(
            &mut value,
            vec![
                ("BIOSIG_BOARD_TIMEOUT_S".to_string(), "30".to_string()),
                ("OTHER_BOARD_TIMEOUT_S".to_string(), "99".to_string()),
                ("BIOSIGNOSECTION".to_string(), "1".to_string()),
            ]
            .into_iter(),
        );
        let config = into_validated(value).unwrap();
        assert_eq!(config.board.timeout_s, 30);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let loader = ConfigLoader::new();
        let file = write_config(
            r#"
[stream]
buffer_capacity = 0
"#,
        );
        let err = loader.validate_config_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let garbage = write_config("[board\nkind = ");
        assert!(loader.validate_config_file(garbage.path()).is_err());
    }

    #[test]
    #[serial]
    fn test_config_export() {
        let mut loader = ConfigLoader::with_paths(Vec::new());
        loader.load().unwrap();
        let out = NamedTempFile::new().unwrap();

        loader.export_config(out.path()).unwrap();

        let content = std::fs::read_to_string(out.path()).unwrap();
        assert!(content.contains("[board]"));
        assert!(content.contains("[stream]"));
    }
}
