use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::executor::DEFAULT_PATH;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "TINYSH_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prompt: String,
    /// Searched when `PATH` is unset.
    pub default_path: String,
    pub log_filter: Option<String>,
    /// `env.NAME=value` lines, exported at startup.
    pub env_vars: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        ConfigLoader::default_config()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] io::Error),
    #[error("config line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn default_config() -> Config {
        Config {
            prompt: "tinysh$ ".to_string(),
            default_path: DEFAULT_PATH.to_string(),
            log_filter: None,
            env_vars: BTreeMap::new(),
        }
    }

    /// `explicit` if given, else `$TINYSH_CONFIG`, else nothing.
    pub fn locate(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }

    /// Loads the located file, or the defaults when there is none.
    pub fn load(explicit: Option<PathBuf>) -> Result<Config, ConfigError> {
        match Self::locate(explicit) {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default_config()),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let src = fs::read_to_string(path.as_ref())?;
        let config = Self::load_from_str(&src)?;
        info!(path = %path.as_ref().display(), "config loaded");
        Ok(config)
    }

    /// `key=value` lines. Blank lines and lines starting with `#` are skipped.
    /// Everything after the first `=` is the value, spaces included.
    pub fn load_from_str(src: &str) -> Result<Config, ConfigError> {
        let mut config = Self::default_config();

        for (lineno, line) in src.lines().enumerate() {
            let line_no = lineno + 1;
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse {
                    line: line_no,
                    message: format!("no '=' found: {}", line),
                });
            };

            match key.trim() {
                "prompt" => config.prompt = value.to_string(),
                "default_path" => config.default_path = value.trim().to_string(),
                "log_filter" => config.log_filter = Some(value.trim().to_string()),
                k if k.starts_with("env.") => {
                    let name = k.trim_start_matches("env.");
                    if !crate::parser::default::is_name(name) {
                        return Err(ConfigError::Parse {
                            line: line_no,
                            message: format!("invalid variable name: {}", name),
                        });
                    }
                    config.env_vars.insert(name.to_string(), value.to_string());
                }
                k => {
                    return Err(ConfigError::Parse {
                        line: line_no,
                        message: format!("unknown key: {}", k),
                    });
                }
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::load_from_str("").unwrap();
        assert_eq!(config, ConfigLoader::default_config());
        assert_eq!(config.default_path, "/usr/local/bin:/usr/bin:/bin");
    }

    #[test]
    fn test_all_keys() {
        let src = "# comment\n\nprompt=> \ndefault_path=/opt/bin:/bin\nlog_filter=tinysh=debug\nenv.EDITOR=vi\n";
        let config = ConfigLoader::load_from_str(src).unwrap();
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.default_path, "/opt/bin:/bin");
        assert_eq!(config.log_filter.as_deref(), Some("tinysh=debug"));
        assert_eq!(config.env_vars.get("EDITOR").map(String::as_str), Some("vi"));
    }

    #[test]
    fn test_errors_name_the_line() {
        let err = ConfigLoader::load_from_str("prompt=$ \nbogus line\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 2, .. }));
        assert_eq!(err.to_string(), "config line 2: no '=' found: bogus line");

        let err = ConfigLoader::load_from_str("history_max=10").unwrap_err();
        assert_eq!(err.to_string(), "config line 1: unknown key: history_max");

        let err = ConfigLoader::load_from_str("env.1BAD=x").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tinyshrc");
        fs::write(&path, "prompt=% \n").unwrap();
        assert_eq!(ConfigLoader::load_from_file(&path).unwrap().prompt, "% ");
        assert!(matches!(
            ConfigLoader::load_from_file(dir.path().join("missing")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = PathBuf::from("/tmp/explicit.conf");
        assert_eq!(ConfigLoader::locate(Some(explicit.clone())), Some(explicit));
    }
}
