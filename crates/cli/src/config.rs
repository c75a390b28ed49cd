//! Invoker configuration.
//!
//! Sources, lowest to highest precedence:
//!
//! 1. built-in defaults ([`InvokerConfig::default`]);
//! 2. a TOML file: `--config <path>`, else `./dubbo-invoke.toml` when present;
//! 3. environment variables and command-line flags ([`ConfigOverrides`]).
//!
//! Every file field is optional; the file is a partial overlay on the defaults.
//!
//! ```toml
//! [registry]
//! address = "10.0.0.2:2181"
//! timeout_secs = 100
//!
//! [session]
//! prompt = "dubbo>"
//! encoding = "utf-8"
//! connect_timeout_secs = 10
//! read_timeout_secs = 30   # 0 waits indefinitely
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

use invocation::{SessionConfig, TextEncoding};

/// File looked for in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "dubbo-invoke.toml";

/// Top-level TOML configuration file schema.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvokerConfigFile {
    #[serde(default)]
    pub registry: RegistryFileConfig,

    #[serde(default)]
    pub session: SessionFileConfig,
}

/// `[registry]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryFileConfig {
    /// ZooKeeper connect string (`host:port[,host:port...]`).
    pub address: Option<String>,

    /// Upper bound on establishing the registry session, in seconds.
    pub timeout_secs: Option<u64>,
}

/// `[session]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionFileConfig {
    pub prompt: Option<String>,
    pub encoding: Option<TextEncoding>,
    pub connect_timeout_secs: Option<u64>,
    /// `0` waits indefinitely.
    pub read_timeout_secs: Option<u64>,
}

/// Values supplied by flags or `DUBBO_INVOKE_*` environment variables.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub registry_address: Option<String>,
    pub registry_timeout_secs: Option<u64>,
    pub prompt: Option<String>,
    pub encoding: Option<TextEncoding>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerConfig {
    pub registry_address: String,
    pub registry_timeout: Duration,
    pub session: SessionConfig,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            registry_address: zookeeper::DEFAULT_REGISTRY_ADDRESS.to_string(),
            registry_timeout: zookeeper::DEFAULT_CONNECT_TIMEOUT,
            session: SessionConfig::default(),
        }
    }
}

impl InvokerConfig {
    /// Builds the configuration from defaults, the config file, and overrides.
    ///
    /// An explicit `config_path` must exist. Without one, the default file is
    /// used only if it is present in the working directory.
    pub fn load(config_path: Option<&Path>, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let file_path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
                candidate.is_file().then_some(candidate)
            }
        };

        let mut config = Self::default();
        if let Some(path) = file_path {
            let file = load_config_file(&path)?;
            tracing::debug!(path = %path.display(), "loaded config file");
            config.apply_file(file);
        }
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: InvokerConfigFile) {
        let InvokerConfigFile { registry, session } = file;
        self.apply(ConfigOverrides {
            registry_address: registry.address,
            registry_timeout_secs: registry.timeout_secs,
            prompt: session.prompt,
            encoding: session.encoding,
            connect_timeout_secs: session.connect_timeout_secs,
            read_timeout_secs: session.read_timeout_secs,
        });
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        self.apply(overrides.clone());
    }

    fn apply(&mut self, layer: ConfigOverrides) {
        if let Some(address) = layer.registry_address {
            self.registry_address = address;
        }
        if let Some(secs) = layer.registry_timeout_secs {
            self.registry_timeout = Duration::from_secs(secs);
        }
        if let Some(prompt) = layer.prompt {
            self.session.prompt = prompt;
        }
        if let Some(encoding) = layer.encoding {
            self.session.encoding = encoding;
        }
        if let Some(secs) = layer.connect_timeout_secs {
            self.session.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = layer.read_timeout_secs {
            self.session.read_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.registry_address.trim().is_empty() {
            bail!("registry address must not be empty");
        }
        if self.session.prompt.is_empty() {
            bail!("prompt must not be empty");
        }
        if self.session.connect_timeout.is_zero() {
            bail!("connect timeout must be greater than zero");
        }
        Ok(())
    }
}

/// Reads and parses a TOML config file.
pub fn load_config_file(path: &Path) -> anyhow::Result<InvokerConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = InvokerConfig::default();
        assert_eq!(config.registry_address, "127.0.0.1:2181");
        assert_eq!(config.registry_timeout, Duration::from_secs(100));
        assert_eq!(config.session.prompt, "dubbo>");
        assert_eq!(config.session.encoding, TextEncoding::Utf8);
        assert_eq!(config.session.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.session.read_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_file_overlays_defaults() {
        let file = write_config(
            r#"
            [registry]
            address = "10.0.0.2:2181"

            [session]
            encoding = "latin-1"
            read_timeout_secs = 0
            "#,
        );

        let config = InvokerConfig::load(Some(file.path()), &ConfigOverrides::default()).unwrap();

        assert_eq!(config.registry_address, "10.0.0.2:2181");
        assert_eq!(config.registry_timeout, Duration::from_secs(100));
        assert_eq!(config.session.encoding, TextEncoding::Latin1);
        assert_eq!(config.session.read_timeout, None);
        assert_eq!(config.session.prompt, "dubbo>");
    }

    #[test]
    fn test_overrides_beat_file() {
        let file = write_config(
            r#"
            [registry]
            address = "10.0.0.2:2181"
            timeout_secs = 5
            "#,
        );
        let overrides = ConfigOverrides {
            registry_address: Some("zk.internal:2181".to_string()),
            prompt: Some("qos>".to_string()),
            ..ConfigOverrides::default()
        };

        let config = InvokerConfig::load(Some(file.path()), &overrides).unwrap();

        assert_eq!(config.registry_address, "zk.internal:2181");
        assert_eq!(config.registry_timeout, Duration::from_secs(5));
        assert_eq!(config.session.prompt, "qos>");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let err = InvokerConfig::load(Some(&missing), &ConfigOverrides::default()).unwrap_err();

        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let file = write_config("[session]\nprompts = \"x\"\n");

        let err = InvokerConfig::load(Some(file.path()), &ConfigOverrides::default()).unwrap_err();

        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn test_bad_encoding_is_rejected() {
        let file = write_config("[session]\nencoding = \"ebcdic\"\n");
        assert!(InvokerConfig::load(Some(file.path()), &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_zero_connect_timeout_is_rejected() {
        let overrides = ConfigOverrides {
            connect_timeout_secs: Some(0),
            ..ConfigOverrides::default()
        };
        let file = write_config("");

        let err = InvokerConfig::load(Some(file.path()), &overrides).unwrap_err();

        assert!(err.to_string().contains("connect timeout"));
    }
}
