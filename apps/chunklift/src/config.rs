//! Transfer configuration.
//!
//! Read from a TOML file. The path comes from the first command-line
//! argument, then `CHUNKLIFT_CONFIG`, then `chunklift.toml` in the
//! working directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chunklift_transfer::{
    DEFAULT_BLOCK_ID_PREFIX, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
    RetryPolicy, TransferConfig,
};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CHUNKLIFT_CONFIG";

/// Environment variable overriding `sas_token`.
pub const SAS_TOKEN_ENV: &str = "CHUNKLIFT_SAS_TOKEN";

pub const DEFAULT_CONFIG_FILE: &str = "chunklift.toml";

/// Transfer configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage account endpoint, e.g. `https://acct.blob.core.windows.net`.
    pub account_url: String,

    /// Destination container. Created if absent.
    pub container: String,

    /// Destination object name.
    pub blob_name: String,

    /// Pre-signed query string appended to every store request.
    #[serde(default)]
    pub sas_token: String,

    /// Source URL.
    pub download_url: String,

    /// Bytes per block.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Retries allowed per failing source read.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds between read retries.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_block_id_prefix")]
    pub block_id_prefix: String,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY.as_secs()
}

fn default_block_id_prefix() -> String {
    DEFAULT_BLOCK_ID_PREFIX.into()
}

// Keeps the SAS token out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("account_url", &self.account_url)
            .field("container", &self.container)
            .field("blob_name", &self.blob_name)
            .field("sas_token", &"<redacted>")
            .field("download_url", &self.download_url)
            .field("block_size", &self.block_size)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("block_id_prefix", &self.block_id_prefix)
            .finish()
    }
}

impl Config {
    /// Loads and validates the configuration at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("invalid config {}", path.display()))?
            .with_sas_override(std::env::var(SAS_TOKEN_ENV).ok());
        tracing::debug!(path = %path.display(), "configuration read");
        Ok(config)
    }

    /// Parses and validates TOML content.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces the SAS token when `token` is set and non-empty.
    pub fn with_sas_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.sas_token = token;
        }
        self
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("account_url", &self.account_url),
            ("container", &self.container),
            ("blob_name", &self.blob_name),
            ("download_url", &self.download_url),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{field} must not be empty");
            }
        }
        self.transfer_config().validate()?;
        Ok(())
    }

    /// Pipeline settings derived from this configuration.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            block_size: self.block_size,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                delay: Duration::from_secs(self.retry_delay_secs),
            },
            block_id_prefix: self.block_id_prefix.clone(),
        }
    }
}

/// Picks the config file path: explicit argument, then environment,
/// then the default file name.
pub fn resolve_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use chunklift_transfer::MAX_BLOCK_SIZE;

    use super::*;

    const MINIMAL: &str = r#"
account_url = "https://acct.blob.core.windows.net"
container = "media"
blob_name = "disk.iso"
sas_token = "sv=2021-08-06&sig=abc"
download_url = "http://mirror.example.com/disk.iso"
"#;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.container, "media");
        assert_eq!(config.block_size, 100 * 1024 * 1024);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_secs, 10);
        assert_eq!(config.block_id_prefix, "largefile1BlockId");
        assert_eq!(config.transfer_config(), TransferConfig::default());
    }

    #[test]
    fn overrides_transfer_settings() {
        let content = format!(
            "{MINIMAL}block_size = 4194304\nmax_retries = 2\nretry_delay_secs = 1\nblock_id_prefix = \"x\"\n"
        );
        let transfer = Config::parse(&content).unwrap().transfer_config();
        assert_eq!(transfer.block_size, 4 * 1024 * 1024);
        assert_eq!(transfer.retry.max_retries, 2);
        assert_eq!(transfer.retry.delay, Duration::from_secs(1));
        assert_eq!(transfer.block_id_prefix, "x");
    }

    #[test]
    fn sas_token_is_optional() {
        let content = MINIMAL.replace("sas_token = \"sv=2021-08-06&sig=abc\"\n", "");
        let config = Config::parse(&content).unwrap();
        assert!(config.sas_token.is_empty());
    }

    #[test]
    fn rejects_missing_required_field() {
        let content = MINIMAL.replace("download_url", "# download_url");
        assert!(Config::parse(&content).is_err());
    }

    #[test]
    fn rejects_empty_required_field() {
        let content = MINIMAL.replace("\"media\"", "\"\"");
        let err = Config::parse(&content).unwrap_err();
        assert!(err.to_string().contains("container"));
    }

    #[test]
    fn rejects_bad_block_sizes() {
        let zero = format!("{MINIMAL}block_size = 0\n");
        assert!(Config::parse(&zero).is_err());

        let oversize = format!("{MINIMAL}block_size = {}\n", MAX_BLOCK_SIZE + 1);
        assert!(Config::parse(&oversize).is_err());
    }

    #[test]
    fn sas_override() {
        let config = Config::parse(MINIMAL).unwrap();
        let kept = config.clone().with_sas_override(Some(String::new()));
        assert_eq!(kept.sas_token, "sv=2021-08-06&sig=abc");
        let replaced = config.with_sas_override(Some("sig=new".into()));
        assert_eq!(replaced.sas_token, "sig=new");
    }

    #[test]
    fn debug_redacts_token() {
        let config = Config::parse(MINIMAL).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("sig=abc"));
        assert!(printed.contains("media"));
    }

    #[test]
    fn resolve_path_precedence() {
        assert_eq!(
            resolve_path(Some("a.toml".into()), Some("b.toml".into())),
            PathBuf::from("a.toml")
        );
        assert_eq!(resolve_path(None, Some("b.toml".into())), PathBuf::from("b.toml"));
        assert_eq!(resolve_path(None, None), PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn config_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunklift.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.blob_name, "disk.iso");
        assert_eq!(loaded.download_url, "http://mirror.example.com/disk.iso");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config::parse(MINIMAL).unwrap();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::parse(&toml_str).unwrap();
        assert_eq!(parsed.account_url, config.account_url);
        assert_eq!(parsed.block_size, config.block_size);
    }

    #[test]
    fn missing_file_names_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent.toml");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
