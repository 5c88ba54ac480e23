use crate::explorer::GridNetwork;
use crate::identity::Identity;
use crate::scan::DEFAULT_POOL_SIZE;
use crate::{ProvisionError, ProvisionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Currency used when none is configured.
pub const DEFAULT_CURRENCY: &str = "TFT";

/// Configuration of the `tfuser` tool: which explorer to talk to, as which user, and the
/// defaults applied to new reservations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The grid network to use. Ignored if `explorer_url` is set.
    #[serde(default)]
    network: Option<GridNetwork>,
    /// Url of a custom explorer.
    #[serde(default)]
    explorer_url: Option<String>,
    /// Currencies reservations can be paid with.
    #[serde(default = "default_currencies")]
    currencies: Vec<String>,
    /// Default lifetime of a reservation, in days.
    #[serde(default = "default_duration_days")]
    duration_days: u32,
    /// Amount of concurrent lookups when scanning reservations.
    #[serde(default = "default_scan_pool_size")]
    scan_pool_size: usize,
    /// The user to act as.
    identity: IdentityConfig,
}

/// The key material of a user.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Id of the user on the explorer.
    user_id: i64,
    /// The bip39 mnemonic of the signing key.
    mnemonic: String,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("user_id", &self.user_id)
            .field("mnemonic", &"<hidden>")
            .finish()
    }
}

fn default_currencies() -> Vec<String> {
    vec![DEFAULT_CURRENCY.to_string()]
}

fn default_duration_days() -> u32 {
    30
}

fn default_scan_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl Config {
    /// Create a config for a user on a grid network, with default settings.
    pub fn new(network: GridNetwork, user_id: i64, mnemonic: String) -> Self {
        Config {
            network: Some(network),
            explorer_url: None,
            identity: IdentityConfig { user_id, mnemonic },
            currencies: default_currencies(),
            duration_days: default_duration_days(),
            scan_pool_size: default_scan_pool_size(),
        }
    }

    /// Read and validate a config file.
    pub fn load(path: &Path) -> ProvisionResult<Config> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ProvisionError::new_io(format!("config file {}", path.display()), e))?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config. This does not load the identity, but does check the mnemonic is
    /// present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.user_id <= 0 {
            return Err(format!("invalid user id {}", self.identity.user_id).into());
        }
        if self.identity.mnemonic.trim().is_empty() {
            return Err("identity mnemonic is missing".to_string().into());
        }
        if self.currencies.is_empty() {
            return Err("at least 1 currency must be configured".to_string().into());
        }
        if self.duration_days == 0 {
            return Err("reservation duration must be at least 1 day".to_string().into());
        }
        if self.scan_pool_size == 0 {
            return Err("scan pool size must be at least 1".to_string().into());
        }
        if let Some(ref url) = self.explorer_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("explorer url {} is not an http url", url).into());
            }
        }

        Ok(())
    }

    /// Url of the explorer to use. Defaults to the mainnet explorer.
    pub fn explorer_url(&self) -> &str {
        match (&self.explorer_url, self.network) {
            (Some(url), _) => url,
            (None, Some(network)) => network.url(),
            (None, None) => GridNetwork::Mainnet.url(),
        }
    }

    /// Load the signing identity of the user.
    pub fn identity(&self) -> ProvisionResult<Identity> {
        Ok(Identity::from_mnemonic(
            self.identity.user_id,
            &self.identity.mnemonic,
        )?)
    }

    /// Id of the user.
    pub fn user_id(&self) -> i64 {
        self.identity.user_id
    }

    /// Currencies reservations can be paid with.
    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    /// Default lifetime of a reservation.
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::days(self.duration_days as i64)
    }

    /// Amount of concurrent lookups when scanning reservations.
    pub fn scan_pool_size(&self) -> usize {
        self.scan_pool_size
    }
}

/// An error in the configuration
#[derive(Debug)]
pub struct ConfigError {
    msg: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

// default impls are fine here
impl std::error::Error for ConfigError {}

impl From<String> for ConfigError {
    fn from(s: String) -> Self {
        ConfigError { msg: s }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::explorer::GridNetwork;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";

    #[test]
    fn encoding() {
        let cfg = Config::new(GridNetwork::Testnet, 42, MNEMONIC.to_string());
        let encoded = toml::to_string(&cfg).unwrap();
        let decoded: Config = toml::from_str(&encoded).unwrap();
        assert_eq!(cfg, decoded);
        assert!(decoded.validate().is_ok());
    }

    #[test]
    fn defaults() {
        let cfg: Config = toml::from_str(&format!(
            r#"
network = "devnet"

[identity]
user_id = 7
mnemonic = "{}"
"#,
            MNEMONIC
        ))
        .unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.explorer_url(), "https://explorer.devnet.grid.tf");
        assert_eq!(cfg.currencies(), &["TFT".to_string()]);
        assert_eq!(cfg.duration(), chrono::Duration::days(30));
        assert_eq!(cfg.scan_pool_size(), 10);
        assert_eq!(cfg.identity().unwrap().id(), 7);
    }

    #[test]
    fn explorer_url_overrides_network() {
        let cfg: Config = toml::from_str(&format!(
            r#"
network = "devnet"
explorer_url = "http://localhost:8080"

[identity]
user_id = 7
mnemonic = "{}"
"#,
            MNEMONIC
        ))
        .unwrap();
        assert_eq!(cfg.explorer_url(), "http://localhost:8080");
    }

    #[test]
    fn invalid_configs() {
        assert!(toml::from_str::<Config>(
            r#"
unknown = 1

[identity]
user_id = 7
mnemonic = "x"
"#
        )
        .is_err());

        let mut cfg = Config::new(GridNetwork::Mainnet, 0, MNEMONIC.to_string());
        assert!(cfg.validate().is_err());
        cfg.identity.user_id = 1;
        cfg.scan_pool_size = 0;
        assert!(cfg.validate().is_err());
        cfg.scan_pool_size = 1;
        cfg.explorer_url = Some("ftp://explorer".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn mnemonic_is_not_printed() {
        let cfg = Config::new(GridNetwork::Mainnet, 1, MNEMONIC.to_string());
        assert!(!format!("{:?}", cfg).contains("abandon"));
    }
}
