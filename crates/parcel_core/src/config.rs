//! Core configuration loading and process-wide listing defaults.
//!
//! # Responsibility
//! - Parse the TOML configuration consumed by embedders and the CLI.
//! - Hold the process-wide pagination defaults used when callers do not
//!   supply a page size.
//!
//! # Invariants
//! - `default_page_size` and `max_page_size` are positive and
//!   `default_page_size <= max_page_size`.
//! - The process-wide listing config is installed at most once; installing
//!   the same value again is a no-op.
//!
//! Example:
//!
//! ```toml
//! [pagination]
//! default_page_size = 20
//! max_page_size = 100
//!
//! [storage]
//! upload_root = "/var/lib/parcel/uploads"
//!
//! [logging]
//! level = "info"
//! dir = "/var/log/parcel"
//! ```

use crate::logging::default_log_level;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

static LISTING_CONFIG: OnceCell<ListingConfig> = OnceCell::new();

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
    AlreadyInstalled(ListingConfig),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config TOML: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
            Self::AlreadyInstalled(active) => write!(
                f,
                "listing config already installed with default_page_size={} max_page_size={}",
                active.default_page_size, active.max_page_size
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) | Self::AlreadyInstalled(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Pagination defaults for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Page size used when the caller passes none (or zero).
    pub default_page_size: u32,
    /// Hard upper bound for any requested page size.
    pub max_page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl ListingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(ConfigError::Invalid(
                "page sizes must be greater than zero".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// Maps a requested page size onto `1..=max_page_size`; zero selects the
    /// default. Never returns zero, even for a config that fails `validate`.
    pub fn normalize_page_size(&self, requested: u32) -> u32 {
        let max = self.max_page_size.max(1);
        let size = match requested {
            0 => self.default_page_size,
            value => value,
        };
        size.clamp(1, max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for uploaded category icons.
    pub upload_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("storage/uploads"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory; file logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub pagination: ListingConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Parses and validates a TOML document. Missing sections use defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = toml::from_str(source)?;
        config.pagination.validate()?;
        Ok(config)
    }
}

/// Loads and validates configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<CoreConfig, ConfigError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CoreConfig::from_toml_str(&source)
}

/// Installs process-wide listing defaults.
///
/// # Errors
/// - Returns `Invalid` when the config does not validate.
/// - Returns `AlreadyInstalled` when a different config is already active.
pub fn install_listing_config(config: ListingConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let active = LISTING_CONFIG.get_or_init(|| config);
    if *active != config {
        return Err(ConfigError::AlreadyInstalled(*active));
    }
    Ok(())
}

/// Active process-wide listing defaults (built-in defaults until installed).
pub fn listing_config() -> ListingConfig {
    LISTING_CONFIG.get().copied().unwrap_or_default()
}

/// Default page size for listings that take no explicit size.
pub fn pagination_limit() -> u32 {
    listing_config().default_page_size
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ConfigError, ListingConfig};
    use std::path::PathBuf;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.pagination.default_page_size, 10);
    }

    #[test]
    fn parses_all_sections() {
        let config = CoreConfig::from_toml_str(
            r#"
            [pagination]
            default_page_size = 25
            max_page_size = 50

            [storage]
            upload_root = "/srv/uploads"

            [logging]
            level = "warn"
            dir = "/var/log/parcel"
            "#,
        )
        .unwrap();

        assert_eq!(config.pagination.default_page_size, 25);
        assert_eq!(config.pagination.max_page_size, 50);
        assert_eq!(config.storage.upload_root, PathBuf::from("/srv/uploads"));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.dir, Some(PathBuf::from("/var/log/parcel")));
    }

    #[test]
    fn rejects_default_above_max() {
        let err = CoreConfig::from_toml_str(
            "[pagination]\ndefault_page_size = 80\nmax_page_size = 40\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = CoreConfig::from_toml_str("[pagination\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn normalize_page_size_defaults_and_clamps() {
        let config = ListingConfig {
            default_page_size: 15,
            max_page_size: 30,
        };
        assert_eq!(config.normalize_page_size(0), 15);
        assert_eq!(config.normalize_page_size(7), 7);
        assert_eq!(config.normalize_page_size(99), 30);
    }

    #[test]
    fn normalize_page_size_never_returns_zero() {
        let zero_default = ListingConfig {
            default_page_size: 0,
            max_page_size: 5,
        };
        assert_eq!(zero_default.normalize_page_size(0), 1);
        assert_eq!(zero_default.normalize_page_size(3), 3);

        let zero_max = ListingConfig {
            default_page_size: 0,
            max_page_size: 0,
        };
        assert_eq!(zero_max.normalize_page_size(0), 1);
        assert_eq!(zero_max.normalize_page_size(40), 1);
    }
}
