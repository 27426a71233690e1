//! Configuration loading and validation.
//!
//! The configuration is an explicit immutable structure passed into each
//! component; there is no ambient global lookup. It is loaded once at
//! startup from a TOML file.
//!
//! Example:
//!
//! ```toml
//! staging_dir = "/var/lib/ringmirror/staging"
//! state_dir = "/var/lib/ringmirror/state"
//! remote = "backup@mirror.example.net:/vault"
//! sources = ["/etc", "/home", "/var/mail"]
//! excludes = ["*.tmp", "lost+found/"]
//!
//! [[tier]]
//! name = "hourly"
//! ring_size = 4
//! period_secs = 3600
//!
//! [[tier]]
//! name = "daily"
//! ring_size = 7
//! period_secs = 86400
//!
//! [database]
//! command = ["mysqldump", "--all-databases"]
//!
//! [inventory]
//! command = ["dpkg", "--get-selections"]
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::types::{BackupSource, Tier, TierName};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML or is missing required fields.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The config file parsed but its contents are unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Upper bound on a tier's period: 100 years. Anything larger is a typo,
/// and keeps the period well inside the range duration arithmetic can
/// represent.
pub const MAX_PERIOD_SECS: u64 = 100 * 365 * 86_400;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Local directory for ride-along artifacts (database dump, package
    /// inventory) and transient transfer-support files.
    pub staging_dir: PathBuf,

    /// Local directory holding per-tier clock markers and the run lock.
    pub state_dir: PathBuf,

    /// rsync-reachable remote target, e.g. `backup@mirror:/vault` or an
    /// `rsync://` URL.
    pub remote: String,

    /// Absolute local paths to mirror.
    pub sources: Vec<PathBuf>,

    /// Patterns excluded from every transfer.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Secret for rsync daemon authentication. Materialized as a transient
    /// password file for the transfer and removed on every exit path.
    #[serde(default)]
    pub auth_secret: Option<String>,

    /// Retention tiers, in configuration order.
    #[serde(rename = "tier")]
    pub tiers: Vec<TierConfig>,

    /// Optional database dump ride-along.
    #[serde(default)]
    pub database: Option<RideAlongConfig>,

    /// Optional package inventory ride-along.
    #[serde(default)]
    pub inventory: Option<RideAlongConfig>,
}

/// One retention tier as configured.
#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    pub name: String,

    /// Highest slot number in the rotation ring; zero disables the tier.
    pub ring_size: u32,

    /// Minimum seconds between signoffs before the tier is due again.
    pub period_secs: u64,
}

/// A command whose output rides along with the mirror.
///
/// The command's stdout is captured into `file` under the staging directory
/// before the transfer loop, so the artifact is mirrored like any other file.
#[derive(Debug, Clone, Deserialize)]
pub struct RideAlongConfig {
    /// Program and arguments, e.g. `["dpkg", "--get-selections"]`.
    pub command: Vec<String>,

    /// File name under the staging directory to write the output to.
    #[serde(default)]
    pub file: Option<String>,
}

impl Config {
    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".to_string()));
        }
        for source in &self.sources {
            if !source.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "source path must be absolute: {}",
                    source.display()
                )));
            }
        }

        if self.remote.is_empty() {
            return Err(ConfigError::Invalid("remote target is empty".to_string()));
        }

        if self.tiers.is_empty() {
            return Err(ConfigError::Invalid("no tiers configured".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for tier in &self.tiers {
            if tier.name.is_empty() {
                return Err(ConfigError::Invalid("tier with empty name".to_string()));
            }
            if !seen.insert(tier.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate tier name: {}",
                    tier.name
                )));
            }
            if tier.period_secs > MAX_PERIOD_SECS {
                return Err(ConfigError::Invalid(format!(
                    "tier '{}' period {}s exceeds the maximum of {}s",
                    tier.name, tier.period_secs, MAX_PERIOD_SECS
                )));
            }
        }

        for (label, ride_along) in [("database", &self.database), ("inventory", &self.inventory)] {
            if let Some(cfg) = ride_along {
                if cfg.command.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "{label} ride-along has an empty command"
                    )));
                }
            }
        }

        Ok(())
    }

    /// The configured tiers as domain values.
    pub fn tiers(&self) -> Vec<Tier> {
        self.tiers
            .iter()
            .map(|t| Tier::new(TierName::new(&t.name), t.ring_size, t.period_secs))
            .collect()
    }

    /// The configured sources with derived destination names. When a
    /// ride-along is configured, the staging directory is mirrored too, so
    /// dump and inventory artifacts travel with the pass.
    pub fn backup_sources(&self) -> Vec<BackupSource> {
        let mut sources: Vec<BackupSource> = self
            .sources
            .iter()
            .map(BackupSource::new)
            .collect();

        if self.database.is_some() || self.inventory.is_some() {
            sources.push(BackupSource::new(&self.staging_dir));
        }

        sources
    }

    /// Path of the single-instance lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("ringmirror.lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        staging_dir = "/var/lib/ringmirror/staging"
        state_dir = "/var/lib/ringmirror/state"
        remote = "backup@mirror:/vault"
        sources = ["/etc"]

        [[tier]]
        name = "daily"
        ring_size = 7
        period_secs = 86400
    "#;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn minimal_config_parses_and_validates() {
        let config = parse(MINIMAL);
        config.validate().unwrap();

        let tiers = config.tiers();
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers[0].name.as_str(), "daily");
        assert_eq!(tiers[0].ring_size, 7);
        assert_eq!(tiers[0].period_secs, 86_400);
    }

    #[test]
    fn sources_get_flattened_dest_names() {
        let mut config = parse(MINIMAL);
        config.sources = vec!["/etc".into(), "/var/mail".into()];

        let sources = config.backup_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].dest_name, "var_mail");
    }

    #[test]
    fn staging_dir_rides_along_when_database_configured() {
        let config = parse(&format!(
            "{MINIMAL}\n[database]\ncommand = [\"mysqldump\", \"--all-databases\"]\n"
        ));
        config.validate().unwrap();

        let sources = config.backup_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].dest_name, "var_lib_ringmirror_staging");
    }

    #[test]
    fn relative_source_rejected() {
        let mut config = parse(MINIMAL);
        config.sources = vec!["etc".into()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn duplicate_tier_name_rejected() {
        let config = parse(&format!(
            "{MINIMAL}\n[[tier]]\nname = \"daily\"\nring_size = 3\nperiod_secs = 60\n"
        ));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn absurd_period_rejected() {
        let mut config = parse(MINIMAL);
        config.tiers[0].period_secs = MAX_PERIOD_SECS + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.tiers[0].period_secs = MAX_PERIOD_SECS;
        config.validate().unwrap();
    }

    #[test]
    fn empty_ride_along_command_rejected() {
        let config = parse(&format!("{MINIMAL}\n[inventory]\ncommand = []\n"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load(Path::new("/nonexistent/ringmirror.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
