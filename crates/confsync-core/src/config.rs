//! Configuration for the sync engines and editors
//!
//! Paths and tuning knobs are serde structs so the daemon can populate them
//! from its environment; every field has a default matching the conventional
//! dnsmasq deployment layout.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::sync::{RewatchPolicy, TrackedPair};

/// Collection key mirroring the primary configuration file
pub const PRIMARY_CONFIG_KEY: &str = "dnsmasq-config";
/// Collection key mirroring the auxiliary name-resolution entries file
pub const CUSTOM_DNS_KEY: &str = "dnsmasq-custom-dns";
/// Collection key mirroring the address reservations file
pub const RESERVATIONS_KEY: &str = "dnsmasq-reservations";
/// Collection key mirroring the lease file
pub const LEASES_KEY: &str = "dnsmasq-leases";

fn default_primary_config_path() -> PathBuf {
    PathBuf::from("/etc/dnsmasq.conf")
}

fn default_custom_dns_path() -> PathBuf {
    PathBuf::from("/etc/dnsmasq.d/custom.conf")
}

fn default_reservations_path() -> PathBuf {
    PathBuf::from("/etc/dnsmasq.d/reservations.conf")
}

fn default_leases_path() -> PathBuf {
    PathBuf::from("/var/lib/misc/dnsmasq.leases")
}

fn default_retry_max_attempts() -> usize {
    10
}

fn default_retry_backoff_min_ms() -> u64 {
    500
}

fn default_retry_backoff_max_ms() -> u64 {
    5_000
}

fn default_rewatch_max_attempts() -> usize {
    10
}

fn default_rewatch_initial_delay_ms() -> u64 {
    100
}

fn default_rewatch_max_delay_ms() -> u64 {
    5_000
}

/// Tuning for the remote-write retry loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_retry_backoff_min_ms")]
    pub backoff_min_ms: u64,
    #[serde(default = "default_retry_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            backoff_min_ms: default_retry_backoff_min_ms(),
            backoff_max_ms: default_retry_backoff_max_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_min: Duration::from_millis(self.backoff_min_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

/// Tuning for watch re-registration backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewatchConfig {
    #[serde(default = "default_rewatch_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_rewatch_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_rewatch_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RewatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_rewatch_max_attempts(),
            initial_delay_ms: default_rewatch_initial_delay_ms(),
            max_delay_ms: default_rewatch_max_delay_ms(),
        }
    }
}

impl RewatchConfig {
    pub fn policy(&self) -> RewatchPolicy {
        RewatchPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Full engine configuration: tracked file locations plus tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_primary_config_path")]
    pub primary_config_path: PathBuf,
    #[serde(default = "default_custom_dns_path")]
    pub custom_dns_path: PathBuf,
    #[serde(default = "default_reservations_path")]
    pub reservations_path: PathBuf,
    #[serde(default = "default_leases_path")]
    pub leases_path: PathBuf,
    /// Mirror the lease file as a fourth tracked pair
    ///
    /// Off by default: the lease file churns on every renewal, and most
    /// deployments only want it readable through the store, not synced back.
    #[serde(default)]
    pub sync_leases: bool,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rewatch: RewatchConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            primary_config_path: default_primary_config_path(),
            custom_dns_path: default_custom_dns_path(),
            reservations_path: default_reservations_path(),
            leases_path: default_leases_path(),
            sync_leases: false,
            retry: RetryConfig::default(),
            rewatch: RewatchConfig::default(),
        }
    }
}

impl SyncConfig {
    /// The tracked pairs this configuration describes, in startup order
    ///
    /// The field key of each record is the tracked file's base name.
    pub fn tracked_pairs(&self) -> Vec<TrackedPair> {
        let mut pairs = vec![
            TrackedPair::new(&self.primary_config_path, PRIMARY_CONFIG_KEY, "dnsmasq.conf"),
            TrackedPair::new(&self.custom_dns_path, CUSTOM_DNS_KEY, "custom.conf"),
            TrackedPair::new(&self.reservations_path, RESERVATIONS_KEY, "reservations.conf"),
        ];
        if self.sync_leases {
            pairs.push(TrackedPair::new(&self.leases_path, LEASES_KEY, "dnsmasq.leases"));
        }
        pairs
    }

    /// Reject configurations that cannot work before any engine starts
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.backoff_min_ms > self.retry.backoff_max_ms {
            return Err(Error::config(
                "retry.backoff_min_ms must not exceed retry.backoff_max_ms",
            ));
        }
        if self.rewatch.max_attempts == 0 {
            return Err(Error::config("rewatch.max_attempts must be at least 1"));
        }

        let mut paths: Vec<&PathBuf> = vec![
            &self.primary_config_path,
            &self.custom_dns_path,
            &self.reservations_path,
        ];
        if self.sync_leases {
            paths.push(&self.leases_path);
        }
        for (i, a) in paths.iter().enumerate() {
            if a.as_os_str().is_empty() {
                return Err(Error::config("tracked file paths must not be empty"));
            }
            if paths[i + 1..].contains(a) {
                return Err(Error::config(format!(
                    "tracked file path {} is used twice",
                    a.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_and_yield_three_pairs() {
        let config = SyncConfig::default();
        config.validate().unwrap();

        let pairs = config.tracked_pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].collection_key, PRIMARY_CONFIG_KEY);
        assert_eq!(pairs[0].field_key, "dnsmasq.conf");
        assert_eq!(pairs[2].file_path, PathBuf::from("/etc/dnsmasq.d/reservations.conf"));
    }

    #[test]
    fn lease_pair_is_opt_in() {
        let config = SyncConfig {
            sync_leases: true,
            ..SyncConfig::default()
        };
        let pairs = config.tracked_pairs();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[3].collection_key, LEASES_KEY);
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let config = SyncConfig {
            custom_dns_path: default_primary_config_path(),
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn inverted_backoff_window_is_rejected() {
        let config = SyncConfig {
            retry: RetryConfig {
                backoff_min_ms: 10_000,
                ..RetryConfig::default()
            },
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.primary_config_path, PathBuf::from("/etc/dnsmasq.conf"));
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.rewatch.initial_delay_ms, 100);
        assert!(!config.sync_leases);
    }
}
