//! Configuration for the bacmap topology scanner.
//!
//! Loaded from `bacmap.toml` `[scanner]` section or `BACMAP__`
//! environment variables. Validation runs before any network traffic;
//! a bad configuration aborts the scan outright.

use std::net::IpAddr;
use std::time::Duration;

use ipnet::IpNet;
use serde::Deserialize;

use bacmap_core::{BacnetAddress, DeviceInstance};

use crate::error::{DiscoverError, Result};

/// Top-level scanner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Name of the scanning station; also its self-node id.
    #[serde(default = "default_local_name")]
    pub local_name: String,

    /// Device instance the scanner claims for itself.
    #[serde(default = "default_local_instance")]
    pub local_instance: u32,

    /// Logical network number of the local segment, if any.
    #[serde(default)]
    pub local_network: Option<u16>,

    /// Local station address, `ip` or `ip:port`.
    #[serde(default = "default_local_address")]
    pub local_address: String,

    /// ASHRAE vendor identifier the scanner reports.
    #[serde(default = "default_vendor_identifier")]
    pub vendor_identifier: u16,

    /// BBMD to register with as a foreign device, if scanning from
    /// outside the target subnets.
    #[serde(default)]
    pub foreign_registration: Option<String>,

    /// Foreign-device registration time-to-live in seconds.
    #[serde(default = "default_time_to_live")]
    pub time_to_live: u16,

    /// Known BBMD addresses (the allow-list; probing can add more).
    #[serde(default)]
    pub bbmds: Vec<IpAddr>,

    /// Declared subnets; undeclared addresses synthesize new entries.
    #[serde(default)]
    pub subnets: Vec<IpNet>,

    /// Lowest device instance to sweep.
    #[serde(default)]
    pub low_limit: u32,

    /// Highest device instance to sweep.
    #[serde(default = "default_high_limit")]
    pub high_limit: u32,

    /// Who-Is window width over sparse instance ranges.
    #[serde(default = "default_empty_step_size")]
    pub empty_step_size: u32,

    /// Known-device count at which a window truncates.
    #[serde(default = "default_full_step_size")]
    pub full_step_size: u32,

    /// Timeout for BDT/FDT table reads, in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Prefix length for subnets synthesized around undeclared
    /// addresses.
    #[serde(default = "default_synthesized_prefix_len")]
    pub synthesized_prefix_len: u8,
}

impl ScannerConfig {
    /// The fatal setup gate: every range and address is checked here,
    /// before the first broadcast goes out.
    pub fn validate(&self) -> Result<()> {
        DeviceInstance::new(self.local_instance)
            .map_err(|e| DiscoverError::Config(e.to_string()))?;
        DeviceInstance::new(self.high_limit)
            .map_err(|e| DiscoverError::Config(e.to_string()))?;
        if self.low_limit > self.high_limit {
            return Err(DiscoverError::Config(format!(
                "low_limit {} exceeds high_limit {}",
                self.low_limit, self.high_limit
            )));
        }
        if self.empty_step_size == 0 || self.full_step_size == 0 {
            return Err(DiscoverError::Config(
                "step sizes must be at least 1".to_string(),
            ));
        }
        if self.synthesized_prefix_len == 0 || self.synthesized_prefix_len > 128 {
            return Err(DiscoverError::Config(format!(
                "synthesized_prefix_len {} outside 1..=128",
                self.synthesized_prefix_len
            )));
        }
        if self.probe_timeout_secs == 0 {
            return Err(DiscoverError::Config(
                "probe_timeout_secs must be at least 1".to_string(),
            ));
        }
        let local = self
            .local_address
            .parse::<BacnetAddress>()
            .map_err(|e| DiscoverError::Config(e.to_string()))?;
        if local.as_ip().is_none() {
            return Err(DiscoverError::Config(format!(
                "local_address `{}` is not an IP station address",
                self.local_address
            )));
        }
        if let Some(registration) = &self.foreign_registration {
            registration
                .parse::<BacnetAddress>()
                .map_err(|e| DiscoverError::Config(e.to_string()))?;
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn default_local_name() -> String {
    "bacmap".to_string()
}

fn default_local_instance() -> u32 {
    999
}

fn default_local_address() -> String {
    "0.0.0.0".to_string()
}

fn default_vendor_identifier() -> u16 {
    999
}

fn default_time_to_live() -> u16 {
    30
}

fn default_high_limit() -> u32 {
    4_194_303
}

fn default_empty_step_size() -> u32 {
    1000
}

fn default_full_step_size() -> u32 {
    100
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_synthesized_prefix_len() -> u8 {
    24
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            local_name: default_local_name(),
            local_instance: default_local_instance(),
            local_network: None,
            local_address: default_local_address(),
            vendor_identifier: default_vendor_identifier(),
            foreign_registration: None,
            time_to_live: default_time_to_live(),
            bbmds: Vec::new(),
            subnets: Vec::new(),
            low_limit: 0,
            high_limit: default_high_limit(),
            empty_step_size: default_empty_step_size(),
            full_step_size: default_full_step_size(),
            probe_timeout_secs: default_probe_timeout_secs(),
            synthesized_prefix_len: default_synthesized_prefix_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScannerConfig::default();
        assert_eq!(config.high_limit, 4_194_303);
        assert_eq!(config.empty_step_size, 1000);
        assert_eq!(config.full_step_size, 100);
        assert_eq!(config.probe_timeout_secs, 5);
        assert_eq!(config.synthesized_prefix_len, 24);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: ScannerConfig = serde_json::from_str(
            r#"{
                "local_address": "10.0.0.2",
                "subnets": ["10.0.0.0/24"],
                "bbmds": ["10.0.0.3"],
                "high_limit": 100000
            }"#,
        )
        .unwrap();

        assert_eq!(config.local_name, "bacmap");
        assert_eq!(config.subnets.len(), 1);
        assert_eq!(config.bbmds.len(), 1);
        assert_eq!(config.high_limit, 100_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_inverted_limits() {
        let config = ScannerConfig {
            low_limit: 10,
            high_limit: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DiscoverError::Config(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_steps() {
        let config = ScannerConfig {
            empty_step_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ScannerConfig {
            full_step_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range_high_limit() {
        let config = ScannerConfig {
            high_limit: 4_194_304,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_ip_local_address() {
        let config = ScannerConfig {
            local_address: "2001:0x08".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ScannerConfig {
            local_address: "not an address".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
