//! # Zone Configuration
//!
//! Startup-time tuning for a zone, loaded once from TOML before the
//! simulation loop starts. Nothing here is consulted on the hot path; the
//! values are baked into the [`Zone`](crate::Zone) at construction.

use serde::{Deserialize, Serialize};

use crate::block::{BLOCK_OVERHEAD, MIN_ZONE_BYTES};
use crate::error::{ZoneError, ZoneResult};

/// Default arena size in bytes.
pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

/// Default split threshold in bytes: leftovers at or below this stay
/// inside the allocated block instead of becoming a fragment.
pub const DEFAULT_MIN_FRAGMENT: u32 = 64;

/// Configuration for a [`Zone`](crate::Zone).
///
/// # Example
///
/// ```toml
/// capacity = 4194304
/// min_fragment = 64
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoneConfig {
    /// Total arena size in bytes, sentinel bookkeeping included.
    pub capacity: usize,
    /// Leftover threshold below which a split is not worth a new block.
    /// Bounds the internal waste of an allocation to this many bytes.
    pub min_fragment: u32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            min_fragment: DEFAULT_MIN_FRAGMENT,
        }
    }
}

impl ZoneConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::InvalidConfig`] for malformed TOML, and the
    /// same errors as [`ZoneConfig::validate`] for bad values.
    pub fn from_toml_str(raw: &str) -> ZoneResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| ZoneError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configured values against the zone's structural limits.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::ZoneTooSmall`] or [`ZoneError::ZoneTooLarge`]
    /// for an unusable capacity, and [`ZoneError::InvalidConfig`] for a
    /// fragment threshold smaller than one block's fixed overhead.
    pub fn validate(&self) -> ZoneResult<()> {
        if self.capacity < MIN_ZONE_BYTES {
            return Err(ZoneError::ZoneTooSmall {
                capacity: self.capacity,
                minimum: MIN_ZONE_BYTES,
            });
        }
        if self.capacity > u32::MAX as usize {
            return Err(ZoneError::ZoneTooLarge {
                capacity: self.capacity,
            });
        }
        if (self.min_fragment as usize) < BLOCK_OVERHEAD {
            return Err(ZoneError::InvalidConfig(format!(
                "min_fragment must be at least {BLOCK_OVERHEAD} bytes"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ZoneConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parses_full_config() {
        let config = ZoneConfig::from_toml_str("capacity = 65536\nmin_fragment = 128\n").unwrap();
        assert_eq!(config.capacity, 65536);
        assert_eq!(config.min_fragment, 128);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config = ZoneConfig::from_toml_str("capacity = 65536\n").unwrap();
        assert_eq!(config.min_fragment, DEFAULT_MIN_FRAGMENT);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let result = ZoneConfig::from_toml_str("capacity = 65536\ngrowth = true\n");
        assert!(matches!(result, Err(ZoneError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_tiny_zone() {
        let result = ZoneConfig {
            capacity: 32,
            ..ZoneConfig::default()
        }
        .validate();
        assert!(matches!(result, Err(ZoneError::ZoneTooSmall { .. })));
    }

    #[test]
    fn test_rejects_fragment_below_block_overhead() {
        let result = ZoneConfig {
            min_fragment: 8,
            ..ZoneConfig::default()
        }
        .validate();
        assert!(matches!(result, Err(ZoneError::InvalidConfig(_))));
    }
}
