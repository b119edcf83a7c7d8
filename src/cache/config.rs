//! Per-space cache policy.
//!
//! Controls which tiers exist, how large the in-memory tiers are, whether
//! failed responses are remembered and how each tier encodes payloads.

use std::num::NonZeroUsize;

use serde::Deserialize;

use super::codec::PayloadCodec;

const DEFAULT_PRIMARY_CAPACITY: usize = 512;
const DEFAULT_FALLBACK_CAPACITY: usize = 512;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Remember failed responses in the primary tier as a fail marker.
    pub cache_fail_responses: bool,
    /// Entries kept by an in-memory primary cache.
    pub primary_capacity: usize,
    /// Entries kept by an in-memory fallback cache.
    pub fallback_capacity: usize,
    pub primary_codec: PayloadCodec,
    pub fallback_codec: PayloadCodec,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_fail_responses: false,
            primary_capacity: DEFAULT_PRIMARY_CAPACITY,
            fallback_capacity: DEFAULT_FALLBACK_CAPACITY,
            primary_codec: PayloadCodec::Plain,
            fallback_codec: PayloadCodec::Zstd,
        }
    }
}

impl CacheConfig {
    /// Returns the primary capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn primary_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.primary_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the fallback capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn fallback_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.fallback_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(!config.cache_fail_responses);
        assert_eq!(config.primary_capacity, 512);
        assert_eq!(config.fallback_capacity, 512);
        assert_eq!(config.primary_codec, PayloadCodec::Plain);
        assert_eq!(config.fallback_codec, PayloadCodec::Zstd);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            primary_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.primary_capacity_non_zero().get(), 1);
        assert_eq!(config.fallback_capacity_non_zero().get(), 512);
    }

    #[test]
    fn deserializes_codec_names() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"cache_fail_responses": true, "primary_codec": "zstd", "fallback_codec": "plain"}"#,
        )
        .expect("valid config");
        assert!(config.cache_fail_responses);
        assert_eq!(config.primary_codec, PayloadCodec::Zstd);
        assert_eq!(config.fallback_codec, PayloadCodec::Plain);
        assert_eq!(config.primary_capacity, 512);
    }
}
