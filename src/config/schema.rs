use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::marketplace::RetryPolicy;
use crate::service::{ReferenceBirth, ServicePrices};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Birth data used for market-wide readings.
    pub reference_birth: ReferenceBirth,
    pub cache: CacheConfig,
    pub marketplace: MarketplaceConfig,
    pub prices: ServicePrices,
    /// Where sales are recorded. Defaults to sales_log.json in the config directory.
    pub sales_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// humantime duration, e.g. "1h" or "90m"
    pub ttl: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: "1h".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub poll_interval: String,
    pub accept_attempts: usize,
    /// How long an accepted result waits for the buyer to pay.
    pub pending_ttl: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            poll_interval: "5s".to_string(),
            accept_attempts: 3,
            pending_ttl: "1h".to_string(),
        }
    }
}

impl Config {
    pub fn cache_ttl(&self) -> Result<Duration> {
        humantime::parse_duration(&self.cache.ttl)
            .with_context(|| format!("Invalid cache.ttl '{}'", self.cache.ttl))
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        humantime::parse_duration(&self.marketplace.poll_interval).with_context(|| {
            format!(
                "Invalid marketplace.poll_interval '{}'",
                self.marketplace.poll_interval
            )
        })
    }

    pub fn pending_ttl(&self) -> Result<Duration> {
        humantime::parse_duration(&self.marketplace.pending_ttl).with_context(|| {
            format!(
                "Invalid marketplace.pending_ttl '{}'",
                self.marketplace.pending_ttl
            )
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.marketplace.accept_attempts,
            ..RetryPolicy::default()
        }
    }

    pub fn sales_log_path(&self) -> PathBuf {
        self.sales_log
            .clone()
            .unwrap_or_else(crate::sales::get_sales_log_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Gender;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config: Config = serde_saphyr::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_ttl().unwrap(), Duration::from_secs(3600));
        assert_eq!(config.poll_interval().unwrap(), Duration::from_secs(5));
        assert_eq!(config.pending_ttl().unwrap(), Duration::from_secs(3600));
        assert_eq!(config.prices.deep_luck, 0.50);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
reference_birth:
  birth_date: "1985-11-30"
  gender: F
cache:
  ttl: 90m
prices:
  deep_luck: 1.25
sales_log: /tmp/trinity-sales.json
"#;
        let config: Config = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(config.reference_birth.birth_date, "1985-11-30");
        assert_eq!(config.reference_birth.birth_time, "12:00");
        assert_eq!(config.reference_birth.gender, Gender::Female);
        assert_eq!(config.cache_ttl().unwrap(), Duration::from_secs(5400));
        assert_eq!(config.prices.daily_luck, 0.01);
        assert_eq!(config.prices.deep_luck, 1.25);
        assert_eq!(
            config.sales_log_path(),
            PathBuf::from("/tmp/trinity-sales.json")
        );
        assert_eq!(config.marketplace.accept_attempts, 3);
    }

    #[test]
    fn test_bad_duration_reported() {
        let config = Config {
            cache: CacheConfig {
                ttl: "soon".to_string(),
            },
            ..Default::default()
        };
        let err = config.cache_ttl().unwrap_err();
        assert!(err.to_string().contains("cache.ttl"));
    }

    #[test]
    fn test_retry_policy_attempts() {
        let mut config = Config::default();
        config.marketplace.accept_attempts = 5;
        assert_eq!(config.retry_policy().attempts, 5);
    }
}
