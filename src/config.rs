//! Run configuration from the environment (`.env` honored via `dotenvy`).

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::extract::DescriptionSource;
use crate::taxonomy::default_excluded_roots;

pub const ENV_ACCESS_KEY: &str = "AMAZON_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "AMAZON_SECRET_KEY";
pub const ENV_PARTNER_TAG: &str = "AMAZON_PARTNER_TAG";
pub const ENV_COUNTRY: &str = "AMAZON_COUNTRY";
pub const ENV_THROTTLE_SECS: &str = "HARVEST_THROTTLE_SECS";
pub const ENV_MAX_PAGES: &str = "HARVEST_MAX_PAGES";
pub const ENV_PAGE_SIZE: &str = "HARVEST_PAGE_SIZE";
pub const ENV_EXCLUDED_ROOTS: &str = "HARVEST_EXCLUDED_ROOTS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "HARVEST_REQUEST_TIMEOUT_SECS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),
    #[error("Environment variable {name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Credentials for the product search API.
#[derive(Clone)]
pub struct ApiCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub partner_tag: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("partner_tag", &self.partner_tag)
            .finish()
    }
}

impl ApiCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Ok(Self {
            access_key: required(ENV_ACCESS_KEY)?,
            secret_key: required(ENV_SECRET_KEY)?,
            partner_tag: required(ENV_PARTNER_TAG)?,
        })
    }
}

/// Everything the harvest loop needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Two-letter marketplace country code.
    pub country: String,
    /// Minimum time between the start of two provider calls.
    pub throttle: Duration,
    /// Pages requested per query, starting at 1.
    pub max_pages: u32,
    /// Items requested per page.
    pub page_size: u32,
    pub excluded_roots: HashSet<String>,
    pub description: DescriptionSource,
    pub request_timeout: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            country: "IT".to_string(),
            throttle: Duration::from_secs(2),
            max_pages: 10,
            page_size: 10,
            excluded_roots: default_excluded_roots(),
            description: DescriptionSource::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HarvestConfig {
    /// Defaults overridden by whichever `HARVEST_*` / `AMAZON_COUNTRY`
    /// variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        let mut config = Self::default();

        if let Some(country) = optional(ENV_COUNTRY) {
            config.country = country;
        }
        if let Some(secs) = parsed::<f64>(ENV_THROTTLE_SECS)? {
            config.throttle = non_negative_secs(ENV_THROTTLE_SECS, secs)?;
        }
        if let Some(pages) = parsed::<u32>(ENV_MAX_PAGES)? {
            config.max_pages = pages;
        }
        if let Some(size) = parsed::<u32>(ENV_PAGE_SIZE)? {
            config.page_size = size;
        }
        if let Some(roots) = optional(ENV_EXCLUDED_ROOTS) {
            config.excluded_roots = parse_roots(&roots);
        }
        if let Some(secs) = parsed::<u64>(ENV_REQUEST_TIMEOUT_SECS)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Splits a comma-separated root list, ignoring blanks.
pub fn parse_roots(list: &str) -> HashSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn non_negative_secs(name: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::Invalid {
        name,
        value: secs.to_string(),
    })
}

fn load_dotenv() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    optional(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value: value.clone() })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roots() {
        let roots = parse_roots(" it-toys, ,it-tools,");
        assert_eq!(roots.len(), 2);
        assert!(roots.contains("it-toys"));
        assert!(roots.contains("it-tools"));
    }

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::default();
        assert_eq!(config.country, "IT");
        assert_eq!(config.throttle, Duration::from_secs(2));
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.page_size, 10);
        assert!(config.excluded_roots.contains("it-automotive"));
    }

    #[test]
    fn test_negative_throttle_rejected() {
        assert!(non_negative_secs(ENV_THROTTLE_SECS, -1.0).is_err());
        assert_eq!(
            non_negative_secs(ENV_THROTTLE_SECS, 2.5).unwrap(),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let credentials = ApiCredentials {
            access_key: "AKID".into(),
            secret_key: "super-secret".into(),
            partner_tag: "tag-21".into(),
        };
        let printed = format!("{:?}", credentials);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("AKID"));
    }
}
