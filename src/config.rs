//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the quota and
//! status-code constants used across the bot.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Base URL of the cat image provider
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    /// Invite link to the support chat, shown in help output
    pub support_server_url: Option<String>,

    /// Link to the bot's source code, shown in help output
    pub source_url: Option<String>,
}

fn default_image_base_url() -> String {
    "https://http.cat".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use httpcat_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }
}

// Status codes
/// Inclusive code ranges the random picker draws from
pub const VALID_RANGES: [(u16, u16); 6] = [
    (100, 101),
    (200, 207),
    (300, 307),
    (400, 451),
    (499, 511),
    (599, 599),
];
/// Code served when a query carries no code at all
pub const DEFAULT_CODE: u16 = 400;
/// Code served when a query cannot be read as a status code
pub const UNREADABLE_CODE: u16 = 422;
/// Code served in place of a throttled image query
pub const THROTTLED_CODE: u16 = 429;

// Quota configuration
/// Image queries allowed per member within one member window
pub const MEMBER_BUCKET_RATE: u32 = 5;
/// Length of the per-member quota window in seconds
pub const MEMBER_BUCKET_WINDOW_SECS: f64 = 10.0;
/// Image queries allowed across all chats within one global window
pub const GLOBAL_BUCKET_RATE: u32 = 500;
/// Length of the global quota window in seconds
pub const GLOBAL_BUCKET_WINDOW_SECS: f64 = 3600.0;
/// Help invocations allowed per member within one help window
pub const HELP_BUCKET_RATE: u32 = 1;
/// Length of the help quota window in seconds
pub const HELP_BUCKET_WINDOW_SECS: f64 = 10.0;
/// Longest wait (seconds) worth sleeping through before retrying a throttled command
pub const RETRY_WAIT_CEILING_SECS: f64 = 3.0;

// Image provider
/// Timeout for a single image download
pub const FETCH_TIMEOUT_SECS: u64 = 30;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Tests run sequentially to avoid environment variable race conditions
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        // 1. Test standard loading with the provider default
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::remove_var("IMAGE_BASE_URL");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.image_base_url, "https://http.cat");
        assert_eq!(settings.support_server_url, None);

        // 2. Test overriding the provider URL
        env::set_var("IMAGE_BASE_URL", "http://127.0.0.1:9000");

        let settings = Settings::new()?;
        assert_eq!(settings.image_base_url, "http://127.0.0.1:9000");

        // 3. Empty env vars are treated as unset, so the default returns
        env::set_var("IMAGE_BASE_URL", "");

        let settings = Settings::new()?;
        assert_eq!(settings.image_base_url, "https://http.cat");

        env::remove_var("IMAGE_BASE_URL");
        env::remove_var("TELEGRAM_TOKEN");
        Ok(())
    }

    #[test]
    fn test_valid_ranges_shape() {
        for (lo, hi) in VALID_RANGES {
            assert!(lo <= hi);
        }
        // 452-498 is a deliberate gap; 599 is a single-code range
        assert!(!VALID_RANGES.iter().any(|(lo, hi)| (*lo..=*hi).contains(&460)));
        assert!(VALID_RANGES.iter().any(|(lo, hi)| (*lo..=*hi).contains(&599)));
        assert!(VALID_RANGES.iter().any(|(lo, hi)| (*lo..=*hi).contains(&DEFAULT_CODE)));
        assert!(VALID_RANGES.iter().any(|(lo, hi)| (*lo..=*hi).contains(&THROTTLED_CODE)));
    }
}
