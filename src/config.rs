//! Process configuration, read from the environment.

use std::time::Duration;

use chrono::FixedOffset;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration.
///
/// Everything the process needs that is not in the settings sheet: endpoints,
/// credentials, store identifiers, and the pipeline tunables.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Base URL of the Mastodon-compatible instance.
    pub instance_url: String,
    /// Access token for the bot account.
    pub access_token: SecretString,
    /// Base URL of the sheets API.
    pub sheets_api_base: String,
    /// Bearer token for the sheets API.
    pub sheets_token: SecretString,
    /// Spreadsheet holding the game tables.
    pub spreadsheet_id: String,
    /// Optional separate spreadsheet holding the inventory matrix.
    pub bag_spreadsheet_id: Option<String>,
    /// How inventory columns are labelled: `@handle` or bare handle.
    pub user_column_with_at: bool,
    /// Fixed UTC offset used for calendar-day boundaries.
    pub timezone: FixedOffset,
    /// Number of concurrent event workers.
    pub workers: usize,
    /// Inbound mailbox capacity.
    pub inbox_capacity: usize,
    /// How long `submit` may wait on a full mailbox before dropping.
    pub submit_timeout: Duration,
    /// Minimum gap between any two outbound deliveries.
    pub gap_global: Duration,
    /// Minimum gap between two deliveries to the same recipient.
    pub gap_per_account: Duration,
    /// Notification poll interval.
    pub poll_interval: Duration,
    /// Periodic settings-cache invalidation interval.
    pub config_reload_interval: Duration,
    /// TTL for the per-table read cache.
    pub table_cache_ttl: Duration,
    /// TTL for the settings snapshot.
    pub config_cache_ttl: Duration,
    /// Visibility for outbound statuses.
    pub visibility: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            instance_url: "http://localhost".to_string(),
            access_token: SecretString::from("test-token"),
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            sheets_token: SecretString::from("test-token"),
            spreadsheet_id: "test-sheet".to_string(),
            bag_spreadsheet_id: None,
            user_column_with_at: false,
            timezone: FixedOffset::east_opt(9 * 3600).unwrap(),
            workers: 6,
            inbox_capacity: 10_000,
            submit_timeout: Duration::from_secs(1),
            gap_global: Duration::from_secs(8),
            gap_per_account: Duration::from_secs(8),
            poll_interval: Duration::from_secs(15),
            config_reload_interval: Duration::from_secs(1200),
            table_cache_ttl: Duration::from_secs(5),
            config_cache_ttl: Duration::from_secs(1800),
            visibility: "public".to_string(),
        }
    }
}

impl BotConfig {
    /// Build configuration from environment variables.
    ///
    /// Required: `INSTANCE_URL`, `ACCESS_TOKEN`, `SHEETS_TOKEN`, `SHEET_ID`.
    /// Everything else falls back to the defaults above.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let instance_url = require_env("INSTANCE_URL")?;
        let access_token = SecretString::from(require_env("ACCESS_TOKEN")?);
        let sheets_token = SecretString::from(require_env("SHEETS_TOKEN")?);
        let spreadsheet_id = require_env("SHEET_ID")?;

        let tz_hours: i32 = parse_env("TZ_OFFSET_HOURS", 9)?;
        let timezone = FixedOffset::east_opt(tz_hours * 3600).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "TZ_OFFSET_HOURS".into(),
                message: format!("offset {tz_hours}h out of range"),
            }
        })?;

        Ok(Self {
            instance_url,
            access_token,
            sheets_api_base: std::env::var("SHEETS_API_BASE")
                .unwrap_or(defaults.sheets_api_base),
            sheets_token,
            spreadsheet_id,
            bag_spreadsheet_id: std::env::var("BAG_SHEET_ID").ok().filter(|s| !s.is_empty()),
            user_column_with_at: std::env::var("USER_COLUMN_STYLE")
                .map(|v| v == "with_at")
                .unwrap_or(false),
            timezone,
            workers: parse_env("WORKERS", defaults.workers)?,
            inbox_capacity: parse_env("INBOX_CAPACITY", defaults.inbox_capacity)?,
            submit_timeout: Duration::from_millis(parse_env("SUBMIT_TIMEOUT_MS", 1000)?),
            gap_global: Duration::from_millis(parse_env("SEND_GAP_GLOBAL_MS", 8000)?),
            gap_per_account: Duration::from_millis(parse_env("SEND_GAP_PER_ACCT_MS", 8000)?),
            poll_interval: Duration::from_secs(parse_env("POLL_INTERVAL_SEC", 15)?),
            config_reload_interval: Duration::from_secs(parse_env("RELOAD_INTERVAL_SEC", 1200)?),
            table_cache_ttl: Duration::from_secs(parse_env("TABLE_CACHE_TTL_SEC", 5)?),
            config_cache_ttl: Duration::from_secs(parse_env("CONFIG_TTL_SEC", 1800)?),
            visibility: std::env::var("REPLY_VISIBILITY").unwrap_or(defaults.visibility),
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.workers, 6);
        assert_eq!(cfg.gap_global, Duration::from_secs(8));
        assert_eq!(cfg.gap_per_account, Duration::from_secs(8));
        assert_eq!(cfg.visibility, "public");
        // KST boundary for calendar days
        assert_eq!(cfg.timezone.local_minus_utc(), 9 * 3600);
    }
}
