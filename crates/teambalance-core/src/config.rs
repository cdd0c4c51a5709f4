//! balance.toml configuration parser.
//!
//! `BalanceConfig` is the file model: every key optional, durations kept
//! as strings. `resolve()` turns it into `BalanceSettings`, the typed and
//! validated form the controller consumes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// How the session wants teams balanced outside of managed matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMode {
    /// No automatic balancing.
    Off,
    /// Balancing by forced switches, handled elsewhere.
    Forced,
    /// Balancing by asking for volunteers.
    #[default]
    Volunteer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub mode: BalanceMode,
    /// Population gap tolerated before balancing; `<= 0` disables it.
    pub unbalance_limit: i32,
    /// Grace period after detecting imbalance before asking anyone.
    pub settle_delay: String,
    /// How long an ask stays open on the participant's client.
    pub query_lifetime: String,
    /// Extra expiry slack covering the round trip to the client.
    pub travel_slack: String,
    /// Bonus granted to a volunteer who switches.
    pub incentive_bonus: u32,
    /// Developer override. Only honoured in debug builds.
    pub developer: bool,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            mode: BalanceMode::Volunteer,
            unbalance_limit: 1,
            settle_delay: "30s".to_string(),
            query_lifetime: "30s".to_string(),
            travel_slack: "3s".to_string(),
            incentive_bonus: 150,
            developer: false,
        }
    }
}

impl BalanceConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parse durations and validate values.
    pub fn resolve(&self) -> ConfigResult<BalanceSettings> {
        let settle_delay = duration_key("settle_delay", &self.settle_delay)?;
        let query_lifetime = duration_key("query_lifetime", &self.query_lifetime)?;
        let travel_slack = duration_key("travel_slack", &self.travel_slack)?;

        if query_lifetime.is_zero() {
            return Err(ConfigError::Invalid {
                key: "query_lifetime",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(BalanceSettings {
            mode: self.mode,
            unbalance_limit: self.unbalance_limit,
            settle_delay,
            query_lifetime,
            travel_slack,
            incentive_bonus: self.incentive_bonus,
            developer: self.developer,
        })
    }
}

/// Resolved balance settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSettings {
    pub mode: BalanceMode,
    pub unbalance_limit: i32,
    pub settle_delay: Duration,
    pub query_lifetime: Duration,
    pub travel_slack: Duration,
    pub incentive_bonus: u32,
    pub developer: bool,
}

impl BalanceSettings {
    /// Whether an unbalance limit is configured at all.
    pub fn limit_enabled(&self) -> bool {
        self.unbalance_limit > 0
    }

    /// Total lifetime of one ask: query lifetime plus travel slack.
    pub fn ask_lifetime(&self) -> Duration {
        self.query_lifetime + self.travel_slack
    }
}

impl Default for BalanceSettings {
    fn default() -> Self {
        Self {
            mode: BalanceMode::Volunteer,
            unbalance_limit: 1,
            settle_delay: Duration::from_secs(30),
            query_lifetime: Duration::from_secs(30),
            travel_slack: Duration::from_secs(3),
            incentive_bonus: 150,
            developer: false,
        }
    }
}

/// Parse a duration string like "30s", "2m", "250ms", or a bare number of
/// seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn duration_key(key: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        key,
        value: value.to_string(),
    })
}
