use crate::error::{PelaError, Result};
use chrono::{FixedOffset, Offset, Utc};
use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "sqlite:pelafacil.db";
const MAX_VOTING_WINDOW_HOURS: i64 = 24 * 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub max_connections: u32,
    /// Hours after kickoff during which craque/bagre votes are accepted.
    pub voting_window_hours: i64,
    pub check_interval_seconds: u64,
    pub utc_offset_hours: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| PelaError::Config("DISCORD_TOKEN is not set".to_string()))?;

        let utc_offset_hours = parse_or(&lookup, "PELAFACIL_UTC_OFFSET_HOURS", -3);
        let utc_offset_hours = in_range_or("PELAFACIL_UTC_OFFSET_HOURS", utc_offset_hours, -12..=14, -3);

        // The window feeds date arithmetic in the ballot check and the announcer cutoff
        let voting_window_hours = parse_or(&lookup, "VOTING_WINDOW_HOURS", 24);
        let voting_window_hours =
            in_range_or("VOTING_WINDOW_HOURS", voting_window_hours, 1..=MAX_VOTING_WINDOW_HOURS, 24);

        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5);
        let max_connections = in_range_or("DATABASE_MAX_CONNECTIONS", max_connections, 1..=u32::MAX, 5);

        Ok(Self {
            discord_token,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| {
                info!("DATABASE_URL not set, using default: {}", DEFAULT_DATABASE_URL);
                DEFAULT_DATABASE_URL.to_string()
            }),
            max_connections,
            voting_window_hours,
            check_interval_seconds: parse_or(&lookup, "RESULTS_CHECK_INTERVAL_SECONDS", 60),
            utc_offset_hours,
        })
    }

    /// Offset used to read and display match dates typed by players.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {} value '{}': {}, using default: {}", key, raw, e, default);
            default
        }),
        None => default,
    }
}

fn in_range_or<T>(key: &str, value: T, range: RangeInclusive<T>, default: T) -> T
where
    T: PartialOrd + Display,
{
    if range.contains(&value) {
        value
    } else {
        warn!("{}={} out of range, using default: {}", key, value, default);
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.voting_window_hours, 24);
        assert_eq!(config.check_interval_seconds, 60);
        assert_eq!(config.utc_offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "  ")])).unwrap_err();
        assert!(matches!(err, PelaError::Config(_)));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("VOTING_WINDOW_HOURS", "forever"),
            ("DATABASE_MAX_CONNECTIONS", "2"),
            ("PELAFACIL_UTC_OFFSET_HOURS", "40"),
        ]))
        .unwrap();
        assert_eq!(config.voting_window_hours, 24);
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.utc_offset_hours, -3);
    }

    #[test]
    fn out_of_range_numbers_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("VOTING_WINDOW_HOURS", "-5"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.voting_window_hours, 24);
        assert_eq!(config.max_connections, 5);

        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("VOTING_WINDOW_HOURS", "10000000000"),
        ]))
        .unwrap();
        assert_eq!(config.voting_window_hours, 24);
    }

    #[test]
    fn a_month_long_window_is_accepted() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("VOTING_WINDOW_HOURS", "720"),
        ]))
        .unwrap();
        assert_eq!(config.voting_window_hours, MAX_VOTING_WINDOW_HOURS);
    }
}
