//! Runtime configuration, read once from the environment.

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Inclusive bounds of the randomized pause between feed expansions.
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Hard cap on units collected per run.
    pub max_units: usize,
    /// Consecutive expansion rounds with no new units before giving up.
    pub max_idle_rounds: u32,
    /// Timezone in which naive wall times from posts are interpreted.
    pub timezone: Tz,
    /// Directory for extraction output files.
    pub output_dir: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 2,
            max_delay_secs: 5,
            max_units: 50,
            max_idle_rounds: 20,
            timezone: chrono_tz::Europe::Warsaw,
            output_dir: "output".to_string(),
        }
    }
}

impl ScraperConfig {
    /// Build from `HARVESTER_*` environment variables, with defaults for
    /// anything unset. An unparseable timezone is an error; an unparseable
    /// number falls back with a warning.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let timezone = match env::var("HARVESTER_TIMEZONE") {
            Ok(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid HARVESTER_TIMEZONE {}: {}", name, e))?,
            Err(_) => defaults.timezone,
        };

        let mut min_delay_secs = env_or("HARVESTER_MIN_DELAY_SECS", defaults.min_delay_secs);
        let mut max_delay_secs = env_or("HARVESTER_MAX_DELAY_SECS", defaults.max_delay_secs);
        if min_delay_secs > max_delay_secs {
            warn!(
                "Delay window is inverted ({}..{}), swapping bounds",
                min_delay_secs, max_delay_secs
            );
            std::mem::swap(&mut min_delay_secs, &mut max_delay_secs);
        }

        Ok(Self {
            min_delay_secs,
            max_delay_secs,
            max_units: env_or("HARVESTER_MAX_UNITS", defaults.max_units),
            max_idle_rounds: env_or("HARVESTER_MAX_IDLE_ROUNDS", defaults.max_idle_rounds),
            timezone,
            output_dir: env::var("HARVESTER_OUTPUT_DIR").unwrap_or(defaults.output_dir),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable {}={}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ScraperConfig::default();
        assert_eq!(config.max_units, 50);
        assert_eq!(config.max_idle_rounds, 20);
        assert!(config.min_delay_secs <= config.max_delay_secs);
        assert_eq!(config.timezone, chrono_tz::Europe::Warsaw);
    }

    #[test]
    fn inverted_delay_window_is_swapped() {
        env::set_var("HARVESTER_MIN_DELAY_SECS", "5");
        env::set_var("HARVESTER_MAX_DELAY_SECS", "2");
        let config = ScraperConfig::from_env().unwrap();
        env::remove_var("HARVESTER_MIN_DELAY_SECS");
        env::remove_var("HARVESTER_MAX_DELAY_SECS");

        assert_eq!(config.min_delay_secs, 2);
        assert_eq!(config.max_delay_secs, 5);
    }
}
