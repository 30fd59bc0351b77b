use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BrewError, Result};
use crate::models::Algorithm;

/// Full configuration bundle for one run, loaded from a TOML file and
/// validated before any boundary call.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub slack: SlackSection,
    pub pairing: PairingSection,
    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlackSection {
    pub api_token: String,
    pub channel_id: String,
    #[serde(default)]
    pub ignore_members: Vec<String>,
    /// Request timeout toward the platform, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairingSection {
    pub algorithm: Algorithm,
    #[serde(default = "default_backtrack_days")]
    pub backtrack_days: i64,
    #[serde(default = "default_backtrack_max_attempts")]
    pub backtrack_max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            dry_run: false,
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_backtrack_days() -> i64 {
    30
}

fn default_backtrack_max_attempts() -> u32 {
    3
}

fn default_history_path() -> PathBuf {
    PathBuf::from("history")
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            BrewError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|err| {
            BrewError::Configuration(format!("cannot parse {}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slack.api_token.trim().is_empty() {
            return Err(BrewError::Configuration("slack.api_token is empty".into()));
        }
        if self.slack.channel_id.trim().is_empty() {
            return Err(BrewError::Configuration("slack.channel_id is empty".into()));
        }
        if self.slack.timeout_ms == 0 {
            return Err(BrewError::Configuration(
                "slack.timeout_ms must be at least 1".into(),
            ));
        }
        if self.pairing.backtrack_days < 0 {
            return Err(BrewError::Configuration(
                "pairing.backtrack_days must not be negative".into(),
            ));
        }
        if self.pairing.backtrack_max_attempts == 0 {
            return Err(BrewError::Configuration(
                "pairing.backtrack_max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Ledger location for the configured mode. Dry runs write beside the
    /// real ledger under a marked name so they never feed the recency filter.
    pub fn history_file(&self) -> PathBuf {
        let name = if self.run.dry_run {
            "rounds.dryrun.jsonl"
        } else {
            "rounds.jsonl"
        };
        self.run.history_path.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [slack]
        api_token = "xoxb-test"
        channel_id = "C0000000000"
        ignore_members = ["U0000000009"]

        [pairing]
        algorithm = "max-distance"

        [run]
        history_path = "var/history"
    "#;

    #[test]
    fn parses_and_fills_defaults() {
        let config: RunConfig = toml::from_str(VALID).expect("parse");
        config.validate().expect("valid");

        assert_eq!(config.pairing.algorithm, Algorithm::MaxDistance);
        assert_eq!(config.pairing.backtrack_days, 30);
        assert_eq!(config.pairing.backtrack_max_attempts, 3);
        assert!(!config.run.dry_run);
        assert_eq!(config.history_file(), PathBuf::from("var/history/rounds.jsonl"));
    }

    #[test]
    fn dry_run_uses_a_marked_ledger() {
        let mut config: RunConfig = toml::from_str(VALID).expect("parse");
        config.run.dry_run = true;
        assert_eq!(
            config.history_file(),
            PathBuf::from("var/history/rounds.dryrun.jsonl")
        );
    }

    #[test]
    fn unknown_algorithm_is_a_configuration_error() {
        let raw = VALID.replace("max-distance", "annealing");
        let err = toml::from_str::<RunConfig>(&raw).expect_err("reject unknown algorithm");
        assert!(err.to_string().contains("annealing"));
    }

    #[test]
    fn empty_token_fails_validation() {
        let raw = VALID.replace("xoxb-test", " ");
        let config: RunConfig = toml::from_str(&raw).expect("parse");
        let err = config.validate().expect_err("reject empty token");
        assert!(matches!(err, BrewError::Configuration(_)));
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let mut config: RunConfig = toml::from_str(VALID).expect("parse");
        config.slack.timeout_ms = 0;
        let err = config.validate().expect_err("reject zero timeout");
        assert!(matches!(err, BrewError::Configuration(_)));
    }

    #[test]
    fn zero_attempts_fail_validation() {
        let raw = format!("{VALID}\n");
        let mut config: RunConfig = toml::from_str(&raw).expect("parse");
        config.pairing.backtrack_max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
