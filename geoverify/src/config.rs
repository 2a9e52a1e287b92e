//! Verifier configuration.
//!
//! Every tunable lives in [`VerifierConfig`] and can be overridden from an
//! INI file:
//!
//! ```ini
//! [cadence]
//! initial_interval_ms = 1000
//! max_polls = 60
//!
//! [classifier]
//! fair_max_m = 20.0
//!
//! [retry]
//! max_attempts = 5
//! ```
//!
//! Missing keys keep their defaults. Unknown keys are logged and ignored.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::engine::SessionConfig;
use crate::quality::ClassifierConfig;
use crate::retry::RetryPolicy;
use crate::session::{CadenceConfig, MergeConfig, DEFAULT_STREAM_CAPACITY};
use crate::verification::DecisionConfig;

/// Directory name under the platform config dir.
const CONFIG_DIR_NAME: &str = "geoverify";

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.ini";

/// Recognised keys per section.
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (
        "cadence",
        &[
            "initial_interval_ms",
            "initial_polls",
            "middle_interval_ms",
            "middle_polls_end",
            "steady_interval_ms",
            "max_polls",
        ],
    ),
    (
        "classifier",
        &[
            "excellent_max_m",
            "good_max_m",
            "fair_max_m",
            "poor_margin",
            "poor_confirmations",
            "max_plausible_accuracy_m",
        ],
    ),
    ("fallback", &["primary_stale_cycles", "min_interval_ms"]),
    ("verification", &["debounce"]),
    (
        "retry",
        &["initial_delay_ms", "max_delay_ms", "max_attempts", "multiplier"],
    ),
    ("session", &["stream_capacity"]),
];

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("[{section}] {key}: invalid value '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render configuration: {0}")]
    Write(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default config file location: `<config_dir>/geoverify/config.ini`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// All tunables for one verification attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifierConfig {
    pub cadence: CadenceConfig,
    pub classifier: ClassifierConfig,
    pub merge: MergeConfig,
    pub decision: DecisionConfig,
    pub retry: RetryPolicy,
    pub engine: SessionConfig,
    /// Broadcast buffer for the state and reading streams.
    pub stream_capacity: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            cadence: CadenceConfig::default(),
            classifier: ClassifierConfig::default(),
            merge: MergeConfig::default(),
            decision: DecisionConfig::default(),
            retry: RetryPolicy::default(),
            engine: SessionConfig::default(),
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

impl VerifierConfig {
    /// Load and validate an INI file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Self::from_ini(&ini)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse and validate INI text.
    pub fn from_ini_str(text: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        warn_unknown_keys(ini);

        let mut config = Self::default();

        if let Some(props) = ini.section(Some("cadence")) {
            let c = &mut config.cadence;
            read_millis(props, "cadence", "initial_interval_ms", &mut c.initial_interval)?;
            read(props, "cadence", "initial_polls", &mut c.initial_polls)?;
            read_millis(props, "cadence", "middle_interval_ms", &mut c.middle_interval)?;
            read(props, "cadence", "middle_polls_end", &mut c.middle_polls)?;
            read_millis(props, "cadence", "steady_interval_ms", &mut c.steady_interval)?;
            read(props, "cadence", "max_polls", &mut c.max_polls)?;
        }

        if let Some(props) = ini.section(Some("classifier")) {
            let c = &mut config.classifier;
            read(props, "classifier", "excellent_max_m", &mut c.excellent_max_m)?;
            read(props, "classifier", "good_max_m", &mut c.good_max_m)?;
            read(props, "classifier", "fair_max_m", &mut c.fair_max_m)?;
            read(props, "classifier", "poor_margin", &mut c.poor_margin)?;
            read(props, "classifier", "poor_confirmations", &mut c.poor_confirmations)?;
            read(
                props,
                "classifier",
                "max_plausible_accuracy_m",
                &mut c.max_plausible_accuracy_m,
            )?;
        }

        if let Some(props) = ini.section(Some("fallback")) {
            let m = &mut config.merge;
            read(props, "fallback", "primary_stale_cycles", &mut m.primary_stale_cycles)?;
            read_millis(props, "fallback", "min_interval_ms", &mut m.fallback_min_interval)?;
        }

        if let Some(props) = ini.section(Some("verification")) {
            read(props, "verification", "debounce", &mut config.decision.debounce)?;
        }

        if let Some(props) = ini.section(Some("retry")) {
            let mut retry = RetrySettings::from_policy(&config.retry);
            read_millis(props, "retry", "initial_delay_ms", &mut retry.initial_delay)?;
            read_millis(props, "retry", "max_delay_ms", &mut retry.max_delay)?;
            read(props, "retry", "max_attempts", &mut retry.max_attempts)?;
            read(props, "retry", "multiplier", &mut retry.multiplier)?;
            config.retry = retry.into_policy();
        }

        if let Some(props) = ini.section(Some("session")) {
            read(props, "session", "stream_capacity", &mut config.stream_capacity)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let c = &self.classifier;
        let increasing = c.excellent_max_m > 0.0
            && c.excellent_max_m < c.good_max_m
            && c.good_max_m < c.fair_max_m;
        if !increasing {
            return Err(ConfigError::Invalid(format!(
                "tier thresholds must increase: excellent {} < good {} < fair {}",
                c.excellent_max_m, c.good_max_m, c.fair_max_m
            )));
        }
        if c.poor_margin.is_nan() || c.poor_margin < 0.0 {
            return Err(ConfigError::Invalid("poor_margin must be >= 0".into()));
        }
        if c.poor_confirmations == 0 {
            return Err(ConfigError::Invalid("poor_confirmations must be >= 1".into()));
        }
        if c.max_plausible_accuracy_m.is_nan() || c.max_plausible_accuracy_m <= c.fair_max_m {
            return Err(ConfigError::Invalid(
                "max_plausible_accuracy_m must exceed fair_max_m".into(),
            ));
        }
        if self.decision.debounce == 0 {
            return Err(ConfigError::Invalid("debounce must be >= 1".into()));
        }
        if self.cadence.max_polls == 0 {
            return Err(ConfigError::Invalid("max_polls must be >= 1".into()));
        }
        if self.cadence.initial_polls > self.cadence.middle_polls {
            return Err(ConfigError::Invalid(
                "initial_polls must not exceed middle_polls_end".into(),
            ));
        }
        if self.retry.max_attempts() == 0 {
            return Err(ConfigError::Invalid("retry max_attempts must be >= 1".into()));
        }
        if self.stream_capacity == 0 {
            return Err(ConfigError::Invalid("stream_capacity must be >= 1".into()));
        }
        Ok(())
    }

    /// Effective settings as `(section, key, value)` rows.
    pub fn entries(&self) -> Vec<(&'static str, &'static str, String)> {
        let retry = RetrySettings::from_policy(&self.retry);
        let c = &self.cadence;
        let q = &self.classifier;
        vec![
            ("cadence", "initial_interval_ms", millis(c.initial_interval)),
            ("cadence", "initial_polls", c.initial_polls.to_string()),
            ("cadence", "middle_interval_ms", millis(c.middle_interval)),
            ("cadence", "middle_polls_end", c.middle_polls.to_string()),
            ("cadence", "steady_interval_ms", millis(c.steady_interval)),
            ("cadence", "max_polls", c.max_polls.to_string()),
            ("classifier", "excellent_max_m", q.excellent_max_m.to_string()),
            ("classifier", "good_max_m", q.good_max_m.to_string()),
            ("classifier", "fair_max_m", q.fair_max_m.to_string()),
            ("classifier", "poor_margin", q.poor_margin.to_string()),
            ("classifier", "poor_confirmations", q.poor_confirmations.to_string()),
            (
                "classifier",
                "max_plausible_accuracy_m",
                q.max_plausible_accuracy_m.to_string(),
            ),
            (
                "fallback",
                "primary_stale_cycles",
                self.merge.primary_stale_cycles.to_string(),
            ),
            ("fallback", "min_interval_ms", millis(self.merge.fallback_min_interval)),
            ("verification", "debounce", self.decision.debounce.to_string()),
            ("retry", "initial_delay_ms", millis(retry.initial_delay)),
            ("retry", "max_delay_ms", millis(retry.max_delay)),
            ("retry", "max_attempts", retry.max_attempts.to_string()),
            ("retry", "multiplier", retry.multiplier.to_string()),
            ("session", "stream_capacity", self.stream_capacity.to_string()),
        ]
    }

    /// Render the effective settings as an INI document.
    pub fn to_ini_string(&self) -> ConfigResult<String> {
        let mut ini = Ini::new();
        for (section, key, value) in self.entries() {
            ini.with_section(Some(section)).set(key, value);
        }
        let mut buf = Vec::new();
        ini.write_to(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Flattened retry settings for reading and writing the `[retry]` section.
struct RetrySettings {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    multiplier: f64,
}

impl RetrySettings {
    fn from_policy(policy: &RetryPolicy) -> Self {
        match policy {
            RetryPolicy::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => Self {
                initial_delay: *initial_delay,
                max_delay: *max_delay,
                max_attempts: *max_attempts,
                multiplier: *multiplier,
            },
            RetryPolicy::None => Self {
                initial_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                max_attempts: 1,
                multiplier: 1.0,
            },
        }
    }

    fn into_policy(self) -> RetryPolicy {
        if self.max_attempts == 1 {
            return RetryPolicy::None;
        }
        RetryPolicy::ExponentialBackoff {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
        }
    }
}

fn read<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    target: &mut T,
) -> ConfigResult<()> {
    let Some(raw) = props.get(key) else {
        return Ok(());
    };
    *target = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
        })?;
    Ok(())
}

fn read_millis(
    props: &Properties,
    section: &str,
    key: &str,
    target: &mut Duration,
) -> ConfigResult<()> {
    let mut ms = target.as_millis() as u64;
    read(props, section, key, &mut ms)?;
    *target = Duration::from_millis(ms);
    Ok(())
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

fn warn_unknown_keys(ini: &Ini) {
    for (section, props) in ini.iter() {
        let Some(section) = section else {
            for (key, _) in props.iter() {
                tracing::warn!(key, "Ignoring configuration key outside any section");
            }
            continue;
        };
        let known = KNOWN_KEYS
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, keys)| *keys);
        match known {
            None => tracing::warn!(section, "Ignoring unknown configuration section"),
            Some(keys) => {
                for (key, _) in props.iter() {
                    if !keys.contains(&key) {
                        tracing::warn!(section, key, "Ignoring unknown configuration key");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = VerifierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cadence.max_polls, 60);
        assert_eq!(config.retry.max_attempts(), 5);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = VerifierConfig::from_ini_str(
            "[cadence]\nmax_polls = 30\n\n[retry]\ninitial_delay_ms = 100\n",
        )
        .unwrap();
        assert_eq!(config.cadence.max_polls, 30);
        assert_eq!(config.cadence.initial_interval, Duration::from_millis(1000));
        assert_eq!(
            config.retry.delay_for_attempt(1),
            Some(Duration::from_millis(100))
        );
        assert_eq!(config.retry.max_attempts(), 5);
    }

    #[test]
    fn test_malformed_value() {
        let err = VerifierConfig::from_ini_str("[verification]\ndebounce = two\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "verification");
                assert_eq!(key, "debounce");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config =
            VerifierConfig::from_ini_str("[cadence]\nwarp_factor = 9\n\n[colors]\nfg = red\n")
                .unwrap();
        assert_eq!(config, VerifierConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let err =
            VerifierConfig::from_ini_str("[classifier]\ngood_max_m = 30.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = VerifierConfig::from_ini_str("[verification]\ndebounce = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = VerifierConfig::from_ini_str("[cadence]\nmax_polls = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rendered_ini_reloads() {
        let mut config = VerifierConfig::default();
        config.decision.debounce = 3;
        config.merge.primary_stale_cycles = 7;

        let text = config.to_ini_string().unwrap();
        assert!(text.contains("[fallback]"));
        assert_eq!(VerifierConfig::from_ini_str(&text).unwrap(), config);
    }

    #[test]
    fn test_default_path_shape() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("geoverify/config.ini"));
        }
    }
}
