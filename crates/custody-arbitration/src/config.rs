//! Engine configuration.
//!
//! Roles and time-gates are fixed for the life of an engine, so they are
//! read once from a YAML or JSON document and validated before the ledger
//! and authority are built.

use std::path::Path;

use serde::{Deserialize, Serialize};

use custody_core::Principal;

use crate::authority::{GuarantorSet, TimeGates};
use crate::error::ConfigError;

/// Δ_exec default: 10 hours.
pub const DEFAULT_EXECUTION_DELAY_SECS: i64 = 10 * 60 * 60;

/// Δ_dispute default: 10 days.
pub const DEFAULT_DISPUTE_DELAY_SECS: i64 = 10 * 24 * 60 * 60;

/// A complete, commented configuration using the defaults.
pub const EXAMPLE_CONFIG_YAML: &str = "\
# Counterparty paid on release.
beneficiary: seller
# Identity allowed to confirm delivery.
attestor: courier
# Exactly two distinct identities: the beneficiary side and a neutral executor.
guarantors: [seller, executor]
# Seconds after a case opens before release may execute (10 hours).
execution_delay_secs: 36000
# Seconds after a dispute before refund may execute (10 days).
dispute_delay_secs: 864000
";

/// Roles and time-gates for one ledger and its authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Counterparty paid on release.
    pub beneficiary: Principal,
    /// Identity allowed to confirm delivery.
    pub attestor: Principal,
    /// The two guarantors.
    pub guarantors: [Principal; 2],
    /// Δ_exec in seconds.
    #[serde(default = "default_execution_delay")]
    pub execution_delay_secs: i64,
    /// Δ_dispute in seconds.
    #[serde(default = "default_dispute_delay")]
    pub dispute_delay_secs: i64,
}

fn default_execution_delay() -> i64 {
    DEFAULT_EXECUTION_DELAY_SECS
}

fn default_dispute_delay() -> i64 {
    DEFAULT_DISPUTE_DELAY_SECS
}

impl EngineConfig {
    /// A configuration with the default time-gates.
    pub fn new(beneficiary: Principal, attestor: Principal, guarantors: [Principal; 2]) -> Self {
        Self {
            beneficiary,
            attestor,
            guarantors,
            execution_delay_secs: DEFAULT_EXECUTION_DELAY_SECS,
            dispute_delay_secs: DEFAULT_DISPUTE_DELAY_SECS,
        }
    }

    /// Parse YAML and validate.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] on malformed input, or any validation error.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON and validate.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] on malformed input, or any validation error.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. `.json` files are read as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as for
    /// [`Self::from_yaml_str`] / [`Self::from_json_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Check the guarantor pair and the delays.
    ///
    /// Principals are already well-formed once deserialized.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateGuarantor`], [`ConfigError::NonPositiveDelay`],
    /// [`ConfigError::DelayOutOfRange`], or [`ConfigError::DisputeDelayTooShort`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.guarantor_set()?;
        self.time_gates()?;
        Ok(())
    }

    /// The validated guarantor pair.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateGuarantor`] if both entries are equal.
    pub fn guarantor_set(&self) -> Result<GuarantorSet, ConfigError> {
        let [first, second] = self.guarantors.clone();
        GuarantorSet::new(first, second)
    }

    /// The validated time-gates.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NonPositiveDelay`], [`ConfigError::DelayOutOfRange`], or
    /// [`ConfigError::DisputeDelayTooShort`].
    pub fn time_gates(&self) -> Result<TimeGates, ConfigError> {
        TimeGates::new(self.execution_delay_secs, self.dispute_delay_secs)
    }

    /// Render as YAML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn example_config_parses_with_defaults() {
        let config = EngineConfig::from_yaml_str(EXAMPLE_CONFIG_YAML).unwrap();
        assert_eq!(config.beneficiary.as_str(), "seller");
        assert_eq!(config.attestor.as_str(), "courier");
        assert_eq!(config.execution_delay_secs, DEFAULT_EXECUTION_DELAY_SECS);
        assert_eq!(config.dispute_delay_secs, DEFAULT_DISPUTE_DELAY_SECS);
    }

    #[test]
    fn delays_default_when_omitted() {
        let config = EngineConfig::from_yaml_str(
            "beneficiary: s\nattestor: a\nguarantors: [s, x]\n",
        )
        .unwrap();
        assert_eq!(config.execution_delay_secs, 36_000);
        assert_eq!(config.dispute_delay_secs, 864_000);
    }

    #[test]
    fn duplicate_guarantors_rejected() {
        let err = EngineConfig::from_yaml_str(
            "beneficiary: s\nattestor: a\nguarantors: [x, x]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateGuarantor(_)));
    }

    #[test]
    fn dispute_delay_must_exceed_execution_delay() {
        let err = EngineConfig::from_yaml_str(
            "beneficiary: s\nattestor: a\nguarantors: [s, x]\nexecution_delay_secs: 100\ndispute_delay_secs: 100\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DisputeDelayTooShort { .. }));
    }

    #[test]
    fn negative_delay_rejected() {
        let err = EngineConfig::from_yaml_str(
            "beneficiary: s\nattestor: a\nguarantors: [s, x]\nexecution_delay_secs: -1\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveDelay { .. }));
    }

    #[test]
    fn unrepresentable_delay_rejected() {
        let err = EngineConfig::from_yaml_str(
            "beneficiary: s\nattestor: a\nguarantors: [s, x]\nexecution_delay_secs: 100\ndispute_delay_secs: 9223372036854775807\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DelayOutOfRange { name: "dispute delay", .. }
        ));
    }

    #[test]
    fn malformed_principal_rejected() {
        let err = EngineConfig::from_yaml_str(
            "beneficiary: \"\"\nattestor: a\nguarantors: [s, x]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(EngineConfig::from_yaml_str(
            "beneficiary: s\nattestor: a\nguarantors: [s, x]\nfee: 3\n",
        )
        .is_err());
    }

    #[test]
    fn json_config() {
        let config = EngineConfig::from_json_str(
            r#"{"beneficiary":"s","attestor":"a","guarantors":["s","x"],"execution_delay_secs":10,"dispute_delay_secs":20}"#,
        )
        .unwrap();
        assert_eq!(config.time_gates().unwrap().dispute_delay().num_seconds(), 20);
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("engine.yaml");
        std::fs::write(&yaml, EXAMPLE_CONFIG_YAML).unwrap();
        assert!(EngineConfig::load(&yaml).is_ok());

        let json = dir.path().join("engine.json");
        let mut file = std::fs::File::create(&json).unwrap();
        write!(
            file,
            r#"{{"beneficiary":"s","attestor":"a","guarantors":["s","x"]}}"#
        )
        .unwrap();
        assert!(EngineConfig::load(&json).is_ok());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn yaml_round_trips_through_to_yaml() {
        let config = EngineConfig::from_yaml_str(EXAMPLE_CONFIG_YAML).unwrap();
        let again = EngineConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(config, again);
    }
}
