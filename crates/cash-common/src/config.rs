//! Process-wide configuration, spec §6 "Configuration (enumerated)". Loaded
//! by the `server` binary from a TOML file; every component crate borrows
//! the slice of `Settings` it cares about rather than defining its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::TierPreference;
use crate::policy::MatcherPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpSystemConfig {
    pub erp_system: String,
    pub base_url: String,
    /// Name of the env var / secret-store reference holding the credential;
    /// secret storage itself is out of scope (spec §1).
    pub credential_ref: String,
    #[serde(default = "default_erp_concurrency")]
    pub max_concurrency: usize,
}

fn default_erp_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_concurrent_transactions: usize,
    pub matcher_policy: MatcherPolicy,
    /// Master switch; if false, EF.Post calls are skipped and the
    /// workflow's status is forced to `RequiresReview` (spec §6).
    pub enable_autonomous_erp_updates: bool,
    pub extractor_tier_preference: TierPreference,
    pub extractor_confidence_threshold: f64,
    pub erp_systems: Vec<ErpSystemConfig>,
    pub notification_rate_per_recipient: u32,
    #[serde(with = "humantime_seconds")]
    pub workflow_timeout: Duration,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_concurrent_transactions: 10,
            matcher_policy: MatcherPolicy::default(),
            enable_autonomous_erp_updates: true,
            extractor_tier_preference: TierPreference::Auto,
            extractor_confidence_threshold: 0.85,
            erp_systems: Vec::new(),
            notification_rate_per_recipient: 10,
            workflow_timeout: Duration::from_secs(600),
            bind_addr: "127.0.0.1:8080".to_owned(),
        }
    }
}

impl Settings {
    pub fn load_from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn erp_config(&self, erp_system: &str) -> Option<&ErpSystemConfig> {
        self.erp_systems.iter().find(|c| c.erp_system == erp_system)
    }
}

/// `Duration` as a plain integer number of seconds in TOML, e.g.
/// `workflow_timeout = 600`.
mod humantime_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_illustrative_values() {
        let s = Settings::default();
        assert_eq!(s.max_concurrent_transactions, 10);
        assert_eq!(s.notification_rate_per_recipient, 10);
        assert!(s.enable_autonomous_erp_updates);
    }

    #[test]
    fn loads_minimal_toml_with_defaults() {
        let s = Settings::load_from_toml("bind_addr = \"0.0.0.0:9000\"\n").unwrap();
        assert_eq!(s.bind_addr, "0.0.0.0:9000");
        assert_eq!(s.max_concurrent_transactions, 10);
    }

    #[test]
    fn finds_erp_config_by_system_name() {
        let mut s = Settings::default();
        s.erp_systems.push(ErpSystemConfig {
            erp_system: "netsuite".to_owned(),
            base_url: "https://example.test".to_owned(),
            credential_ref: "NETSUITE_TOKEN".to_owned(),
            max_concurrency: 8,
        });
        assert!(s.erp_config("netsuite").is_some());
        assert!(s.erp_config("sap").is_none());
    }
}
