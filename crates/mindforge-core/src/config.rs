//! Configuration — YAML config + env var overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the subscription/credit service
    #[serde(default = "default_credit_service_url")]
    pub credit_service_url: String,

    /// Base URL of the ledger (token burn) service
    #[serde(default = "default_ledger_service_url")]
    pub ledger_service_url: String,

    /// Base URL of the metadata registry service
    #[serde(default = "default_registry_service_url")]
    pub registry_service_url: String,

    /// API key for the gateway services (set here or via env var)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call deadline for every remote gateway call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Subscription credits consumed by one evolution transaction
    #[serde(default = "default_credits_per_evolution")]
    pub credits_per_evolution: u32,

    /// Token symbol stamped into synthesized metadata
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,

    /// Public base URL used for `external_url` in metadata documents
    #[serde(default = "default_external_url_base")]
    pub external_url_base: String,

    /// Audit collection name in the persistent store
    #[serde(default = "default_audit_collection")]
    pub audit_collection: String,
}

fn default_credit_service_url() -> String {
    "http://localhost:8701".into()
}
fn default_ledger_service_url() -> String {
    "http://localhost:8702".into()
}
fn default_registry_service_url() -> String {
    "http://localhost:8703".into()
}
fn default_call_timeout_secs() -> u64 {
    10
}
fn default_credits_per_evolution() -> u32 {
    2
}
fn default_token_symbol() -> String {
    "MIND".into()
}
fn default_external_url_base() -> String {
    "https://mindforge.app/agents".into()
}
fn default_audit_collection() -> String {
    "evolution_audit".into()
}

impl Config {
    /// Load config from a YAML file with env var overrides.
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

        let mut config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config.yaml")?;

        if let Ok(url) = std::env::var("MINDFORGE_CREDIT_SERVICE_URL") {
            config.credit_service_url = url;
        }
        if let Ok(url) = std::env::var("MINDFORGE_LEDGER_SERVICE_URL") {
            config.ledger_service_url = url;
        }
        if let Ok(url) = std::env::var("MINDFORGE_REGISTRY_SERVICE_URL") {
            config.registry_service_url = url;
        }
        if let Ok(key) = std::env::var("MINDFORGE_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(secs) = std::env::var("MINDFORGE_CALL_TIMEOUT_SECS") {
            config.call_timeout_secs = secs
                .parse()
                .context("MINDFORGE_CALL_TIMEOUT_SECS must be an integer")?;
        }

        if config.call_timeout_secs == 0 {
            anyhow::bail!("call_timeout_secs must be greater than zero");
        }

        Ok(config)
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credit_service_url: default_credit_service_url(),
            ledger_service_url: default_ledger_service_url(),
            registry_service_url: default_registry_service_url(),
            api_key: None,
            call_timeout_secs: default_call_timeout_secs(),
            credits_per_evolution: default_credits_per_evolution(),
            token_symbol: default_token_symbol(),
            external_url_base: default_external_url_base(),
            audit_collection: default_audit_collection(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "token_symbol: MIND").unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.token_symbol, "MIND");
        assert_eq!(config.call_timeout_secs, 10);
        assert_eq!(config.credits_per_evolution, 2);
    }

    #[test]
    fn test_load_config_custom_values() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "ledger_service_url: http://ledger.internal:9000\ncall_timeout_secs: 3"
        )
        .unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.ledger_service_url, "http://ledger.internal:9000");
        assert_eq!(config.call_timeout_secs, 3);
    }

    #[test]
    fn test_zero_timeout_fails() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "call_timeout_secs: 0").unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }
}
