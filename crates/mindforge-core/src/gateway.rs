//! Collaborator contracts — credit gate, ledger burn, metadata registry,
//! persistent store — plus HTTP-backed implementations.
//!
//! Every trait is object-safe so the pipeline can be wired with test
//! doubles. Gateway errors carry a `CallOutcome` classification: `Failed`
//! means the remote definitely did not act, `Unknown` means it may have —
//! the distinction decides between a clean rejection and `PartiallyApplied`
//! downstream.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::config::Config;
use crate::error::CallOutcome;
use crate::metadata::TokenMetadata;
use crate::types::Agent;

// ── Identity ──

/// Wallet address syntax check: base58 alphabet, 32–44 chars. Ownership
/// itself is an exact string match against the agent record.
pub fn is_valid_wallet_address(address: &str) -> bool {
    const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58.contains(c))
}

// ── Errors & receipts ──

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub outcome: CallOutcome,
    pub message: String,
}

impl GatewayError {
    /// The remote definitely did not perform the action.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            outcome: CallOutcome::Failed,
            message: message.into(),
        }
    }

    /// The action may or may not have landed.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            outcome: CallOutcome::Unknown,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BurnReceipt {
    pub burned_amount: u64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryReceipt {
    pub tx_ref: String,
    pub uri: String,
}

// ── Contracts ──

#[async_trait]
pub trait CreditGate: Send + Sync {
    async fn has_subscription(&self, owner: &str) -> Result<bool, GatewayError>;
    async fn has_credits(&self, owner: &str, required: u32) -> Result<bool, GatewayError>;
    async fn use_credits(&self, owner: &str, amount: u32) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Burn the upgrade fee. At-most-once from the caller's side: the
    /// pipeline never retries this call.
    async fn burn_upgrade_fee(
        &self,
        owner: &str,
        amount: u64,
        agent_id: &str,
    ) -> Result<BurnReceipt, GatewayError>;
}

#[async_trait]
pub trait MetadataRegistry: Send + Sync {
    async fn update_metadata(
        &self,
        agent_id: &str,
        doc: &TokenMetadata,
    ) -> Result<RegistryReceipt, GatewayError>;
}

/// Generic document store: agent records by id plus an append-only audit
/// collection. The real binding (DB, HTTP) lives outside this crate.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn get(&self, agent_id: &str) -> Result<Option<Agent>, GatewayError>;
    async fn put(&self, agent: &Agent) -> Result<(), GatewayError>;
    async fn delete(&self, agent_id: &str) -> Result<(), GatewayError>;
    async fn append_audit(
        &self,
        collection: &str,
        record: serde_json::Value,
    ) -> Result<(), GatewayError>;
}

// ── HTTP implementations ──

/// One client for all three remote services. Follows the services' plain
/// JSON-over-HTTP contracts; response classification maps 4xx to `Failed`
/// (the service refused before acting) and 5xx/transport timeouts to
/// `Unknown` (the action may have gone through).
pub struct HttpGateway {
    client: reqwest::Client,
    config: Config,
}

impl HttpGateway {
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.call_timeout())
            .build()
            .expect("Failed to build HTTP client");
        Self { client, config }
    }

    async fn post_json(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::unknown(format!("{url}: deadline exceeded"))
            } else if e.is_connect() {
                GatewayError::failed(format!("{url}: connection refused"))
            } else {
                GatewayError::unknown(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(GatewayError::failed(format!("{url}: HTTP {status}")));
        }
        if !status.is_success() {
            return Err(GatewayError::unknown(format!("{url}: HTTP {status}")));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| GatewayError::unknown(format!("{url}: invalid response body: {e}")))
    }
}

#[async_trait]
impl CreditGate for HttpGateway {
    async fn has_subscription(&self, owner: &str) -> Result<bool, GatewayError> {
        let url = format!("{}/subscriptions/check", self.config.credit_service_url);
        let body = self.post_json(&url, json!({ "owner": owner })).await?;
        Ok(body.get("active").and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn has_credits(&self, owner: &str, required: u32) -> Result<bool, GatewayError> {
        let url = format!("{}/credits/check", self.config.credit_service_url);
        let body = self
            .post_json(&url, json!({ "owner": owner, "required": required }))
            .await?;
        Ok(body
            .get("sufficient")
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn use_credits(&self, owner: &str, amount: u32) -> Result<(), GatewayError> {
        let url = format!("{}/credits/use", self.config.credit_service_url);
        let body = self
            .post_json(&url, json!({ "owner": owner, "amount": amount }))
            .await?;
        match body.get("success").and_then(|v| v.as_bool()) {
            Some(true) => Ok(()),
            _ => Err(GatewayError::failed(
                body.get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("credit deduction refused")
                    .to_string(),
            )),
        }
    }
}

#[async_trait]
impl LedgerGateway for HttpGateway {
    async fn burn_upgrade_fee(
        &self,
        owner: &str,
        amount: u64,
        agent_id: &str,
    ) -> Result<BurnReceipt, GatewayError> {
        let url = format!("{}/burn/upgrade", self.config.ledger_service_url);
        let body = self
            .post_json(
                &url,
                json!({ "owner": owner, "amount": amount, "agent_id": agent_id }),
            )
            .await?;

        if body.get("success").and_then(|v| v.as_bool()) != Some(true) {
            return Err(GatewayError::failed(
                body.get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("burn refused")
                    .to_string(),
            ));
        }

        let burned_amount = body
            .get("burned_amount")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| GatewayError::unknown("burn response missing burned_amount"))?;
        let signature = body
            .get("signature")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(BurnReceipt {
            burned_amount,
            signature,
        })
    }
}

#[async_trait]
impl MetadataRegistry for HttpGateway {
    async fn update_metadata(
        &self,
        agent_id: &str,
        doc: &TokenMetadata,
    ) -> Result<RegistryReceipt, GatewayError> {
        let url = format!(
            "{}/metadata/{}",
            self.config.registry_service_url, agent_id
        );
        let body = self
            .post_json(&url, serde_json::to_value(doc).expect("metadata serializes"))
            .await?;

        if body.get("success").and_then(|v| v.as_bool()) != Some(true) {
            return Err(GatewayError::failed(
                body.get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("registry refused the update")
                    .to_string(),
            ));
        }

        Ok(RegistryReceipt {
            tx_ref: body
                .get("tx_ref")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            uri: body
                .get("uri")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_address_syntax() {
        assert!(is_valid_wallet_address(
            "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"
        ));
        // too short
        assert!(!is_valid_wallet_address("9xQeWvG816bUx9EP"));
        // base58 excludes 0, O, I, l
        assert!(!is_valid_wallet_address(
            "0xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"
        ));
        assert!(!is_valid_wallet_address(""));
    }

    #[test]
    fn gateway_error_classification() {
        assert_eq!(GatewayError::failed("no").outcome, CallOutcome::Failed);
        assert_eq!(GatewayError::unknown("??").outcome, CallOutcome::Unknown);
    }
}
