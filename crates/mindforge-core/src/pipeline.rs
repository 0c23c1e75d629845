//! The evolution transaction pipeline — the only component with side
//! effects.
//!
//! Each request walks `Requested → Validated → Charged → Computed →
//! MetadataStaged → Committed`. Terminal failure states: `Rejected` (no
//! side effect occurred) and `PartiallyApplied` (an irreversible effect
//! landed but a later step did not — durably recorded for manual
//! reconciliation, never auto-retried).
//!
//! A per-agent mutex spans the whole walk, so two transactions can never
//! race on the same starting level; transactions for different agents run
//! fully in parallel. Every remote call carries a bounded deadline and its
//! outcome is classified confirmed/failed/unknown — `unknown` after the
//! charge is what forces `PartiallyApplied` instead of an optimistic retry.
//! Cancellation (dropping the returned future) is only safe before the
//! charge step.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{
    CallOutcome, EvolutionError, ExternalServiceError, PipelineStep, RejectionError,
};
use crate::gateway::{
    self, CreditGate, GatewayError, LedgerGateway, MetadataRegistry, RegistryReceipt,
};
use crate::llm;
use crate::metadata::{self, MetadataContext, TokenMetadata};
use crate::rarity::{self, RarityResult};
use crate::repository::{AgentRepository, MirrorStatus};
use crate::tiers::{self, EvolutionTier};
use crate::types::{Agent, HistoryEntry};
use crate::visual::{self, VisualEffect};

// ── Transaction states ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Requested,
    Validated,
    Charged,
    Computed,
    MetadataStaged,
    Committed,
    Rejected,
    PartiallyApplied,
}

// ── Request / outcome ──

#[derive(Debug, Clone)]
pub struct EvolutionRequest {
    /// Wallet address of the caller; must exactly match the agent's owner.
    pub caller: String,
    pub agent_id: String,
    /// Tokens the caller is putting up; must cover the next tier's cost.
    pub offered_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    pub transaction_id: String,
    /// `Committed`, or `PartiallyApplied` when the charge landed but the
    /// metadata step did not (state still advanced; only metadata retries).
    pub state: TransactionState,
    pub agent_id: String,
    pub previous_level: u32,
    pub new_level: u32,
    pub tokens_spent: u64,
    pub burned_amount: u64,
    pub credits_spent: u32,
    pub stage: &'static str,
    pub effects: Vec<VisualEffect>,
    pub rarity: RarityResult,
    pub metadata_uri: Option<String>,
    pub registry_tx: Option<String>,
    pub store_mirrored: bool,
}

/// Durable record of a transaction that charged but did not fully apply.
/// Written to the store's audit collection; reconciliation is manual.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationRecord {
    pub transaction_id: String,
    pub agent_id: String,
    pub step: PipelineStep,
    /// What the transaction attempted to charge.
    pub amount_charged: u64,
    /// What the ledger confirmed burning (0 when the outcome was unknown).
    pub burned_amount: u64,
    pub staged_document: Option<TokenMetadata>,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EvolutionFailure {
    /// No side effect occurred; safe to surface directly.
    #[error(transparent)]
    Rejected(#[from] EvolutionError),

    /// The charge may have landed but nothing could be committed. Requires
    /// reconciliation, not retry.
    #[error("partially applied at step {}: {}", .record.step, .record.message)]
    PartiallyApplied { record: Box<ReconciliationRecord> },
}

// ── Service ──

/// Dependency-injected orchestrator. No global state: construct one per
/// process and share it behind an `Arc`.
pub struct EvolutionService {
    credit_gate: Arc<dyn CreditGate>,
    ledger: Arc<dyn LedgerGateway>,
    registry: Arc<dyn MetadataRegistry>,
    repository: Arc<AgentRepository>,
    config: Config,
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Metadata documents retained after a failed staging step, keyed by
    /// agent id, for step-scoped retry.
    staged: Mutex<HashMap<String, StagedMetadata>>,
}

#[derive(Debug, Clone)]
struct StagedMetadata {
    transaction_id: String,
    doc: TokenMetadata,
}

impl EvolutionService {
    pub fn new(
        credit_gate: Arc<dyn CreditGate>,
        ledger: Arc<dyn LedgerGateway>,
        registry: Arc<dyn MetadataRegistry>,
        repository: Arc<AgentRepository>,
        config: Config,
    ) -> Self {
        Self {
            credit_gate,
            ledger,
            registry,
            repository,
            config,
            locks: std::sync::Mutex::new(HashMap::new()),
            staged: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<AgentRepository> {
        &self.repository
    }

    /// Full evolution transaction: validate → charge → compute → stage
    /// metadata → commit.
    pub async fn evolve(
        &self,
        request: EvolutionRequest,
    ) -> Result<EvolutionOutcome, EvolutionFailure> {
        self.run(request, true).await
    }

    /// Configuration-only variant: validate → charge → compute → commit.
    /// No metadata synthesis, no registry call, no avatar change. Shares
    /// the validate/charge/history contract with the full transaction.
    pub async fn evolve_config_only(
        &self,
        request: EvolutionRequest,
    ) -> Result<EvolutionOutcome, EvolutionFailure> {
        self.run(request, false).await
    }

    async fn run(
        &self,
        request: EvolutionRequest,
        with_metadata: bool,
    ) -> Result<EvolutionOutcome, EvolutionFailure> {
        let transaction_id = Uuid::new_v4().to_string();
        let lock = self.lock_for(&request.agent_id);
        let _guard = lock.lock().await;

        info!(
            tx = %transaction_id,
            agent_id = %request.agent_id,
            offered = request.offered_tokens,
            "evolution requested"
        );

        // ── Validate ── (side-effect free; any failure is a clean rejection)
        let (agent, tier) = self.validate(&request).await?;
        info!(tx = %transaction_id, level = agent.level, next = tier.level, "validated");

        // ── Charge ── (exactly one burn + one credit deduction, at-most-once)
        let now = chrono::Utc::now().to_rfc3339();
        let mut partial: Option<(PipelineStep, String)> = None;

        let burn = match self
            .with_deadline(
                "ledger",
                PipelineStep::Charge,
                self.ledger
                    .burn_upgrade_fee(&request.caller, tier.token_cost, &request.agent_id),
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(e) if e.outcome == CallOutcome::Failed => {
                // Confirmed no-op: behaves like a rejection.
                return Err(EvolutionError::from(e).into());
            }
            Err(e) => {
                // Unknown: the burn may have landed. Do not retry, do not
                // commit — hand it to reconciliation.
                let record = self
                    .write_reconciliation(ReconciliationRecord {
                        transaction_id,
                        agent_id: request.agent_id.clone(),
                        step: PipelineStep::Charge,
                        amount_charged: tier.token_cost,
                        burned_amount: 0,
                        staged_document: None,
                        message: e.message.clone(),
                        timestamp: now,
                    })
                    .await;
                return Err(EvolutionFailure::PartiallyApplied {
                    record: Box::new(record),
                });
            }
        };

        if let Err(e) = self
            .with_deadline(
                "credits",
                PipelineStep::Charge,
                self.credit_gate
                    .use_credits(&request.caller, self.config.credits_per_evolution),
            )
            .await
        {
            // The burn is irreversible, so the upgrade still goes through;
            // the missing credit deduction is recorded for reconciliation.
            warn!(tx = %transaction_id, error = %e, "credit deduction failed after burn");
            partial = Some((PipelineStep::Charge, format!("credit deduction: {}", e)));
        }

        // ── Compute ── (pure: stage, effects, rarity, deterministic configs)
        let mut updated = agent.clone();
        updated.level = tier.level;
        if let Some(threshold) = tiers::threshold_for_level(tier.level) {
            updated.experience = updated.experience.max(threshold);
        }
        updated.experience_to_next = tiers::xp_to_next(updated.level, updated.experience);
        let granted: Vec<String> = tier.unlocks.iter().map(|s| s.to_string()).collect();
        updated.grant_capabilities(&granted);
        updated.model_config = llm::model_config_for(tier.model_upgrade);
        updated.retrieval_config = llm::retrieval_config_for(
            &updated.id,
            updated.archetype,
            &updated.domain,
            updated.level,
            &now,
        );
        updated.stats.total_upgrades += 1;
        updated.stats.total_tokens_spent += tier.token_cost;
        updated.stats.domain_expertise = (updated.stats.domain_expertise + 10.0).min(100.0);
        updated.stats.last_active = now.clone();
        let reason = evolution_reason(&updated, tier);
        updated.history.push(HistoryEntry {
            timestamp: now.clone(),
            previous_level: agent.level,
            new_level: tier.level,
            tokens_spent: tier.token_cost,
            model_upgrade: tier.model_upgrade.to_string(),
            granted_capabilities: granted.clone(),
            reason,
        });

        let stage = visual::stage_for_level(updated.level);
        let effects = visual::visual_effects(&updated, stage);
        let rarity = rarity::calculate_rarity(&updated, stage);
        if with_metadata {
            updated.avatar = Some(visual::avatar_reference(&updated.id, updated.level, stage));
        }

        // ── Stage metadata ──
        let mut metadata_uri = None;
        let mut registry_tx = None;
        if with_metadata {
            let doc = metadata::synthesize(
                &updated,
                stage,
                &effects,
                &rarity,
                MetadataContext {
                    symbol: &self.config.token_symbol,
                    external_url_base: &self.config.external_url_base,
                    last_evolved: &now,
                },
            );

            match metadata::validate(&doc) {
                Err(e) => {
                    warn!(tx = %transaction_id, error = %e, "metadata document invalid; registry submission blocked");
                    self.retain_staged(&request.agent_id, &transaction_id, doc)
                        .await;
                    partial.get_or_insert((
                        PipelineStep::StageMetadata,
                        format!("metadata validation: {}", e),
                    ));
                }
                Ok(()) => {
                    match self
                        .with_deadline(
                            "registry",
                            PipelineStep::StageMetadata,
                            self.registry.update_metadata(&request.agent_id, &doc),
                        )
                        .await
                    {
                        Ok(receipt) => {
                            metadata_uri = Some(receipt.uri);
                            registry_tx = Some(receipt.tx_ref);
                        }
                        Err(e) => {
                            // The charge stands; the staged document is kept
                            // for a later, step-scoped retry.
                            warn!(tx = %transaction_id, error = %e, "registry update failed after burn");
                            self.retain_staged(&request.agent_id, &transaction_id, doc)
                                .await;
                            partial
                                .get_or_insert((PipelineStep::StageMetadata, e.message.clone()));
                        }
                    }
                }
            }
        }

        // ── Commit ── (cache is the commit; store write is best-effort)
        let mirror = self.repository.commit(updated).await;
        let store_mirrored = matches!(mirror, MirrorStatus::Mirrored);

        let state = match &partial {
            None => TransactionState::Committed,
            Some((step, message)) => {
                let staged_doc = self
                    .staged
                    .lock()
                    .await
                    .get(&request.agent_id)
                    .map(|s| s.doc.clone());
                self.write_reconciliation(ReconciliationRecord {
                    transaction_id: transaction_id.clone(),
                    agent_id: request.agent_id.clone(),
                    step: *step,
                    amount_charged: tier.token_cost,
                    burned_amount: burn.burned_amount,
                    staged_document: staged_doc,
                    message: message.clone(),
                    timestamp: now.clone(),
                })
                .await;
                TransactionState::PartiallyApplied
            }
        };

        info!(
            tx = %transaction_id,
            state = ?state,
            new_level = tier.level,
            burned = burn.burned_amount,
            "evolution finished"
        );

        Ok(EvolutionOutcome {
            transaction_id,
            state,
            agent_id: request.agent_id,
            previous_level: agent.level,
            new_level: tier.level,
            tokens_spent: tier.token_cost,
            burned_amount: burn.burned_amount,
            credits_spent: self.config.credits_per_evolution,
            stage: stage.name,
            effects,
            rarity,
            metadata_uri,
            registry_tx,
            store_mirrored,
        })
    }

    /// Step-scoped retry for a transaction that charged but could not stage
    /// its metadata. Only the registry submission re-runs; nothing is
    /// recharged or recomputed.
    pub async fn retry_metadata(&self, agent_id: &str) -> Result<RegistryReceipt, EvolutionError> {
        let staged = self
            .staged
            .lock()
            .await
            .get(agent_id)
            .cloned()
            .ok_or_else(|| {
                EvolutionError::rejected(
                    PipelineStep::StageMetadata,
                    RejectionError::NoStagedMetadata,
                )
            })?;

        metadata::validate(&staged.doc).map_err(|reason| EvolutionError::Metadata {
            step: PipelineStep::StageMetadata,
            reason,
        })?;

        let receipt = self
            .with_deadline(
                "registry",
                PipelineStep::StageMetadata,
                self.registry.update_metadata(agent_id, &staged.doc),
            )
            .await
            .map_err(EvolutionError::from)?;

        self.staged.lock().await.remove(agent_id);
        info!(tx = %staged.transaction_id, agent_id, uri = %receipt.uri, "staged metadata retried successfully");
        Ok(receipt)
    }

    // ── Internals ──

    async fn validate(
        &self,
        request: &EvolutionRequest,
    ) -> Result<(Agent, &'static EvolutionTier), EvolutionError> {
        let step = PipelineStep::Validate;
        let reject = |reason| EvolutionError::rejected(step, reason);

        if !gateway::is_valid_wallet_address(&request.caller) {
            return Err(reject(RejectionError::InvalidWalletAddress));
        }

        let agent = self
            .repository
            .load(&request.agent_id)
            .await
            .map_err(|e| {
                EvolutionError::from(ExternalServiceError {
                    service: "store",
                    step,
                    outcome: e.outcome,
                    message: e.message,
                })
            })?
            .ok_or_else(|| reject(RejectionError::AgentNotFound(request.agent_id.clone())))?;

        if !agent.is_owned_by(&request.caller) {
            return Err(reject(RejectionError::NotOwner));
        }

        let subscribed = self
            .with_deadline(
                "credits",
                step,
                self.credit_gate.has_subscription(&request.caller),
            )
            .await
            .map_err(EvolutionError::from)?;
        if !subscribed {
            return Err(reject(RejectionError::NoSubscription));
        }

        let required = self.config.credits_per_evolution;
        let has_credits = self
            .with_deadline(
                "credits",
                step,
                self.credit_gate.has_credits(&request.caller, required),
            )
            .await
            .map_err(EvolutionError::from)?;
        if !has_credits {
            return Err(reject(RejectionError::InsufficientCredits { required }));
        }

        let tier = tiers::next_tier(agent.archetype, agent.level)
            .ok_or_else(|| reject(RejectionError::TerminalLevel { level: agent.level }))?;

        if request.offered_tokens < tier.token_cost {
            return Err(reject(RejectionError::InsufficientOffer {
                required: tier.token_cost,
                offered: request.offered_tokens,
            }));
        }

        Ok((agent, tier))
    }

    fn lock_for(&self, agent_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn retain_staged(&self, agent_id: &str, transaction_id: &str, doc: TokenMetadata) {
        self.staged.lock().await.insert(
            agent_id.to_string(),
            StagedMetadata {
                transaction_id: transaction_id.to_string(),
                doc,
            },
        );
    }

    /// Append the record to the store's audit collection and log it. The
    /// log line is the fallback when even the audit write fails.
    async fn write_reconciliation(&self, record: ReconciliationRecord) -> ReconciliationRecord {
        error!(
            tx = %record.transaction_id,
            agent_id = %record.agent_id,
            step = %record.step,
            amount_charged = record.amount_charged,
            burned = record.burned_amount,
            "transaction partially applied: {}",
            record.message
        );
        let value = serde_json::to_value(&record).expect("reconciliation record serializes");
        if let Err(e) = self
            .repository
            .store()
            .append_audit(&self.config.audit_collection, value)
            .await
        {
            error!(tx = %record.transaction_id, error = %e, "audit append failed; record exists only in logs");
        }
        record
    }

    /// Bound a gateway call and classify its outcome. A deadline hit is
    /// `Unknown` — the remote may still have acted.
    async fn with_deadline<T, F>(
        &self,
        service: &'static str,
        step: PipelineStep,
        fut: F,
    ) -> Result<T, ExternalServiceError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.config.call_timeout(), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ExternalServiceError {
                service,
                step,
                outcome: e.outcome,
                message: e.message,
            }),
            Err(_) => Err(ExternalServiceError {
                service,
                step,
                outcome: CallOutcome::Unknown,
                message: "deadline exceeded".to_string(),
            }),
        }
    }
}

fn evolution_reason(agent: &Agent, tier: &EvolutionTier) -> String {
    let archetype = match agent.archetype {
        crate::types::Archetype::Coordinator => "Coordinator",
        crate::types::Archetype::Specialist => "Specialist",
    };
    format!(
        "{} agent upgraded to {} with {} capabilities",
        archetype,
        tier.model_upgrade,
        tier.unlocks.join(", ")
    )
}
