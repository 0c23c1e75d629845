//! Error taxonomy for the evolution pipeline.
//!
//! Three families: `RejectionError` (unmet precondition, no side effects,
//! safe to surface), `ExternalServiceError` (a remote call failed or timed
//! out — fatal after the charge), and `MetadataError` (a synthesized
//! document failed validation). Every `EvolutionError` carries the pipeline
//! step at which it occurred so reconciliation can resume from the right
//! place instead of re-running completed steps.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Pipeline steps ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Validate,
    Charge,
    Compute,
    StageMetadata,
    Commit,
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStep::Validate => write!(f, "validate"),
            PipelineStep::Charge => write!(f, "charge"),
            PipelineStep::Compute => write!(f, "compute"),
            PipelineStep::StageMetadata => write!(f, "stage_metadata"),
            PipelineStep::Commit => write!(f, "commit"),
        }
    }
}

// ── Remote call classification ──

/// How a remote call ended. `Unknown` (timeout, connection dropped mid
/// flight) is what forces `PartiallyApplied` after a charge — the effect may
/// or may not have landed, so retrying risks doubling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Confirmed,
    Failed,
    Unknown,
}

// ── Rejections ──

/// Unmet precondition. Always raised before any side effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectionError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("caller does not own this agent")]
    NotOwner,

    #[error("invalid wallet address format")]
    InvalidWalletAddress,

    #[error("active subscription required")]
    NoSubscription,

    #[error("insufficient credits (need {required})")]
    InsufficientCredits { required: u32 },

    #[error("insufficient offer: required {required} tokens, offered {offered}")]
    InsufficientOffer { required: u64, offered: u64 },

    #[error("agent is at the terminal level {level}; no further evolution possible")]
    TerminalLevel { level: u32 },

    #[error("no staged metadata document to retry")]
    NoStagedMetadata,
}

// ── External services ──

#[derive(Debug, Error)]
#[error("{service} call {outcome:?} at step {step}: {message}")]
pub struct ExternalServiceError {
    pub service: &'static str,
    pub step: PipelineStep,
    pub outcome: CallOutcome,
    pub message: String,
}

// ── Metadata validation ──

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataError {
    #[error("required field `{0}` is empty")]
    MissingField(&'static str),

    #[error("attribute {index} has an empty trait type")]
    EmptyTraitType { index: usize },
}

// ── Top-level pipeline error ──

#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error("rejected at step {step}: {reason}")]
    Rejected {
        step: PipelineStep,
        #[source]
        reason: RejectionError,
    },

    #[error(transparent)]
    External(#[from] ExternalServiceError),

    #[error("metadata invalid at step {step}: {reason}")]
    Metadata {
        step: PipelineStep,
        #[source]
        reason: MetadataError,
    },
}

impl EvolutionError {
    pub fn rejected(step: PipelineStep, reason: RejectionError) -> Self {
        EvolutionError::Rejected { step, reason }
    }

    /// The step at which the pipeline stopped.
    pub fn step(&self) -> PipelineStep {
        match self {
            EvolutionError::Rejected { step, .. } => *step,
            EvolutionError::External(e) => e.step,
            EvolutionError::Metadata { step, .. } => *step,
        }
    }

    /// True when the failure happened before any irreversible effect.
    pub fn is_side_effect_free(&self) -> bool {
        matches!(self.step(), PipelineStep::Validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_carry_their_step() {
        let err = EvolutionError::rejected(
            PipelineStep::Validate,
            RejectionError::InsufficientOffer {
                required: 250,
                offered: 100,
            },
        );
        assert_eq!(err.step(), PipelineStep::Validate);
        assert!(err.is_side_effect_free());
    }

    #[test]
    fn post_charge_external_failures_are_not_side_effect_free() {
        let err = EvolutionError::from(ExternalServiceError {
            service: "registry",
            step: PipelineStep::StageMetadata,
            outcome: CallOutcome::Unknown,
            message: "deadline exceeded".into(),
        });
        assert_eq!(err.step(), PipelineStep::StageMetadata);
        assert!(!err.is_side_effect_free());
    }
}
