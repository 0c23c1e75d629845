//! Token metadata synthesis.
//!
//! Builds the registry-facing document for an agent's on-chain asset. The
//! document must be stable under re-serialization — identical state always
//! yields a byte-identical document — so field order is fixed, attribute
//! order is fixed, and every timestamp is supplied by the caller rather
//! than sampled here.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::MetadataError;
use crate::rarity::RarityResult;
use crate::types::Agent;
use crate::visual::{self, EffectKind, EvolutionStage, VisualEffect};

// ── Document shape ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub uri: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub address: String,
    pub share: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    pub files: Vec<FileRef>,
    pub category: String,
    pub creators: Vec<Creator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    pub external_url: String,
    pub attributes: Vec<Attribute>,
    pub properties: Properties,
}

impl TokenMetadata {
    /// Canonical serialization. Struct field order is declaration order and
    /// attributes keep their synthesis order, so this is byte-stable.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("metadata document serializes")
    }

    /// SHA-256 of the canonical JSON, base64-url without padding.
    pub fn content_address(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

// ── Attribute helpers ──

fn attr(trait_type: &str, value: impl Into<serde_json::Value>) -> Attribute {
    Attribute {
        trait_type: trait_type.to_string(),
        value: value.into(),
        display_type: None,
        max_value: None,
    }
}

fn attr_number(trait_type: &str, value: impl Into<serde_json::Value>) -> Attribute {
    Attribute {
        trait_type: trait_type.to_string(),
        value: value.into(),
        display_type: Some("number".to_string()),
        max_value: None,
    }
}

fn attr_capped(trait_type: &str, value: impl Into<serde_json::Value>, max: u64) -> Attribute {
    Attribute {
        trait_type: trait_type.to_string(),
        value: value.into(),
        display_type: Some("number".to_string()),
        max_value: Some(max),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

// ── Synthesis ──

/// Caller-supplied context: branding and the transaction timestamp.
#[derive(Debug, Clone, Copy)]
pub struct MetadataContext<'a> {
    pub symbol: &'a str,
    pub external_url_base: &'a str,
    pub last_evolved: &'a str,
}

/// Synthesize the full metadata document for an agent in a given stage,
/// with its resolved effects and rarity.
pub fn synthesize(
    agent: &Agent,
    stage: &EvolutionStage,
    effects: &[VisualEffect],
    rarity: &RarityResult,
    ctx: MetadataContext<'_>,
) -> TokenMetadata {
    let image = agent
        .avatar
        .clone()
        .unwrap_or_else(|| "/avatars/default-agent.png".to_string());

    let description = format!(
        "{} is a {} {} agent, evolved to the {} stage with {} rarity, \
         achieving a {}% success rate across {} tasks. {}",
        agent.name,
        agent.domain,
        agent.archetype,
        stage.name,
        rarity.band,
        agent.performance.success_rate,
        agent.performance.tasks_completed,
        stage.description,
    );

    let attributes = vec![
        // Identity
        attr("Agent Name", agent.name.as_str()),
        attr("Domain", agent.domain.as_str()),
        attr("Persona", agent.persona.as_str()),
        attr("Archetype", agent.archetype.to_string()),
        // Progression
        attr_capped("Level", agent.level, 20),
        attr("Evolution Stage", stage.name),
        attr("Rarity", rarity.band.name()),
        attr_number("Rarity Multiplier", rarity.band.multiplier()),
        // Performance
        attr_number("Experience", agent.experience),
        attr_number("Tasks Completed", agent.performance.tasks_completed),
        attr_capped("Success Rate", agent.performance.success_rate, 100),
        attr_number("Total Earnings", agent.performance.total_earnings),
        // Visual effects
        attr_number("Visual Effects", effects.len() as u64),
        attr("Has Glow", yes_no(visual::has_effect(effects, EffectKind::Glow))),
        attr(
            "Has Particles",
            yes_no(visual::has_effect(effects, EffectKind::Particles)),
        ),
        attr("Has Aura", yes_no(visual::has_effect(effects, EffectKind::Aura))),
        attr(
            "Is Legendary",
            yes_no(visual::has_effect(effects, EffectKind::Legendary)),
        ),
        // Technical configuration
        attr("Model", agent.model_config.model.as_str()),
        attr("Model Version", agent.model_config.version.as_str()),
        attr("Vector Index", agent.retrieval_config.vector_index.as_str()),
        attr_number(
            "Knowledge Base Size",
            agent.retrieval_config.knowledge_base.len() as u64,
        ),
        // Aggregate stats
        attr_number("Total Upgrades", agent.stats.total_upgrades),
        attr_number("Total Tokens Spent", agent.stats.total_tokens_spent),
        attr_number("Unique Interactions", agent.stats.unique_interactions),
        attr_capped("Domain Expertise", agent.stats.domain_expertise, 100),
        attr_number("Evolution Events", agent.history.len() as u64),
        // Timestamps
        attr("Minted At", agent.minted_at.as_str()),
        attr("Last Evolved", ctx.last_evolved),
    ];

    TokenMetadata {
        name: format!("{} - {}", agent.name, stage.name),
        symbol: ctx.symbol.to_string(),
        description,
        image: image.clone(),
        external_url: format!("{}/{}", ctx.external_url_base.trim_end_matches('/'), agent.id),
        attributes,
        properties: Properties {
            files: vec![FileRef {
                uri: image,
                file_type: "image/png".to_string(),
            }],
            category: "image".to_string(),
            creators: vec![Creator {
                address: agent.owner.clone(),
                share: 100,
            }],
        },
    }
}

/// Validate a document before registry submission. A failure here blocks
/// the submission without touching already-committed state.
pub fn validate(doc: &TokenMetadata) -> Result<(), MetadataError> {
    if doc.name.is_empty() {
        return Err(MetadataError::MissingField("name"));
    }
    if doc.description.is_empty() {
        return Err(MetadataError::MissingField("description"));
    }
    if doc.image.is_empty() {
        return Err(MetadataError::MissingField("image"));
    }
    for (index, attribute) in doc.attributes.iter().enumerate() {
        if attribute.trait_type.is_empty() {
            return Err(MetadataError::EmptyTraitType { index });
        }
    }
    Ok(())
}
