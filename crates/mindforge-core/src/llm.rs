//! Model & retrieval configuration.
//!
//! Fixed per-model runtime parameter tables plus deterministic generators
//! for the per-agent retrieval configuration. No clocks and no randomness
//! in here: identical inputs always produce identical output, which is what
//! makes the retrieval config content-addressable.

use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::tiers;
use crate::types::{Agent, Archetype, ModelConfig, RetrievalConfig, CONFIG_VERSION};

// ── Model parameter table ──

struct ModelParams {
    model: &'static str,
    version: &'static str,
    temperature: f64,
    max_tokens: u32,
    context_window: u32,
}

static MODEL_PARAMS: [ModelParams; 7] = [
    ModelParams {
        model: "GPT-3.5",
        version: "3.5-turbo-0613",
        temperature: 0.7,
        max_tokens: 4096,
        context_window: 4096,
    },
    ModelParams {
        model: "GPT-4",
        version: "4-0613",
        temperature: 0.6,
        max_tokens: 8192,
        context_window: 8192,
    },
    ModelParams {
        model: "Claude-3",
        version: "3-sonnet-20240229",
        temperature: 0.5,
        max_tokens: 200_000,
        context_window: 200_000,
    },
    ModelParams {
        model: "GPT-4 Turbo",
        version: "4-turbo-2024-04-09",
        temperature: 0.6,
        max_tokens: 128_000,
        context_window: 128_000,
    },
    ModelParams {
        model: "Claude-3.5 Sonnet",
        version: "3.5-sonnet-20241022",
        temperature: 0.5,
        max_tokens: 200_000,
        context_window: 200_000,
    },
    ModelParams {
        model: "GPT-5 (Preview)",
        version: "5-preview-2024-12-01",
        temperature: 0.4,
        max_tokens: 256_000,
        context_window: 256_000,
    },
    ModelParams {
        model: "Claude-4",
        version: "4-opus-20240229",
        temperature: 0.3,
        max_tokens: 200_000,
        context_window: 200_000,
    },
];

/// Runtime parameters for a model id, with conservative fallbacks for
/// anything not in the ladder.
pub fn model_config_for(model: &str) -> ModelConfig {
    match MODEL_PARAMS.iter().find(|p| p.model == model) {
        Some(p) => ModelConfig {
            model: p.model.to_string(),
            version: p.version.to_string(),
            temperature: p.temperature,
            max_tokens: p.max_tokens,
            context_window: p.context_window,
        },
        None => ModelConfig {
            model: model.to_string(),
            version: "latest".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            context_window: 4096,
        },
    }
}

// ── Knowledge bases ──

static KNOWLEDGE_BASES: &[(&str, &[&str])] = &[
    (
        "Technical",
        &[
            "Programming languages and frameworks",
            "Software architecture patterns",
            "Database design and optimization",
            "API development and integration",
            "DevOps and deployment strategies",
        ],
    ),
    (
        "Health & Wellness",
        &[
            "Nutrition and dietary guidelines",
            "Exercise and fitness programs",
            "Mental health and mindfulness",
            "Medical research and studies",
            "Wellness lifestyle practices",
        ],
    ),
    (
        "Learning",
        &[
            "Educational methodologies",
            "Cognitive learning strategies",
            "Subject-specific knowledge bases",
            "Assessment and evaluation techniques",
            "Learning technology integration",
        ],
    ),
    (
        "Creative",
        &[
            "Artistic techniques and styles",
            "Design principles and trends",
            "Creative writing methodologies",
            "Digital media production",
            "Innovation and ideation processes",
        ],
    ),
    (
        "Finance",
        &[
            "Financial analysis and forecasting",
            "Portfolio and risk management",
            "Market structure and instruments",
            "Regulatory compliance",
            "Strategic budget planning",
        ],
    ),
];

/// Per-domain curated list, sliced by level (level + 2 entries, capped at
/// the list length). Unknown domains fall back to the technical list.
pub fn knowledge_base_for(domain: &str, level: u32) -> Vec<String> {
    let entries = KNOWLEDGE_BASES
        .iter()
        .find(|(d, _)| *d == domain)
        .map(|(_, e)| *e)
        .unwrap_or(KNOWLEDGE_BASES[0].1);
    let take = ((level as usize) + 2).min(entries.len());
    entries[..take].iter().map(|s| s.to_string()).collect()
}

// ── Content addressing ──

fn domain_slug(domain: &str) -> String {
    domain
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// SHA-256 over the identifying inputs, rendered base64-url without padding.
pub fn content_address(agent_id: &str, archetype: Archetype, domain: &str, level: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(agent_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(archetype.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(domain.as_bytes());
    hasher.update(level.to_be_bytes());
    let digest = hasher.finalize();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Deterministic retrieval configuration for (agent, archetype, domain,
/// level). The caller supplies the timestamp so repeated generation for the
/// same state stays byte-identical.
pub fn retrieval_config_for(
    agent_id: &str,
    archetype: Archetype,
    domain: &str,
    level: u32,
    updated_at: &str,
) -> RetrievalConfig {
    let slug = domain_slug(domain);
    RetrievalConfig {
        data_source: format!("ds_{}_{}_l{}", agent_id, slug, level),
        vector_index: format!("vx_{}_l{}", agent_id, level),
        content_hash: content_address(agent_id, archetype, domain, level),
        knowledge_base: knowledge_base_for(domain, level),
        updated_at: updated_at.to_string(),
    }
}

// ── Config migration ──

/// Upgrade an agent record written under an older configuration layout.
/// Re-derives model and retrieval configuration from the current tier
/// catalog; a no-op for records already at the current version.
pub fn migrate_agent_config(agent: &mut Agent) {
    if agent.config_version >= CONFIG_VERSION {
        return;
    }
    let tier = tiers::current_tier(agent.archetype, agent.level);
    agent.model_config = model_config_for(tier.model_upgrade);
    agent.retrieval_config = retrieval_config_for(
        &agent.id,
        agent.archetype,
        &agent.domain,
        agent.level,
        &agent.retrieval_config.updated_at,
    );
    agent.config_version = CONFIG_VERSION;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_table_covers_the_tier_ladder() {
        for archetype in [Archetype::Coordinator, Archetype::Specialist] {
            for tier in tiers::tier_table(archetype) {
                let config = model_config_for(tier.model_upgrade);
                assert_ne!(config.version, "latest", "missing params for {}", tier.model_upgrade);
            }
        }
    }

    #[test]
    fn unknown_model_gets_fallback_params() {
        let config = model_config_for("Mystery-9000");
        assert_eq!(config.version, "latest");
        assert_eq!(config.max_tokens, 4096);
    }

    #[test]
    fn content_address_is_deterministic_and_level_sensitive() {
        let a = content_address("a-1", Archetype::Specialist, "Finance", 5);
        let b = content_address("a-1", Archetype::Specialist, "Finance", 5);
        let c = content_address("a-1", Archetype::Specialist, "Finance", 6);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn retrieval_config_grows_with_level() {
        let low = retrieval_config_for("a-1", Archetype::Specialist, "Learning", 1, "t");
        let high = retrieval_config_for("a-1", Archetype::Specialist, "Learning", 5, "t");
        assert_eq!(low.knowledge_base.len(), 3);
        assert_eq!(high.knowledge_base.len(), 5);
        assert_ne!(low.content_hash, high.content_hash);
    }

    #[test]
    fn unknown_domain_falls_back_to_technical() {
        let kb = knowledge_base_for("Astrogation", 3);
        assert_eq!(kb[0], "Programming languages and frameworks");
    }

    #[test]
    fn domain_slug_flattens_punctuation() {
        let config = retrieval_config_for("a-1", Archetype::Specialist, "Health & Wellness", 2, "t");
        assert_eq!(config.data_source, "ds_a-1_health___wellness_l2");
    }
}
