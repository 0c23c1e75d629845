//! Core domain types — Agent, Archetype, Performance, configs, history.

use serde::{Deserialize, Serialize};

/// Bump when the shape of the per-agent configuration changes (tier catalog
/// reshapes, new config fields). `llm::migrate_agent_config` upgrades older
/// records in place.
pub const CONFIG_VERSION: u32 = 2;

// ── Archetype ──

/// Coordinator agents orchestrate; specialist agents own a single domain.
/// Immutable after creation — it selects the tier catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Coordinator,
    Specialist,
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Archetype::Coordinator => write!(f, "coordinator"),
            Archetype::Specialist => write!(f, "specialist"),
        }
    }
}

// ── Status ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
    Training,
}

// ── Performance & stats ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub tasks_completed: u64,
    /// 0–100
    pub success_rate: f64,
    pub avg_response_secs: f64,
    pub total_earnings: u64,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            success_rate: 100.0,
            avg_response_secs: 0.0,
            total_earnings: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub total_upgrades: u64,
    pub total_tokens_spent: u64,
    pub unique_interactions: u64,
    /// 0–100
    pub domain_expertise: f64,
    pub last_active: String,
}

// ── Per-agent runtime configuration ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub version: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub context_window: u32,
}

/// Per-agent retrieval configuration. `content_hash` is a deterministic
/// content address over (agent id, domain, level) — identical inputs always
/// produce the same hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub data_source: String,
    pub vector_index: String,
    pub content_hash: String,
    pub knowledge_base: Vec<String>,
    pub updated_at: String,
}

// ── Evolution history ──

/// Append-only audit record, one per successful evolution transaction.
/// Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub previous_level: u32,
    pub new_level: u32,
    pub tokens_spent: u64,
    pub model_upgrade: String,
    pub granted_capabilities: Vec<String>,
    pub reason: String,
}

// ── Agent ──

/// The central mutable entity. Invariants:
/// - `level` equals `tiers::level_for_experience(experience)` at rest
/// - `capabilities` only grows
/// - `history.len()` equals `stats.total_upgrades`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub persona: String,
    /// Owning wallet address, exact-match ownership.
    pub owner: String,
    pub archetype: Archetype,
    pub domain: String,
    pub level: u32,
    pub experience: u64,
    pub experience_to_next: u64,
    pub capabilities: Vec<String>,
    pub minted_at: String,
    pub status: AgentStatus,
    pub performance: Performance,
    pub model_config: ModelConfig,
    pub retrieval_config: RetrievalConfig,
    pub history: Vec<HistoryEntry>,
    pub stats: AgentStats,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default = "default_config_version")]
    pub config_version: u32,
}

fn default_config_version() -> u32 {
    1 // records written before versioning existed
}

impl Agent {
    pub fn is_owned_by(&self, wallet: &str) -> bool {
        self.owner == wallet
    }

    /// Append capabilities, skipping duplicates. The set never shrinks.
    pub fn grant_capabilities(&mut self, granted: &[String]) {
        for cap in granted {
            if !self.capabilities.contains(cap) {
                self.capabilities.push(cap.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with_caps(caps: &[&str]) -> Agent {
        Agent {
            id: "a-1".into(),
            name: "Ledger Sage".into(),
            description: "finance specialist".into(),
            persona: "analytical".into(),
            owner: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".into(),
            archetype: Archetype::Specialist,
            domain: "Finance".into(),
            level: 1,
            experience: 0,
            experience_to_next: 1200,
            capabilities: caps.iter().map(|s| s.to_string()).collect(),
            minted_at: "2025-01-01T00:00:00Z".into(),
            status: AgentStatus::Active,
            performance: Performance::default(),
            model_config: ModelConfig {
                model: "GPT-3.5".into(),
                version: "3.5-turbo-0613".into(),
                temperature: 0.7,
                max_tokens: 4096,
                context_window: 4096,
            },
            retrieval_config: RetrievalConfig {
                data_source: "ds".into(),
                vector_index: "vi".into(),
                content_hash: "ch".into(),
                knowledge_base: vec![],
                updated_at: "2025-01-01T00:00:00Z".into(),
            },
            history: vec![],
            stats: AgentStats::default(),
            avatar: None,
            config_version: CONFIG_VERSION,
        }
    }

    #[test]
    fn grant_capabilities_appends_without_duplicates() {
        let mut agent = agent_with_caps(&["Basic Specialization"]);
        agent.grant_capabilities(&[
            "Basic Specialization".to_string(),
            "Domain Expertise".to_string(),
        ]);
        assert_eq!(
            agent.capabilities,
            vec!["Basic Specialization", "Domain Expertise"]
        );
    }

    #[test]
    fn ownership_is_exact_match() {
        let agent = agent_with_caps(&[]);
        assert!(agent.is_owned_by("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"));
        assert!(!agent.is_owned_by("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFi"));
    }

    #[test]
    fn records_without_config_version_deserialize_as_v1() {
        let mut value = serde_json::to_value(agent_with_caps(&[])).unwrap();
        value.as_object_mut().unwrap().remove("config_version");
        let agent: Agent = serde_json::from_value(value).unwrap();
        assert_eq!(agent.config_version, 1);
    }
}
