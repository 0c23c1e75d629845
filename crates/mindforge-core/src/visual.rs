//! Visual evolution resolver — level → stage, stage + performance → effects.
//!
//! Everything is deterministic in (level, success rate, xp); effects are
//! cheap to recompute on every read and are never cached as ground truth.

use serde::Serialize;

use crate::rarity::RarityBand;
use crate::types::Agent;

// ── Effects ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Glow,
    Particles,
    Aura,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisualEffect {
    pub kind: EffectKind,
    /// 0–100
    pub intensity: u8,
    pub color: &'static str,
    pub animation: &'static str,
}

// ── Stages ──

/// Named bucket keyed by minimum level, with ordered base effects and the
/// rarity band the stage starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionStage {
    pub name: &'static str,
    pub min_level: u32,
    pub base_effects: &'static [VisualEffect],
    pub base_band: RarityBand,
    pub description: &'static str,
}

static STAGES: [EvolutionStage; 6] = [
    EvolutionStage {
        name: "Novice",
        min_level: 1,
        base_effects: &[],
        base_band: RarityBand::Common,
        description: "A newly minted agent with basic capabilities",
    },
    EvolutionStage {
        name: "Apprentice",
        min_level: 3,
        base_effects: &[],
        base_band: RarityBand::Common,
        description: "An agent gaining experience and skills",
    },
    EvolutionStage {
        name: "Advanced",
        min_level: 5,
        base_effects: &[VisualEffect {
            kind: EffectKind::Glow,
            intensity: 30,
            color: "#00FFFF",
            animation: "pulse",
        }],
        base_band: RarityBand::Rare,
        description: "An advanced agent with a glowing aura",
    },
    EvolutionStage {
        name: "Expert",
        min_level: 10,
        base_effects: &[
            VisualEffect {
                kind: EffectKind::Glow,
                intensity: 50,
                color: "#00FFFF",
                animation: "pulse",
            },
            VisualEffect {
                kind: EffectKind::Particles,
                intensity: 40,
                color: "#8B5CF6",
                animation: "float",
            },
        ],
        base_band: RarityBand::Rare,
        description: "An expert agent with glow and floating particles",
    },
    EvolutionStage {
        name: "Master",
        min_level: 15,
        base_effects: &[
            VisualEffect {
                kind: EffectKind::Glow,
                intensity: 70,
                color: "#00FFFF",
                animation: "pulse",
            },
            VisualEffect {
                kind: EffectKind::Particles,
                intensity: 60,
                color: "#8B5CF6",
                animation: "float",
            },
            VisualEffect {
                kind: EffectKind::Aura,
                intensity: 50,
                color: "#F59E0B",
                animation: "rotate",
            },
        ],
        base_band: RarityBand::Epic,
        description: "A master agent with a powerful rotating aura",
    },
    EvolutionStage {
        name: "Legendary",
        min_level: 20,
        base_effects: &[
            VisualEffect {
                kind: EffectKind::Glow,
                intensity: 100,
                color: "#FFD700",
                animation: "pulse",
            },
            VisualEffect {
                kind: EffectKind::Particles,
                intensity: 80,
                color: "#FF6B6B",
                animation: "float",
            },
            VisualEffect {
                kind: EffectKind::Aura,
                intensity: 70,
                color: "#FFD700",
                animation: "rotate",
            },
            VisualEffect {
                kind: EffectKind::Legendary,
                intensity: 100,
                color: "#FFD700",
                animation: "legendary",
            },
        ],
        base_band: RarityBand::Legendary,
        description: "A legendary agent with divine visual effects",
    },
];

pub fn all_stages() -> &'static [EvolutionStage] {
    &STAGES
}

/// Highest-qualifying stage whose minimum level ≤ level. This is the single
/// canonical level→stage mapping for every pipeline path.
pub fn stage_for_level(level: u32) -> &'static EvolutionStage {
    STAGES
        .iter()
        .rev()
        .find(|stage| level >= stage.min_level)
        .unwrap_or(&STAGES[0])
}

// ── Effect resolution ──

/// Success rate at which the bonus glow kicks in.
const SUCCESS_GLOW_THRESHOLD: f64 = 98.0;
/// Cumulative XP at which the particle burst kicks in.
const XP_BURST_THRESHOLD: u64 = 50_000;

/// Stage base effects plus performance-conditioned bonuses.
pub fn visual_effects(agent: &Agent, stage: &EvolutionStage) -> Vec<VisualEffect> {
    let mut effects: Vec<VisualEffect> = stage.base_effects.to_vec();

    if agent.performance.success_rate >= SUCCESS_GLOW_THRESHOLD {
        let base_glow = stage
            .base_effects
            .iter()
            .find(|e| e.kind == EffectKind::Glow)
            .map(|e| e.intensity)
            .unwrap_or(0);
        effects.push(VisualEffect {
            kind: EffectKind::Glow,
            intensity: base_glow.saturating_add(20).min(100),
            color: "#00FF00",
            animation: "success-pulse",
        });
    }

    if agent.experience >= XP_BURST_THRESHOLD {
        effects.push(VisualEffect {
            kind: EffectKind::Particles,
            intensity: 90,
            color: "#FF6B6B",
            animation: "xp-burst",
        });
    }

    effects
}

pub fn has_effect(effects: &[VisualEffect], kind: EffectKind) -> bool {
    effects.iter().any(|e| e.kind == kind)
}

/// Deterministic avatar reference for (agent, level, stage). No timestamps:
/// the same state always names the same image.
pub fn avatar_reference(agent_id: &str, level: u32, stage: &EvolutionStage) -> String {
    format!(
        "/avatars/generated/{}_{:02}_{}.png",
        agent_id,
        level,
        stage.name.to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AgentStats, AgentStatus, Archetype, ModelConfig, Performance, RetrievalConfig,
    };

    fn agent(level: u32, success_rate: f64, xp: u64) -> Agent {
        Agent {
            id: "a-7".into(),
            name: "Scout".into(),
            description: String::new(),
            persona: String::new(),
            owner: "owner".into(),
            archetype: Archetype::Specialist,
            domain: "Technical".into(),
            level,
            experience: xp,
            experience_to_next: 0,
            capabilities: vec![],
            minted_at: "2025-01-01T00:00:00Z".into(),
            status: AgentStatus::Active,
            performance: Performance {
                success_rate,
                ..Performance::default()
            },
            model_config: ModelConfig {
                model: "GPT-3.5".into(),
                version: "latest".into(),
                temperature: 0.7,
                max_tokens: 4096,
                context_window: 4096,
            },
            retrieval_config: RetrievalConfig {
                data_source: String::new(),
                vector_index: String::new(),
                content_hash: String::new(),
                knowledge_base: vec![],
                updated_at: String::new(),
            },
            history: vec![],
            stats: AgentStats::default(),
            avatar: None,
            config_version: crate::types::CONFIG_VERSION,
        }
    }

    #[test]
    fn stage_boundaries() {
        assert_eq!(stage_for_level(1).name, "Novice");
        assert_eq!(stage_for_level(2).name, "Novice");
        assert_eq!(stage_for_level(3).name, "Apprentice");
        assert_eq!(stage_for_level(5).name, "Advanced");
        assert_eq!(stage_for_level(10).name, "Expert");
        assert_eq!(stage_for_level(15).name, "Master");
        assert_eq!(stage_for_level(20).name, "Legendary");
        assert_eq!(stage_for_level(25).name, "Legendary");
    }

    #[test]
    fn effects_are_deterministic() {
        let a = agent(10, 99.0, 60_000);
        let stage = stage_for_level(a.level);
        let first = visual_effects(&a, stage);
        let second = visual_effects(&a, stage);
        assert_eq!(first, second);
    }

    #[test]
    fn success_glow_added_at_98() {
        let a = agent(10, 98.0, 0);
        let stage = stage_for_level(a.level);
        let effects = visual_effects(&a, stage);
        let bonus = effects
            .iter()
            .find(|e| e.animation == "success-pulse")
            .unwrap();
        // Expert base glow is 50, bonus adds 20
        assert_eq!(bonus.intensity, 70);
    }

    #[test]
    fn xp_burst_added_at_fifty_thousand() {
        let a = agent(5, 90.0, 50_000);
        let stage = stage_for_level(a.level);
        let effects = visual_effects(&a, stage);
        assert!(effects.iter().any(|e| e.animation == "xp-burst"));
    }

    #[test]
    fn no_bonuses_below_thresholds() {
        let a = agent(5, 90.0, 10_000);
        let stage = stage_for_level(a.level);
        let effects = visual_effects(&a, stage);
        assert_eq!(effects.len(), stage.base_effects.len());
    }

    #[test]
    fn avatar_reference_is_stable() {
        let stage = stage_for_level(5);
        let a = avatar_reference("a-7", 5, stage);
        let b = avatar_reference("a-7", 5, stage);
        assert_eq!(a, b);
        assert_eq!(a, "/avatars/generated/a-7_05_advanced.png");
    }
}
