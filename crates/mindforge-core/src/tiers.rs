//! Evolution tier catalog & state machine.
//!
//! Two static per-archetype catalogs (one row per level, 1–10) plus the XP
//! threshold ladder. Everything here is pure and lock-free: the tables are
//! `'static` and every lookup is a read.

use crate::types::Archetype;

/// Terminal level. `next_tier` returns `None` here — a valid end state, not
/// an error.
pub const MAX_LEVEL: u32 = 10;

/// Cumulative XP required to hold each level; index 0 is level 1.
pub const XP_THRESHOLDS: [u64; 10] = [
    0,      // Level 1
    1200,   // Level 2
    3000,   // Level 3
    6000,   // Level 4
    10_000, // Level 5
    15_000, // Level 6
    21_000, // Level 7
    28_000, // Level 8
    36_000, // Level 9
    45_000, // Level 10
];

/// Immutable catalog row keyed by (archetype, level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvolutionTier {
    pub level: u32,
    pub token_cost: u64,
    pub model_upgrade: &'static str,
    pub unlocks: &'static [&'static str],
    pub voice_unlocks: &'static [&'static str],
    pub description: &'static str,
}

// ── Coordinator catalog ──

static COORDINATOR_TIERS: [EvolutionTier; 10] = [
    EvolutionTier {
        level: 1,
        token_cost: 0,
        model_upgrade: "GPT-3.5",
        unlocks: &["Basic Coordination"],
        voice_unlocks: &["Basic Speech"],
        description: "Fundamental coordination across owned specialists",
    },
    EvolutionTier {
        level: 2,
        token_cost: 50,
        model_upgrade: "GPT-4",
        unlocks: &["Advanced Coordination", "Task Delegation"],
        voice_unlocks: &["Natural Speech", "Emotion Detection"],
        description: "Enhanced coordination and natural voice interaction",
    },
    EvolutionTier {
        level: 3,
        token_cost: 100,
        model_upgrade: "Claude-3",
        unlocks: &[
            "Multi-Agent Orchestration",
            "Predictive Analysis",
            "Memory Enhancement",
        ],
        voice_unlocks: &["Multi-language", "Voice Cloning", "Emotion Synthesis"],
        description: "Multi-language support and advanced orchestration",
    },
    EvolutionTier {
        level: 4,
        token_cost: 200,
        model_upgrade: "GPT-4 Turbo",
        unlocks: &["Strategic Planning", "Knowledge Synthesis", "Adaptive Learning"],
        voice_unlocks: &[
            "Real-time Translation",
            "Voice Customization",
            "Accent Training",
        ],
        description: "Strategic planning and real-time translation",
    },
    EvolutionTier {
        level: 5,
        token_cost: 500,
        model_upgrade: "Claude-3.5 Sonnet",
        unlocks: &["Quantum Thinking", "Time Management", "Creative Synthesis"],
        voice_unlocks: &[
            "Emotional Intelligence",
            "Personality Molding",
        ],
        description: "Quantum thinking and personality molding",
    },
    EvolutionTier {
        level: 6,
        token_cost: 800,
        model_upgrade: "Claude-3.5 Sonnet",
        unlocks: &["Cross-Domain Synthesis", "Long-Horizon Planning"],
        voice_unlocks: &["Conversational Memory"],
        description: "Cross-domain synthesis over long horizons",
    },
    EvolutionTier {
        level: 7,
        token_cost: 1200,
        model_upgrade: "GPT-5 (Preview)",
        unlocks: &["Omniscient Coordination", "Predictive Mastery"],
        voice_unlocks: &["Universal Translation", "Voice Synthesis"],
        description: "Omniscient coordination and universal translation",
    },
    EvolutionTier {
        level: 8,
        token_cost: 1800,
        model_upgrade: "GPT-5 (Preview)",
        unlocks: &["Creative Genius", "Swarm Direction"],
        voice_unlocks: &["Emotional Mastery"],
        description: "Creative genius directing whole agent swarms",
    },
    EvolutionTier {
        level: 9,
        token_cost: 3000,
        model_upgrade: "Claude-4",
        unlocks: &["Reality Manipulation", "Time Dilation"],
        voice_unlocks: &["Reality Voice", "Dimensional Speech"],
        description: "Reality manipulation at coordination scale",
    },
    EvolutionTier {
        level: 10,
        token_cost: 5000,
        model_upgrade: "Claude-4",
        unlocks: &["Dimensional Travel", "Total Recall"],
        voice_unlocks: &["Thought Projection"],
        description: "Dimensional capabilities and total recall",
    },
];

// ── Specialist catalog ──

static SPECIALIST_TIERS: [EvolutionTier; 10] = [
    EvolutionTier {
        level: 1,
        token_cost: 0,
        model_upgrade: "GPT-3.5",
        unlocks: &["Basic Specialization"],
        voice_unlocks: &["Basic Speech"],
        description: "Fundamental domain specialization",
    },
    EvolutionTier {
        level: 2,
        token_cost: 25,
        model_upgrade: "GPT-4",
        unlocks: &["Advanced Specialization", "Domain Expertise"],
        voice_unlocks: &["Natural Speech", "Emotion Detection"],
        description: "Advanced domain expertise",
    },
    EvolutionTier {
        level: 3,
        token_cost: 50,
        model_upgrade: "Claude-3",
        unlocks: &[
            "Expert Specialization",
            "Deep Domain Knowledge",
            "Skill Mastery",
        ],
        voice_unlocks: &["Multi-language", "Voice Cloning", "Emotion Synthesis"],
        description: "Expert specialization and deep domain knowledge",
    },
    EvolutionTier {
        level: 4,
        token_cost: 100,
        model_upgrade: "GPT-4 Turbo",
        unlocks: &["Master Specialization", "Innovation Skills", "Problem Solving"],
        voice_unlocks: &[
            "Real-time Translation",
            "Voice Customization",
            "Accent Training",
        ],
        description: "Master specialization and innovation skills",
    },
    EvolutionTier {
        level: 5,
        token_cost: 250,
        model_upgrade: "Claude-3.5 Sonnet",
        unlocks: &[
            "Legendary Specialization",
            "Creative Mastery",
            "Advanced Problem Solving",
        ],
        voice_unlocks: &[
            "Emotional Intelligence",
            "Personality Molding",
        ],
        description: "Legendary specialization and creative mastery",
    },
    EvolutionTier {
        level: 6,
        token_cost: 400,
        model_upgrade: "Claude-3.5 Sonnet",
        unlocks: &["Frontier Research", "Toolchain Fluency"],
        voice_unlocks: &["Conversational Memory"],
        description: "Frontier research and toolchain fluency",
    },
    EvolutionTier {
        level: 7,
        token_cost: 600,
        model_upgrade: "GPT-5 (Preview)",
        unlocks: &["Mythical Specialization", "Domain Mastery"],
        voice_unlocks: &["Universal Translation", "Voice Synthesis"],
        description: "Mythical specialization and domain mastery",
    },
    EvolutionTier {
        level: 8,
        token_cost: 900,
        model_upgrade: "GPT-5 (Preview)",
        unlocks: &["Revolutionary Skills", "Autonomous Practice"],
        voice_unlocks: &["Emotional Mastery"],
        description: "Revolutionary skills practiced autonomously",
    },
    EvolutionTier {
        level: 9,
        token_cost: 1500,
        model_upgrade: "Claude-4",
        unlocks: &["Divine Specialization", "Reality Manipulation"],
        voice_unlocks: &["Reality Voice", "Dimensional Speech"],
        description: "Divine specialization within the domain",
    },
    EvolutionTier {
        level: 10,
        token_cost: 2500,
        model_upgrade: "Claude-4",
        unlocks: &["Dimensional Skills", "Perfect Execution"],
        voice_unlocks: &["Thought Projection"],
        description: "Dimensional skills and perfect execution",
    },
];

pub fn tier_table(archetype: Archetype) -> &'static [EvolutionTier; 10] {
    match archetype {
        Archetype::Coordinator => &COORDINATOR_TIERS,
        Archetype::Specialist => &SPECIALIST_TIERS,
    }
}

// ── Level / XP mapping ──

/// Highest level whose threshold is ≤ xp.
pub fn level_for_experience(xp: u64) -> u32 {
    let mut level = 1;
    for (i, threshold) in XP_THRESHOLDS.iter().enumerate() {
        if xp >= *threshold {
            level = (i + 1) as u32;
        }
    }
    level
}

/// Checked variant for callers holding signed values. Negative experience is
/// rejected rather than clamped.
pub fn try_level_for_experience(xp: i64) -> Option<u32> {
    if xp < 0 {
        return None;
    }
    Some(level_for_experience(xp as u64))
}

/// Cumulative XP required to hold `level`. `None` outside 1..=MAX_LEVEL.
pub fn threshold_for_level(level: u32) -> Option<u64> {
    if level == 0 || level > MAX_LEVEL {
        return None;
    }
    Some(XP_THRESHOLDS[(level - 1) as usize])
}

/// Remaining XP gap to the next level; 0 at the terminal level.
pub fn xp_to_next(level: u32, xp: u64) -> u64 {
    if level >= MAX_LEVEL {
        return 0;
    }
    XP_THRESHOLDS[level as usize].saturating_sub(xp)
}

/// Progress through the current level bracket, 0–100.
pub fn progress_toward_next(level: u32, xp: u64) -> f64 {
    if level >= MAX_LEVEL {
        return 100.0;
    }
    let start = XP_THRESHOLDS[(level - 1) as usize] as f64;
    let end = XP_THRESHOLDS[level as usize] as f64;
    (((xp as f64 - start) / (end - start)) * 100.0).clamp(0.0, 100.0)
}

// ── Catalog lookups ──

/// Highest catalog row with `row.level <= level` (first row as floor).
pub fn current_tier(archetype: Archetype, level: u32) -> &'static EvolutionTier {
    let table = tier_table(archetype);
    table
        .iter()
        .rev()
        .find(|tier| tier.level <= level)
        .unwrap_or(&table[0])
}

/// The row for `level + 1`, or `None` at the table maximum. Callers must
/// treat `None` as "no further evolution possible", not as a failure.
pub fn next_tier(archetype: Archetype, level: u32) -> Option<&'static EvolutionTier> {
    tier_table(archetype)
        .iter()
        .find(|tier| tier.level == level + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_for_experience_is_monotonic() {
        let mut last = 0;
        for xp in (0..50_000).step_by(100) {
            let level = level_for_experience(xp);
            assert!(level >= last, "level dropped at xp={}", xp);
            last = level;
        }
    }

    #[test]
    fn level_for_experience_agrees_with_thresholds() {
        for (i, threshold) in XP_THRESHOLDS.iter().enumerate() {
            let level = (i + 1) as u32;
            assert_eq!(level_for_experience(*threshold), level);
            if *threshold > 0 {
                assert_eq!(level_for_experience(*threshold - 1), level - 1);
            }
        }
    }

    #[test]
    fn negative_experience_is_rejected() {
        assert_eq!(try_level_for_experience(-1), None);
        assert_eq!(try_level_for_experience(0), Some(1));
        assert_eq!(try_level_for_experience(45_000), Some(10));
    }

    #[test]
    fn next_tier_is_none_only_at_table_maximum() {
        for archetype in [Archetype::Coordinator, Archetype::Specialist] {
            for tier in tier_table(archetype) {
                let next = next_tier(archetype, tier.level);
                if tier.level == MAX_LEVEL {
                    assert!(next.is_none());
                } else {
                    assert_eq!(next.unwrap().level, tier.level + 1);
                }
            }
        }
    }

    #[test]
    fn costs_strictly_increase_within_each_table() {
        for archetype in [Archetype::Coordinator, Archetype::Specialist] {
            let table = tier_table(archetype);
            for pair in table.windows(2) {
                assert!(
                    pair[1].token_cost > pair[0].token_cost,
                    "{archetype} cost not increasing at level {}",
                    pair[1].level
                );
            }
        }
    }

    #[test]
    fn every_tier_above_one_unlocks_something() {
        for archetype in [Archetype::Coordinator, Archetype::Specialist] {
            for tier in tier_table(archetype).iter().filter(|t| t.level > 1) {
                assert!(!tier.unlocks.is_empty());
            }
        }
    }

    #[test]
    fn xp_to_next_is_zero_at_terminal_level() {
        assert_eq!(xp_to_next(MAX_LEVEL, 45_000), 0);
        assert_eq!(xp_to_next(4, 9_500), 500);
        assert_eq!(xp_to_next(1, 0), 1200);
    }

    #[test]
    fn progress_is_bounded() {
        assert_eq!(progress_toward_next(MAX_LEVEL, 60_000), 100.0);
        assert_eq!(progress_toward_next(1, 0), 0.0);
        let halfway = progress_toward_next(1, 600);
        assert!((halfway - 50.0).abs() < 1e-9);
    }

    #[test]
    fn specialist_level_five_costs_250() {
        let tier = next_tier(Archetype::Specialist, 4).unwrap();
        assert_eq!(tier.level, 5);
        assert_eq!(tier.token_cost, 250);
    }

    #[test]
    fn current_tier_floors_at_first_row() {
        let tier = current_tier(Archetype::Coordinator, 1);
        assert_eq!(tier.level, 1);
        assert_eq!(tier.token_cost, 0);
    }
}
