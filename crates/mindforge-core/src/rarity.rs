//! Rarity scoring engine.
//!
//! Eight weighted factors, each normalized to 0–100, summed into a composite
//! score and classified into one of four bands. Pure: identical inputs yield
//! an identical score, band, and per-factor breakdown on every call.

use serde::Serialize;

use crate::types::Agent;
use crate::visual::EvolutionStage;

// ── Bands ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RarityBand {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl RarityBand {
    /// Bands partition [0,100] with no gaps or overlaps:
    /// common [0,50], rare (50,75], epic (75,90], legendary (90,100].
    pub fn from_score(score: f64) -> Self {
        if score > 90.0 {
            RarityBand::Legendary
        } else if score > 75.0 {
            RarityBand::Epic
        } else if score > 50.0 {
            RarityBand::Rare
        } else {
            RarityBand::Common
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            RarityBand::Common => 1.0,
            RarityBand::Rare => 1.5,
            RarityBand::Epic => 2.0,
            RarityBand::Legendary => 3.0,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RarityBand::Common => "#9CA3AF",
            RarityBand::Rare => "#3B82F6",
            RarityBand::Epic => "#8B5CF6",
            RarityBand::Legendary => "#FFD700",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RarityBand::Common => "common",
            RarityBand::Rare => "rare",
            RarityBand::Epic => "epic",
            RarityBand::Legendary => "legendary",
        }
    }
}

impl std::fmt::Display for RarityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Factors ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RarityFactor {
    pub name: &'static str,
    /// Normalized 0–100
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
    pub description: &'static str,
}

fn factor(name: &'static str, raw: f64, weight: f64, description: &'static str) -> RarityFactor {
    let value = raw.clamp(0.0, 100.0);
    RarityFactor {
        name,
        value,
        weight,
        contribution: value * weight,
        description,
    }
}

// ── Preservation ──

/// Requirements to retain a band through future evolutions. Escalate with
/// the band; common has nothing worth preserving.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preservation {
    pub can_preserve: bool,
    pub minimum_balance: u64,
    pub minimum_level: u32,
    pub minimum_success_rate: f64,
    pub minimum_tasks: u64,
}

pub fn preservation_for(band: RarityBand) -> Preservation {
    match band {
        RarityBand::Common => Preservation {
            can_preserve: false,
            minimum_balance: 0,
            minimum_level: 0,
            minimum_success_rate: 0.0,
            minimum_tasks: 0,
        },
        RarityBand::Rare => Preservation {
            can_preserve: true,
            minimum_balance: 1000,
            minimum_level: 5,
            minimum_success_rate: 0.0,
            minimum_tasks: 0,
        },
        RarityBand::Epic => Preservation {
            can_preserve: true,
            minimum_balance: 2500,
            minimum_level: 10,
            minimum_success_rate: 95.0,
            minimum_tasks: 0,
        },
        RarityBand::Legendary => Preservation {
            can_preserve: true,
            minimum_balance: 5000,
            minimum_level: 15,
            minimum_success_rate: 98.0,
            minimum_tasks: 100,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreservationCheck {
    pub meets_requirements: bool,
    pub missing: Vec<String>,
}

/// Re-check every preservation requirement independently against the
/// agent's current state and token balance. Reports the full missing list —
/// preservation is never granted implicitly by an earlier calculation.
pub fn check_preservation(agent: &Agent, balance: u64, band: RarityBand) -> PreservationCheck {
    let req = preservation_for(band);
    let mut missing = Vec::new();

    if !req.can_preserve {
        return PreservationCheck {
            meets_requirements: false,
            missing: vec!["band has no preservation path".to_string()],
        };
    }
    if balance < req.minimum_balance {
        missing.push(format!(
            "balance too low (need {}, have {})",
            req.minimum_balance, balance
        ));
    }
    if agent.level < req.minimum_level {
        missing.push(format!("level too low (need {})", req.minimum_level));
    }
    if agent.performance.success_rate < req.minimum_success_rate {
        missing.push(format!(
            "success rate too low (need {}%)",
            req.minimum_success_rate
        ));
    }
    if agent.performance.tasks_completed < req.minimum_tasks {
        missing.push(format!("need {}+ tasks completed", req.minimum_tasks));
    }

    PreservationCheck {
        meets_requirements: missing.is_empty(),
        missing,
    }
}

// ── Scoring ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RarityResult {
    pub stage: &'static str,
    /// Composite 0–100
    pub score: f64,
    pub band: RarityBand,
    pub factors: Vec<RarityFactor>,
    pub preservation: Preservation,
}

/// Weighted composite over eight factors. Weights sum to 1.0.
pub fn calculate_rarity(agent: &Agent, stage: &EvolutionStage) -> RarityResult {
    let factors = vec![
        factor(
            "Level",
            agent.level as f64 / 20.0 * 100.0,
            0.25,
            "Agent level progression",
        ),
        factor(
            "Experience",
            agent.experience as f64 / 50_000.0 * 100.0,
            0.20,
            "Total experience points",
        ),
        factor(
            "Success Rate",
            agent.performance.success_rate,
            0.15,
            "Task success rate",
        ),
        factor(
            "Tasks Completed",
            agent.performance.tasks_completed as f64 / 1000.0 * 100.0,
            0.10,
            "Total tasks completed",
        ),
        factor(
            "Evolution Events",
            agent.history.len() as f64 * 10.0,
            0.10,
            "Number of evolution events",
        ),
        factor(
            "Token Spend",
            agent.stats.total_tokens_spent as f64 / 1000.0 * 100.0,
            0.08,
            "Total tokens spent on upgrades",
        ),
        factor(
            "Domain Expertise",
            agent.stats.domain_expertise,
            0.07,
            "Domain expertise level",
        ),
        factor(
            "Unique Interactions",
            agent.stats.unique_interactions as f64 / 100.0 * 100.0,
            0.05,
            "Unique interaction count",
        ),
    ];

    let score = factors
        .iter()
        .map(|f| f.contribution)
        .sum::<f64>()
        .clamp(0.0, 100.0);
    let band = RarityBand::from_score(score);

    RarityResult {
        stage: stage.name,
        score,
        band,
        factors,
        preservation: preservation_for(band),
    }
}

/// Sanity check on a computed result: score in range, contributions sum to
/// the score, band matches the score.
pub fn validate(result: &RarityResult) -> bool {
    if !(0.0..=100.0).contains(&result.score) {
        return false;
    }
    let total: f64 = result.factors.iter().map(|f| f.contribution).sum();
    if (total.clamp(0.0, 100.0) - result.score).abs() > 0.01 {
        return false;
    }
    RarityBand::from_score(result.score) == result.band
}

// ── Comparison ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RarityWinner {
    First,
    Second,
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RarityComparison {
    pub winner: RarityWinner,
    pub difference: f64,
    pub first: RarityResult,
    pub second: RarityResult,
}

/// Rank two agents by composite score, each under its own canonical stage.
/// Exact ties are reported explicitly rather than broken arbitrarily.
pub fn compare(first: &Agent, second: &Agent) -> RarityComparison {
    let first_result = calculate_rarity(first, crate::visual::stage_for_level(first.level));
    let second_result = calculate_rarity(second, crate::visual::stage_for_level(second.level));

    let winner = if first_result.score > second_result.score {
        RarityWinner::First
    } else if second_result.score > first_result.score {
        RarityWinner::Second
    } else {
        RarityWinner::Tie
    };

    RarityComparison {
        winner,
        difference: (first_result.score - second_result.score).abs(),
        first: first_result,
        second: second_result,
    }
}
