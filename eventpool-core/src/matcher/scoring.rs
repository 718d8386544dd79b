//! Relevance scoring for eligible choices.
//!
//! Score = base + cash boost + infra boost + trust boost + magnitude / divisor
//!
//! Where each boost applies only in its situation:
//!   cash boost   cash below threshold and the choice injects enough cash
//!   infra boost  users/capacity above threshold and the choice grants infra
//!   trust boost  trust below threshold and the choice raises trust

use crate::cache::CachedChoice;
use crate::config::ScoringConfig;
use crate::matcher::ScoreBreakdown;
use crate::types::GameStateSnapshot;

/// Compute the full score breakdown for one choice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_breakdown(
    choice: &CachedChoice,
    state: &GameStateSnapshot,
    weights: &ScoringConfig,
) -> ScoreBreakdown {
    let effects = &choice.effects;

    let cash_boost = if state.cash < weights.low_cash_threshold
        && effects.cash > weights.cash_boost_min_effect
    {
        weights.cash_boost
    } else {
        0.0
    };

    let infra_boost =
        if state.capacity_ratio() > weights.capacity_ratio_threshold && effects.grants_infra() {
            weights.infra_boost
        } else {
            0.0
        };

    let trust_boost = if state.trust < weights.low_trust_threshold && effects.trust > 0 {
        weights.trust_boost
    } else {
        0.0
    };

    let magnitude = if weights.magnitude_divisor > 0.0 {
        choice.metadata.effect_magnitude as f64 / weights.magnitude_divisor
    } else {
        0.0
    };

    ScoreBreakdown {
        base: weights.base,
        cash_boost,
        infra_boost,
        trust_boost,
        magnitude,
    }
}
