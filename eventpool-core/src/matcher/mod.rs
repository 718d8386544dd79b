//! Choice Matcher — turns a game state into a ranked, bounded choice list.
//!
//! Flow for [`ChoiceMatcher::get_valid_choices`]:
//!   1. Reject turns outside `[1, max_turn]` (empty result)
//!   2. Fetch the turn's choices from the cache (pre-sorted by magnitude)
//!   3. Skip ineligible choices (first failing rule decides)
//!   4. Score survivors, stop at `max_results`
//!   5. Sort by score, descending
//!
//! Every public operation is timed by the [`PerformanceMonitor`] under its
//! own tag from [`ops`].

pub mod eligibility;
pub mod scoring;

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::Serialize;
use serde_json::json;

use crate::cache::{CachedChoice, EventCache};
use crate::config::MatchingConfig;
use crate::metrics::{PerformanceMonitor, SystemMetrics, ops};
use crate::types::{ChoiceId, Effect, GameStateSnapshot, TurnNumber};

pub use eligibility::{Ineligible, check_eligibility, is_eligible};

/// Breakdown of a relevance score into its components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Base score.
    pub base: f64,
    /// Low-cash boost.
    pub cash_boost: f64,
    /// Near-capacity infra boost.
    pub infra_boost: f64,
    /// Low-trust boost.
    pub trust_boost: f64,
    /// Effect magnitude tie-breaker.
    pub magnitude: f64,
}

impl ScoreBreakdown {
    /// Sum of all components.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.base + self.cash_boost + self.infra_boost + self.trust_boost + self.magnitude
    }
}

/// A choice offered to the caller, with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedEvent {
    /// Choice id.
    pub choice_id: ChoiceId,
    /// Player-facing text.
    pub text: String,
    /// Resource effects.
    pub effects: Effect,
    /// Turn reached after taking the choice.
    pub next_turn: TurnNumber,
    /// Ranking score.
    pub score: f64,
    /// Relevance components, for state-based matches.
    pub breakdown: Option<ScoreBreakdown>,
    /// Why the choice was selected, when there is a fixed reason.
    pub reason: Option<String>,
}

impl MatchedEvent {
    #[allow(clippy::cast_precision_loss)]
    fn by_magnitude(choice: &CachedChoice, reason: Option<&str>) -> Self {
        Self {
            choice_id: choice.choice_id,
            text: choice.text.clone(),
            effects: choice.effects.clone(),
            next_turn: choice.next_turn,
            score: choice.metadata.effect_magnitude as f64,
            breakdown: None,
            reason: reason.map(str::to_string),
        }
    }

    fn scored(choice: &CachedChoice, breakdown: ScoreBreakdown) -> Self {
        Self {
            choice_id: choice.choice_id,
            text: choice.text.clone(),
            effects: choice.effects.clone(),
            next_turn: choice.next_turn,
            score: breakdown.total(),
            breakdown: Some(breakdown),
            reason: None,
        }
    }
}

/// Classification and magnitude filters for [`ChoiceMatcher::match_events`].
///
/// An `include_*` flag set to `Some(false)` excludes choices with that
/// classification; `None` or `Some(true)` leaves them in.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchFilters {
    /// Investment choices.
    pub include_investment: Option<bool>,
    /// Infra upgrades.
    pub include_infra_upgrade: Option<bool>,
    /// Staff hiring.
    pub include_staff_hiring: Option<bool>,
    /// Consulting.
    pub include_consulting: Option<bool>,
    /// Lower bound on effect magnitude.
    pub min_effect_magnitude: Option<u64>,
}

impl MatchFilters {
    fn admits(&self, choice: &CachedChoice) -> bool {
        let meta = &choice.metadata;
        let excluded = |flag: Option<bool>, classified: bool| flag == Some(false) && classified;

        if excluded(self.include_investment, meta.is_investment)
            || excluded(self.include_infra_upgrade, meta.is_infra_upgrade)
            || excluded(self.include_staff_hiring, meta.is_staff_hiring)
            || excluded(self.include_consulting, meta.is_consulting)
        {
            return false;
        }
        self.min_effect_magnitude
            .is_none_or(|min| meta.effect_magnitude >= min)
    }
}

/// Query for [`ChoiceMatcher::match_events`].
#[derive(Debug, Clone, Serialize)]
pub struct MatchCriteria {
    /// Turn to search.
    pub turn_number: TurnNumber,
    /// Optional filters.
    pub filters: Option<MatchFilters>,
}

/// Latency health band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Within target.
    Healthy,
    /// Above target, within the critical bound.
    Degraded,
    /// Above the critical bound.
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Supporting data for a [`PerformanceHealth`] verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum HealthDetails {
    /// No `eventCheck` samples recorded yet.
    NoMeasurements {
        /// Explanation.
        message: String,
    },
    /// Latency figures behind the verdict.
    Measured {
        /// Current `eventCheck` p95 in milliseconds.
        event_check_p95_ms: f64,
        /// Whether every monitor target passed.
        target_met: bool,
        /// Missed targets.
        violations: Vec<String>,
        /// Process-level counters.
        system_metrics: SystemMetrics,
    },
}

/// Matcher latency health.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceHealth {
    /// Health band.
    pub status: HealthStatus,
    /// Supporting data.
    pub details: HealthDetails,
}

// ---------------------------------------------------------------------------
// Choice Matcher
// ---------------------------------------------------------------------------

/// Eligibility-gated, scored choice selection over the [`EventCache`].
#[derive(Debug)]
pub struct ChoiceMatcher {
    cache: Arc<EventCache>,
    monitor: Arc<PerformanceMonitor>,
    config: MatchingConfig,
}

impl ChoiceMatcher {
    /// Create a matcher over a loaded cache.
    #[must_use]
    pub fn new(cache: Arc<EventCache>, monitor: Arc<PerformanceMonitor>, config: MatchingConfig) -> Self {
        Self {
            cache,
            monitor,
            config,
        }
    }

    /// The matcher configuration.
    #[must_use]
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Eligible choices for `state`, best first, at most `max_results`.
    ///
    /// Measured as `eventCheck`.
    #[must_use]
    pub fn get_valid_choices(&self, state: &GameStateSnapshot) -> Vec<MatchedEvent> {
        self.monitor.measure(
            ops::EVENT_CHECK,
            Some(json!({ "turnNumber": state.current_turn.0, "users": state.users })),
            || self.valid_choices(state),
        )
    }

    fn valid_choices(&self, state: &GameStateSnapshot) -> Vec<MatchedEvent> {
        if !(1..=self.config.max_turn).contains(&state.current_turn.0) {
            return Vec::new();
        }

        let choices = self.cache.get_choices_for_turn(state.current_turn);
        if choices.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.config.max_results.min(choices.len()));
        for choice in choices.iter() {
            if !is_eligible(choice, state, &self.config.eligibility) {
                continue;
            }
            let breakdown = scoring::compute_breakdown(choice, state, &self.config.scoring);
            results.push(MatchedEvent::scored(choice, breakdown));
            if results.len() >= self.config.max_results {
                break;
            }
        }

        results.sort_by_key(|e| Reverse(OrderedFloat(e.score)));
        results
    }

    /// Choices of a turn passing `criteria`'s filters, in magnitude order.
    ///
    /// Not eligibility-gated and not capped. Measured as `eventMatch`.
    #[must_use]
    pub fn match_events(&self, criteria: &MatchCriteria) -> Vec<MatchedEvent> {
        self.monitor.measure(
            ops::EVENT_MATCH,
            Some(json!({ "turnNumber": criteria.turn_number.0 })),
            || {
                self.cache
                    .get_choices_for_turn(criteria.turn_number)
                    .iter()
                    .filter(|choice| {
                        criteria
                            .filters
                            .as_ref()
                            .is_none_or(|filters| filters.admits(choice))
                    })
                    .map(|choice| MatchedEvent::by_magnitude(choice, None))
                    .collect()
            },
        )
    }

    /// The `limit` highest-impact choices of a turn.
    ///
    /// Measured as `highPriorityEvents`.
    #[must_use]
    pub fn get_high_priority_events(&self, turn: TurnNumber, limit: usize) -> Vec<MatchedEvent> {
        self.monitor.measure(
            ops::HIGH_PRIORITY_EVENTS,
            Some(json!({ "turnNumber": turn.0, "limit": limit })),
            || {
                self.cache
                    .get_high_impact_choices(turn, limit)
                    .iter()
                    .map(|choice| MatchedEvent::by_magnitude(choice, Some("High impact")))
                    .collect()
            },
        )
    }

    /// Whether choice `id` belongs to the current turn and is eligible.
    ///
    /// Measured as `choiceValidation`.
    #[must_use]
    pub fn is_choice_valid(&self, id: ChoiceId, state: &GameStateSnapshot) -> bool {
        self.monitor.measure(
            ops::CHOICE_VALIDATION,
            Some(json!({ "choiceId": id.0, "turnNumber": state.current_turn.0 })),
            || self.choice_valid(id, state),
        )
    }

    fn choice_valid(&self, id: ChoiceId, state: &GameStateSnapshot) -> bool {
        match self.cache.get_choice(id) {
            Some(choice) if choice.turn_number == state.current_turn => {
                is_eligible(&choice, state, &self.config.eligibility)
            }
            _ => false,
        }
    }

    /// [`Self::is_choice_valid`] for each id, in one measured pass.
    ///
    /// Measured as `batchValidation`.
    #[must_use]
    pub fn validate_choices(&self, ids: &[ChoiceId], state: &GameStateSnapshot) -> BTreeMap<ChoiceId, bool> {
        self.monitor.measure(
            ops::BATCH_VALIDATION,
            Some(json!({ "choiceCount": ids.len() })),
            || ids.iter().map(|id| (*id, self.choice_valid(*id, state))).collect(),
        )
    }

    /// The top `count` valid choices.
    ///
    /// Measured once, as `recommendedChoices`.
    #[must_use]
    pub fn get_recommended_choices(&self, state: &GameStateSnapshot, count: usize) -> Vec<MatchedEvent> {
        self.monitor.measure(
            ops::RECOMMENDED_CHOICES,
            Some(json!({ "turnNumber": state.current_turn.0, "count": count })),
            || {
                let mut choices = self.valid_choices(state);
                choices.truncate(count);
                choices
            },
        )
    }

    /// Classify the current `eventCheck` p95 into a health band.
    #[must_use]
    pub fn get_performance_health(&self) -> PerformanceHealth {
        let Some(stats) = self.monitor.get_stats(ops::EVENT_CHECK) else {
            return PerformanceHealth {
                status: HealthStatus::Healthy,
                details: HealthDetails::NoMeasurements {
                    message: "No measurements yet".to_string(),
                },
            };
        };

        let status = if stats.p95_ms > self.config.critical_p95_ms {
            HealthStatus::Critical
        } else if stats.p95_ms > self.config.degraded_p95_ms {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let targets = self.monitor.check_performance_targets();
        PerformanceHealth {
            status,
            details: HealthDetails::Measured {
                event_check_p95_ms: stats.p95_ms,
                target_met: targets.passed,
                violations: targets.violations,
                system_metrics: self.monitor.get_system_metrics(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
