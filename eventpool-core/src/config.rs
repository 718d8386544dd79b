//! Configuration for the event pool.
//!
//! Maps directly to `eventpool.toml`. Every threshold and weight used by the
//! classification rules, the eligibility rules, relevance scoring and the
//! performance targets lives here rather than as literals in the engine.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPoolConfig {
    /// Event cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Choice classification vocabulary.
    #[serde(default)]
    pub classification: ClassificationConfig,
    /// Eligibility, scoring and health thresholds for the matcher.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Performance monitor buffers and targets.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Startup validation and warmup.
    #[serde(default)]
    pub pool: PoolConfig,
}

impl EventPoolConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `EventPoolError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::EventPoolError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Event cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Stop scanning a turn for infra matches after this many hits.
    #[serde(default = "default_6")]
    pub infra_scan_limit: usize,
    /// Estimated bytes per cached choice.
    #[serde(default = "default_500")]
    pub choice_entry_bytes: usize,
    /// Estimated bytes per cached turn.
    #[serde(default = "default_200")]
    pub turn_entry_bytes: usize,
    /// Estimated bytes per secondary index entry.
    #[serde(default = "default_8")]
    pub index_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            infra_scan_limit: 6,
            choice_entry_bytes: 500,
            turn_entry_bytes: 200,
            index_entry_bytes: 8,
        }
    }
}

/// A data-driven classification rule.
///
/// A choice matches when every present condition holds:
/// - cash effect `>= min_cash`, when `min_cash` is set;
/// - the effect grants infrastructure, when `requires_infra` is set;
/// - for each group in `keyword_groups`, the lowercased text contains at
///   least one of the group's terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Minimum cash effect.
    #[serde(default)]
    pub min_cash: Option<i64>,
    /// Require a non-empty infra list.
    #[serde(default)]
    pub requires_infra: bool,
    /// Keyword groups; all groups must match, any term within a group.
    #[serde(default)]
    pub keyword_groups: Vec<Vec<String>>,
}

impl KeywordRule {
    /// Rule requiring any of `terms`.
    #[must_use]
    pub fn any_of(terms: &[&str]) -> Self {
        Self {
            keyword_groups: vec![terms.iter().map(|t| (*t).to_string()).collect()],
            ..Self::default()
        }
    }

    /// Add a further keyword group that must also match.
    #[must_use]
    pub fn and_any_of(mut self, terms: &[&str]) -> Self {
        self.keyword_groups
            .push(terms.iter().map(|t| (*t).to_string()).collect());
        self
    }

    /// Require a minimum cash effect.
    #[must_use]
    pub fn with_min_cash(mut self, min_cash: i64) -> Self {
        self.min_cash = Some(min_cash);
        self
    }

    /// Rule matching any choice that grants infrastructure.
    #[must_use]
    pub fn infra_granted() -> Self {
        Self {
            requires_infra: true,
            ..Self::default()
        }
    }
}

/// Vocabulary for the four choice classifications.
///
/// Thresholds sit beside the vocabulary, so replacing a rule's keywords in
/// TOML keeps them: the investment rule falls back to
/// `investment_min_cash` when it sets no `min_cash` of its own, and the
/// infra upgrade rule always requires granted infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Minimum cash effect for an investment choice.
    #[serde(default = "default_1_000_000")]
    pub investment_min_cash: i64,
    /// Investment / fundraising choices.
    #[serde(default = "default_investment_rule")]
    pub investment: KeywordRule,
    /// Infrastructure upgrades.
    #[serde(default = "KeywordRule::infra_granted")]
    pub infra_upgrade: KeywordRule,
    /// Staff hiring: a hiring verb and a role noun.
    #[serde(default = "default_staff_hiring_rule")]
    pub staff_hiring: KeywordRule,
    /// Consulting engagements.
    #[serde(default = "default_consulting_rule")]
    pub consulting: KeywordRule,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            investment_min_cash: 1_000_000,
            investment: default_investment_rule(),
            infra_upgrade: KeywordRule::infra_granted(),
            staff_hiring: default_staff_hiring_rule(),
            consulting: default_consulting_rule(),
        }
    }
}

impl ClassificationConfig {
    /// The Korean vocabulary used by the original game catalog.
    #[must_use]
    pub fn korean() -> Self {
        Self {
            investment_min_cash: 1_000_000,
            investment: KeywordRule::any_of(&["투자", "펀딩", "시리즈", "피칭"]),
            infra_upgrade: KeywordRule::infra_granted(),
            staff_hiring: KeywordRule::any_of(&["채용", "영입"])
                .and_any_of(&["개발자", "디자이너", "기획자"]),
            consulting: KeywordRule::any_of(&["컨설팅", "솔루션 아키텍트"]),
        }
    }
}

/// Matcher eligibility, scoring and health thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Highest playable turn; states outside `[1, max_turn]` match nothing.
    #[serde(default = "default_50_u32")]
    pub max_turn: u32,
    /// Cap on valid choices returned per request.
    #[serde(default = "default_6")]
    pub max_results: usize,
    /// Eligibility rules.
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    /// Relevance score weights.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// `eventCheck` p95 above this (ms) is degraded.
    #[serde(default = "default_1_0")]
    pub degraded_p95_ms: f64,
    /// `eventCheck` p95 above this (ms) is critical.
    #[serde(default = "default_2_0")]
    pub critical_p95_ms: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_turn: 50,
            max_results: 6,
            eligibility: EligibilityConfig::default(),
            scoring: ScoringConfig::default(),
            degraded_p95_ms: 1.0,
            critical_p95_ms: 2.0,
        }
    }
}

/// Preconditions a classified choice must satisfy to be offered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityConfig {
    /// Investment choices need at least this much trust.
    #[serde(default = "default_30")]
    pub investment_min_trust: i64,
    /// Infra upgrades need at least this much cash.
    #[serde(default = "default_500_000")]
    pub infra_min_cash: i64,
    /// Staff hiring needs at least this much cash.
    #[serde(default = "default_1_000_000")]
    pub hiring_min_cash: i64,
    /// Staff hiring is unavailable before this turn.
    #[serde(default = "default_3_u32")]
    pub hiring_min_turn: u32,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            investment_min_trust: 30,
            infra_min_cash: 500_000,
            hiring_min_cash: 1_000_000,
            hiring_min_turn: 3,
        }
    }
}

/// Relevance score weights and the situations that trigger them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Starting score for every eligible choice.
    #[serde(default = "default_100_f64")]
    pub base: f64,
    /// Cash below this counts as low.
    #[serde(default = "default_5_000_000")]
    pub low_cash_threshold: i64,
    /// Cash effect above this earns the low-cash boost.
    #[serde(default = "default_1_000_000")]
    pub cash_boost_min_effect: i64,
    /// Boost for cash injections while cash is low.
    #[serde(default = "default_50_f64")]
    pub cash_boost: f64,
    /// Users/capacity above this counts as near capacity.
    #[serde(default = "default_0_7")]
    pub capacity_ratio_threshold: f64,
    /// Boost for infra grants while near capacity.
    #[serde(default = "default_40_f64")]
    pub infra_boost: f64,
    /// Trust below this counts as low.
    #[serde(default = "default_50_i64")]
    pub low_trust_threshold: i64,
    /// Boost for positive trust effects while trust is low.
    #[serde(default = "default_30_f64")]
    pub trust_boost: f64,
    /// Effect magnitude is divided by this and added as a tie-breaker.
    #[serde(default = "default_1000_f64")]
    pub magnitude_divisor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: 100.0,
            low_cash_threshold: 5_000_000,
            cash_boost_min_effect: 1_000_000,
            cash_boost: 50.0,
            capacity_ratio_threshold: 0.7,
            infra_boost: 40.0,
            low_trust_threshold: 50,
            trust_boost: 30.0,
            magnitude_divisor: 1000.0,
        }
    }
}

/// Performance monitor settings and targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Samples retained per operation tag (oldest evicted first).
    #[serde(default = "default_10_000")]
    pub max_samples_per_operation: usize,
    /// `eventCheck` p95 target in milliseconds.
    #[serde(default = "default_1_0")]
    pub event_check_p95_ms: f64,
    /// Memory target in megabytes.
    #[serde(default = "default_5_0")]
    pub memory_limit_mb: f64,
    /// Request counter window used for requests/second.
    #[serde(default = "default_60_u64")]
    pub request_window_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_samples_per_operation: 10_000,
            event_check_p95_ms: 1.0,
            memory_limit_mb: 5.0,
            request_window_secs: 60,
        }
    }
}

/// Startup validation, statistics and warmup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Turn that must exist and have choices.
    #[serde(default = "default_1_u32")]
    pub check_turn: u32,
    /// Choice id that must exist.
    #[serde(default = "default_1_u32")]
    pub check_choice_id: u32,
    /// Highest choice id scanned for orphans.
    #[serde(default = "default_300")]
    pub orphan_scan_max_id: u32,
    /// Highest turn number scanned for statistics.
    #[serde(default = "default_50_u32")]
    pub stats_max_turn: u32,
    /// Turns `1..=warmup_turns` are touched during warmup.
    #[serde(default = "default_25")]
    pub warmup_turns: u32,
    /// High-impact list length touched per warmup turn.
    #[serde(default = "default_5")]
    pub warmup_high_impact_limit: usize,
    /// Frequently accessed choice ids touched during warmup.
    #[serde(default = "default_common_choice_ids")]
    pub warmup_choice_ids: Vec<u32>,
    /// Run warmup as part of bootstrap.
    #[serde(default = "default_true")]
    pub warmup_on_startup: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            check_turn: 1,
            check_choice_id: 1,
            orphan_scan_max_id: 300,
            stats_max_turn: 50,
            warmup_turns: 25,
            warmup_high_impact_limit: 5,
            warmup_choice_ids: default_common_choice_ids(),
            warmup_on_startup: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_investment_rule() -> KeywordRule {
    KeywordRule::any_of(&["investment", "funding", "round", "series", "pitch"])
}
fn default_staff_hiring_rule() -> KeywordRule {
    KeywordRule::any_of(&["hire", "hiring", "recruit"])
        .and_any_of(&["developer", "designer", "planner"])
}
fn default_consulting_rule() -> KeywordRule {
    KeywordRule::any_of(&["consulting", "solutions architect"])
}
fn default_common_choice_ids() -> Vec<u32> { vec![1, 2, 3, 10, 20, 30, 40, 50] }
fn default_true() -> bool { true }
fn default_0_7() -> f64 { 0.7 }
fn default_1_0() -> f64 { 1.0 }
fn default_2_0() -> f64 { 2.0 }
fn default_5_0() -> f64 { 5.0 }
fn default_30_f64() -> f64 { 30.0 }
fn default_40_f64() -> f64 { 40.0 }
fn default_50_f64() -> f64 { 50.0 }
fn default_100_f64() -> f64 { 100.0 }
fn default_1000_f64() -> f64 { 1000.0 }
fn default_1_u32() -> u32 { 1 }
fn default_3_u32() -> u32 { 3 }
fn default_25() -> u32 { 25 }
fn default_50_u32() -> u32 { 50 }
fn default_300() -> u32 { 300 }
fn default_5() -> usize { 5 }
fn default_6() -> usize { 6 }
fn default_8() -> usize { 8 }
fn default_200() -> usize { 200 }
fn default_500() -> usize { 500 }
fn default_10_000() -> usize { 10_000 }
fn default_30() -> i64 { 30 }
fn default_50_i64() -> i64 { 50 }
fn default_500_000() -> i64 { 500_000 }
fn default_1_000_000() -> i64 { 1_000_000 }
fn default_5_000_000() -> i64 { 5_000_000 }
fn default_60_u64() -> u64 { 60 }
