//! Pool loader — startup validation, statistics, warmup and health.
//!
//! Runs after the [`EventCache`] has loaded: validates referential
//! integrity (fatal on failure), tallies per-turn and per-classification
//! statistics, then optionally pre-touches the hot lookup paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cache::{CacheMetrics, EventCache};
use crate::config::PoolConfig;
use crate::error::{EventPoolError, Result};
use crate::types::{ChoiceId, TurnNumber};

/// Shape of the loaded catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventPoolStats {
    /// Choices across scanned turns.
    pub total_choices: usize,
    /// Scanned turns that exist.
    pub total_turns: usize,
    /// Investment choices.
    pub investment_choices: usize,
    /// Infra upgrade choices.
    pub infra_upgrade_choices: usize,
    /// Staff hiring choices.
    pub staff_hiring_choices: usize,
    /// Consulting choices.
    pub consulting_choices: usize,
    /// Choices per existing turn, two decimals.
    pub avg_choices_per_turn: f64,
    /// Largest per-turn choice count.
    pub max_choices_per_turn: usize,
    /// Smallest non-zero per-turn choice count; 0 if no turn has choices.
    pub min_choices_per_turn: usize,
    /// Time spent in validation and statistics at startup.
    pub load_time_ms: u64,
}

/// Pool health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    /// Loaded with statistics.
    Ok,
    /// Not usable.
    Error,
}

/// Supporting data for a [`PoolHealth`] verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PoolHealthDetails {
    /// Why the pool is unhealthy.
    Problem {
        /// Explanation.
        message: String,
    },
    /// A ready pool's state.
    Ready {
        /// Always true here.
        is_loaded: bool,
        /// Startup statistics.
        stats: EventPoolStats,
        /// Current cache counters.
        cache_metrics: CacheMetrics,
    },
}

/// Pool health.
#[derive(Debug, Clone, Serialize)]
pub struct PoolHealth {
    /// Verdict.
    pub status: PoolStatus,
    /// Supporting data.
    pub details: PoolHealthDetails,
}

/// Startup orchestration and health surface over the [`EventCache`].
#[derive(Debug)]
pub struct EventPoolLoader {
    cache: Arc<EventCache>,
    config: PoolConfig,
    ready: AtomicBool,
    stats: RwLock<Option<EventPoolStats>>,
}

impl EventPoolLoader {
    /// Create a loader over `cache`. Not ready until [`Self::on_startup`].
    #[must_use]
    pub fn new(cache: Arc<EventCache>, config: PoolConfig) -> Self {
        Self {
            cache,
            config,
            ready: AtomicBool::new(false),
            stats: RwLock::new(None),
        }
    }

    /// Validate, compute statistics and mark ready.
    ///
    /// # Errors
    /// Returns `EventPoolError::Validation` if the catalog fails validation;
    /// the loader stays not ready.
    pub fn on_startup(&self) -> Result<()> {
        let start = Instant::now();
        info!("Loading event pool");

        if let Err(e) = self.validate() {
            error!(error = %e, "Failed to load event pool");
            return Err(e);
        }
        let mut stats = self.compute_statistics();
        stats.load_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            elapsed_ms = stats.load_time_ms,
            choices = stats.total_choices,
            turns = stats.total_turns,
            "Event pool loaded"
        );
        *self.stats.write() = Some(stats);
        self.ready.store(true, Ordering::Release);

        self.log_detailed_stats();
        Ok(())
    }

    /// Revalidate after the cache swapped in a new catalog.
    ///
    /// On success the statistics are recomputed and the loader is ready. On
    /// failure the loader drops to not ready until a later catalog passes.
    ///
    /// # Errors
    /// Returns `EventPoolError::Validation` if the new catalog fails
    /// validation.
    pub fn on_reload(&self) -> Result<()> {
        let start = Instant::now();
        if let Err(e) = self.validate() {
            self.ready.store(false, Ordering::Release);
            warn!(error = %e, "Reloaded catalog failed validation");
            return Err(e);
        }
        let mut stats = self.compute_statistics();
        stats.load_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            choices = stats.total_choices,
            turns = stats.total_turns,
            "Event pool revalidated"
        );
        *self.stats.write() = Some(stats);
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Check the sanity turn and choice and scan for orphaned choices.
    ///
    /// # Errors
    /// Returns `EventPoolError::Validation` carrying every failed check.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let check_turn = TurnNumber(self.config.check_turn);

        if self.cache.get_choices_for_turn(check_turn).is_empty() {
            errors.push(format!("No choices found for turn {check_turn}"));
        }
        if self.cache.get_turn(check_turn).is_none() {
            errors.push(format!("Turn {check_turn} information not found"));
        }
        if self.cache.get_choice(ChoiceId(self.config.check_choice_id)).is_none() {
            errors.push(format!(
                "Choice ID {} not found in cache",
                self.config.check_choice_id
            ));
        }

        let mut orphaned = 0usize;
        for id in 1..=self.config.orphan_scan_max_id {
            let Some(choice) = self.cache.get_choice(ChoiceId(id)) else {
                continue;
            };
            if self.cache.get_turn(choice.turn_number).is_none() {
                orphaned += 1;
                warn!(
                    choice_id = id,
                    turn_number = choice.turn_number.0,
                    "Orphaned choice detected"
                );
            }
        }
        if orphaned > 0 {
            errors.push(format!("Found {orphaned} orphaned choices"));
        }

        if errors.is_empty() {
            info!("Event pool validation passed");
            Ok(())
        } else {
            Err(EventPoolError::Validation { errors })
        }
    }

    /// Tally turns `1..=stats_max_turn`. `load_time_ms` is left at 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute_statistics(&self) -> EventPoolStats {
        let mut stats = EventPoolStats::default();
        let mut min_choices: Option<usize> = None;
        let mut choices_across_turns = 0usize;

        for n in 1..=self.config.stats_max_turn {
            let turn = TurnNumber(n);
            if self.cache.get_turn(turn).is_none() {
                continue;
            }
            stats.total_turns += 1;

            let choices = self.cache.get_choices_for_turn(turn);
            let count = choices.len();
            if count > 0 {
                choices_across_turns += count;
                stats.max_choices_per_turn = stats.max_choices_per_turn.max(count);
                min_choices = Some(min_choices.map_or(count, |m| m.min(count)));
            }

            for choice in choices.iter() {
                stats.total_choices += 1;
                let meta = &choice.metadata;
                stats.investment_choices += usize::from(meta.is_investment);
                stats.infra_upgrade_choices += usize::from(meta.is_infra_upgrade);
                stats.staff_hiring_choices += usize::from(meta.is_staff_hiring);
                stats.consulting_choices += usize::from(meta.is_consulting);
            }
        }

        stats.min_choices_per_turn = min_choices.unwrap_or(0);
        stats.avg_choices_per_turn = if stats.total_turns > 0 {
            (choices_across_turns as f64 / stats.total_turns as f64 * 100.0).round() / 100.0
        } else {
            0.0
        };
        stats
    }

    /// Whether startup completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Statistics from the last successful startup.
    #[must_use]
    pub fn get_statistics(&self) -> Option<EventPoolStats> {
        self.stats.read().clone()
    }

    /// Emit the statistics with a per-classification breakdown at `info`.
    pub fn log_detailed_stats(&self) {
        let Some(stats) = self.get_statistics() else {
            return;
        };
        let pct = |part: usize| percentage(part, stats.total_choices);

        info!(
            total_choices = stats.total_choices,
            total_turns = stats.total_turns,
            avg_choices_per_turn = stats.avg_choices_per_turn,
            max_choices_per_turn = stats.max_choices_per_turn,
            min_choices_per_turn = stats.min_choices_per_turn,
            "Event pool statistics"
        );
        info!(
            investment = stats.investment_choices,
            investment_pct = %pct(stats.investment_choices),
            infra_upgrades = stats.infra_upgrade_choices,
            infra_upgrades_pct = %pct(stats.infra_upgrade_choices),
            staff_hiring = stats.staff_hiring_choices,
            staff_hiring_pct = %pct(stats.staff_hiring_choices),
            consulting = stats.consulting_choices,
            consulting_pct = %pct(stats.consulting_choices),
            "Choice type breakdown"
        );
    }

    /// Touch the hot lookup paths: the first `warmup_turns` turns and the
    /// configured common choice ids.
    ///
    /// # Errors
    /// Returns `EventPoolError::NotReady` before a successful startup.
    pub fn warmup_cache(&self) -> Result<()> {
        if !self.is_ready() {
            return Err(EventPoolError::NotReady);
        }

        let start = Instant::now();
        info!("Warming up cache with common access patterns");

        for n in 1..=self.config.warmup_turns {
            let turn = TurnNumber(n);
            let _ = self.cache.get_turn(turn);
            let _ = self.cache.get_choices_for_turn(turn);
            let _ = self
                .cache
                .get_high_impact_choices(turn, self.config.warmup_high_impact_limit);
        }
        for id in &self.config.warmup_choice_ids {
            let _ = self.cache.get_choice(ChoiceId(*id));
        }

        info!(
            elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
            "Cache warmup completed"
        );
        Ok(())
    }

    /// Readiness, statistics and cache metrics in one status.
    #[must_use]
    pub fn health_check(&self) -> PoolHealth {
        let problem = |message: &str| PoolHealth {
            status: PoolStatus::Error,
            details: PoolHealthDetails::Problem {
                message: message.to_string(),
            },
        };

        if !self.is_ready() {
            return problem("Event pool not loaded");
        }
        let Some(stats) = self.get_statistics() else {
            return problem("Event pool statistics not computed");
        };

        PoolHealth {
            status: PoolStatus::Ok,
            details: PoolHealthDetails::Ready {
                is_loaded: true,
                stats,
                cache_metrics: self.cache.get_performance_metrics(),
            },
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, total: usize) -> String {
    if total == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", part as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::types::{Choice, Effect, Turn};

    fn choice(id: u32, turn: u32, text: &str, cash: i64) -> Choice {
        Choice {
            choice_id: ChoiceId(id),
            turn_number: TurnNumber(turn),
            text: text.to_string(),
            effects: Effect {
                users: 0,
                cash,
                trust: 0,
                infra: vec![],
            },
            next_turn: TurnNumber(turn + 1),
            category: None,
            description: None,
        }
    }

    fn turn(n: u32) -> Turn {
        Turn {
            turn_id: Some(n),
            turn_number: TurnNumber(n),
            event_text: format!("Turn {n}"),
            description: String::new(),
        }
    }

    fn loader(turns: Vec<Turn>, choices: Vec<Choice>) -> (EventPoolLoader, Arc<EventCache>) {
        let cache = Arc::new(EventCache::with_defaults(Arc::new(InMemoryCatalog::default())));
        cache.load_records(turns, choices);
        (EventPoolLoader::new(Arc::clone(&cache), PoolConfig::default()), cache)
    }

    fn healthy_catalog() -> (Vec<Turn>, Vec<Choice>) {
        (
            vec![turn(1), turn(2), turn(3)],
            vec![
                choice(1, 1, "Series A funding", 3_000_000),
                choice(2, 1, "Hire designer", -1_000_000),
                choice(3, 1, "Do nothing", 0),
                choice(4, 2, "Consulting retainer", -200_000),
            ],
        )
    }

    #[test]
    fn startup_marks_ready_and_computes_stats() {
        let (turns, choices) = healthy_catalog();
        let (loader, _) = loader(turns, choices);
        assert!(!loader.is_ready());
        assert!(loader.get_statistics().is_none());

        loader.on_startup().expect("startup");
        assert!(loader.is_ready());

        let stats = loader.get_statistics().expect("stats");
        assert_eq!(stats.total_turns, 3);
        assert_eq!(stats.total_choices, 4);
        assert_eq!(stats.investment_choices, 1);
        assert_eq!(stats.staff_hiring_choices, 1);
        assert_eq!(stats.consulting_choices, 1);
        assert_eq!(stats.infra_upgrade_choices, 0);
        assert_eq!(stats.max_choices_per_turn, 3);
        assert_eq!(stats.min_choices_per_turn, 1);
        // 4 choices over 3 existing turns.
        assert!((stats.avg_choices_per_turn - 1.33).abs() < 1e-9);
    }

    #[test]
    fn orphaned_choice_fails_validation() {
        let (turns, mut choices) = healthy_catalog();
        choices.push(choice(150, 99, "Lost in time", 0));
        let (loader, _) = loader(turns, choices);

        let err = loader.on_startup().expect_err("orphan");
        match err {
            EventPoolError::Validation { errors } => {
                assert_eq!(errors, vec!["Found 1 orphaned choices".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!loader.is_ready());
    }

    #[test]
    fn reload_revalidates_and_refreshes_stats() {
        let (turns, choices) = healthy_catalog();
        let (loader, cache) = loader(turns.clone(), choices.clone());
        loader.on_startup().expect("startup");

        let mut orphaned = choices.clone();
        orphaned.push(choice(42, 7, "Dangling", 0));
        cache.load_records(turns.clone(), orphaned);
        let err = loader.on_reload().expect_err("orphan");
        assert!(matches!(err, EventPoolError::Validation { .. }));
        assert!(!loader.is_ready());
        assert_eq!(loader.health_check().status, PoolStatus::Error);

        let mut grown = choices;
        grown.push(choice(5, 2, "Hire engineer", -500_000));
        cache.load_records(turns, grown);
        loader.on_reload().expect("revalidate");
        assert!(loader.is_ready());
        assert_eq!(loader.get_statistics().expect("stats").total_choices, 5);
    }

    #[test]
    fn empty_catalog_collects_every_failed_check() {
        let (loader, _) = loader(vec![], vec![]);
        let err = loader.validate().expect_err("empty");
        let message = err.to_string();
        assert!(message.starts_with("Event pool validation failed:\n"));
        assert!(message.contains("No choices found for turn 1"));
        assert!(message.contains("Turn 1 information not found"));
        assert!(message.contains("Choice ID 1 not found in cache"));
    }

    #[test]
    fn statistics_with_no_choices() {
        let (loader, _) = loader(vec![turn(1), turn(2)], vec![]);
        let stats = loader.compute_statistics();
        assert_eq!(stats.total_turns, 2);
        assert_eq!(stats.min_choices_per_turn, 0);
        assert_eq!(stats.max_choices_per_turn, 0);
        assert!(stats.avg_choices_per_turn.abs() < f64::EPSILON);
    }

    #[test]
    fn warmup_requires_startup() {
        let (turns, choices) = healthy_catalog();
        let (loader, cache) = loader(turns, choices);
        assert!(matches!(loader.warmup_cache(), Err(EventPoolError::NotReady)));

        loader.on_startup().expect("startup");
        let before = cache.get_performance_metrics().total_lookups;
        loader.warmup_cache().expect("warmup");
        // 25 turns x (turn + choices + high impact) + 8 common ids
        assert_eq!(cache.get_performance_metrics().total_lookups - before, 25 * 3 + 8);
    }

    #[test]
    fn health_reflects_readiness() {
        let (turns, choices) = healthy_catalog();
        let (loader, _) = loader(turns, choices);

        let health = loader.health_check();
        assert_eq!(health.status, PoolStatus::Error);
        assert!(matches!(health.details, PoolHealthDetails::Problem { ref message } if message == "Event pool not loaded"));

        loader.on_startup().expect("startup");
        let health = loader.health_check();
        assert_eq!(health.status, PoolStatus::Ok);
        match health.details {
            PoolHealthDetails::Ready { is_loaded, stats, cache_metrics } => {
                assert!(is_loaded);
                assert_eq!(stats.total_choices, 4);
                assert_eq!(cache_metrics.cached_choices, 4);
            }
            PoolHealthDetails::Problem { message } => panic!("unexpected problem: {message}"),
        }
    }

    #[test]
    fn percentage_formatting() {
        assert_eq!(percentage(1, 3), "33.33");
        assert_eq!(percentage(0, 0), "0.00");
    }
}
