//! Wiring — builds the cache, monitor, pool loader and matcher in startup
//! order and shares them via `Arc`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::cache::EventCache;
use crate::catalog::CatalogSource;
use crate::classify::RuleTable;
use crate::config::EventPoolConfig;
use crate::error::Result;
use crate::matcher::{ChoiceMatcher, HealthStatus, PerformanceHealth};
use crate::metrics::{PerformanceMonitor, TargetCheck, ops};
use crate::pool::{EventPoolLoader, PoolHealth, PoolStatus};

/// Aggregated health of every component.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    /// Overall verdict.
    pub status: HealthStatus,
    /// When the check ran.
    pub timestamp: DateTime<Utc>,
    /// Pool loader health.
    pub event_pool: PoolHealth,
    /// Matcher latency health.
    pub event_matcher: PerformanceHealth,
    /// Monitor target check.
    pub performance_targets: TargetCheck,
}

/// A fully started event pool.
#[derive(Debug)]
pub struct EventSystem {
    cache: Arc<EventCache>,
    monitor: Arc<PerformanceMonitor>,
    pool: Arc<EventPoolLoader>,
    matcher: Arc<ChoiceMatcher>,
}

impl EventSystem {
    /// Load, validate and optionally warm the cache, classifying with the
    /// configured vocabulary.
    ///
    /// # Errors
    /// Any catalog or validation failure aborts startup.
    pub async fn bootstrap(source: Arc<dyn CatalogSource>, config: EventPoolConfig) -> Result<Self> {
        let rules = RuleTable::from_config(&config.classification);
        Self::bootstrap_with_rules(source, config, rules).await
    }

    /// [`Self::bootstrap`] with a caller-supplied rule table.
    ///
    /// # Errors
    /// Any catalog or validation failure aborts startup.
    pub async fn bootstrap_with_rules(
        source: Arc<dyn CatalogSource>,
        config: EventPoolConfig,
        rules: RuleTable,
    ) -> Result<Self> {
        let monitor = Arc::new(PerformanceMonitor::new(config.monitor));
        let cache = Arc::new(EventCache::new(source, rules, config.cache));

        monitor
            .measure_async(ops::CACHE_LOAD, None, cache.load())
            .await?;

        let gauge_cache = Arc::clone(&cache);
        monitor.set_memory_gauge(Arc::new(move || gauge_cache.estimated_memory_bytes()));

        let warmup = config.pool.warmup_on_startup;
        let pool = Arc::new(EventPoolLoader::new(Arc::clone(&cache), config.pool));
        pool.on_startup()?;
        if warmup {
            pool.warmup_cache()?;
        }

        let matcher = Arc::new(ChoiceMatcher::new(
            Arc::clone(&cache),
            Arc::clone(&monitor),
            config.matching,
        ));

        info!("Event system ready");
        Ok(Self {
            cache,
            monitor,
            pool,
            matcher,
        })
    }

    /// The event cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<EventCache> {
        &self.cache
    }

    /// The performance monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// The pool loader.
    #[must_use]
    pub fn pool(&self) -> &Arc<EventPoolLoader> {
        &self.pool
    }

    /// The choice matcher.
    #[must_use]
    pub fn matcher(&self) -> &Arc<ChoiceMatcher> {
        &self.matcher
    }

    /// Rebuild the cache from its source, measured as `cacheLoad`, then
    /// revalidate the pool against the new contents.
    ///
    /// # Errors
    /// Returns the source's error, in which case the previous contents keep
    /// serving. Returns `EventPoolError::Validation` if the new catalog is
    /// live but failed validation; the pool reports not ready until a later
    /// reload passes.
    pub async fn reload(&self) -> Result<()> {
        let metadata = serde_json::json!({ "reload": true });
        self.monitor
            .measure_async(ops::CACHE_LOAD, Some(metadata), self.cache.reload_cache())
            .await?;
        self.pool.on_reload()
    }

    /// Combine pool, matcher and target health.
    ///
    /// Healthy needs all three good; a pool error or critical matcher
    /// latency is critical; anything else is degraded.
    #[must_use]
    pub fn system_health(&self) -> SystemHealth {
        let event_pool = self.pool.health_check();
        let event_matcher = self.matcher.get_performance_health();
        let performance_targets = self.monitor.check_performance_targets();

        let status = if event_pool.status == PoolStatus::Ok
            && event_matcher.status == HealthStatus::Healthy
            && performance_targets.passed
        {
            HealthStatus::Healthy
        } else if event_pool.status == PoolStatus::Error
            || event_matcher.status == HealthStatus::Critical
        {
            HealthStatus::Critical
        } else {
            HealthStatus::Degraded
        };

        SystemHealth {
            status,
            timestamp: Utc::now(),
            event_pool,
            event_matcher,
            performance_targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventPoolError;
    use crate::catalog::InMemoryCatalog;
    use crate::types::{Choice, ChoiceId, Effect, Turn, TurnNumber};

    fn catalog() -> InMemoryCatalog {
        let turns = (1..=3)
            .map(|n| Turn {
                turn_id: Some(n),
                turn_number: TurnNumber(n),
                event_text: format!("Turn {n}"),
                description: String::new(),
            })
            .collect();
        let choices = (1..=6)
            .map(|id| Choice {
                choice_id: ChoiceId(id),
                turn_number: TurnNumber((id - 1) / 2 + 1),
                text: format!("Option {id}"),
                effects: Effect {
                    users: i64::from(id) * 10,
                    cash: 0,
                    trust: 1,
                    infra: vec![],
                },
                next_turn: TurnNumber((id - 1) / 2 + 2),
                category: None,
                description: None,
            })
            .collect();
        InMemoryCatalog::new(turns, choices)
    }

    #[tokio::test]
    async fn bootstrap_wires_every_component() {
        let system = EventSystem::bootstrap(Arc::new(catalog()), EventPoolConfig::default())
            .await
            .expect("bootstrap");

        assert!(system.cache().is_loaded());
        assert!(system.pool().is_ready());
        assert_eq!(system.monitor().get_raw_measurements(ops::CACHE_LOAD).len(), 1);
        // Warmup ran.
        assert!(system.cache().get_performance_metrics().total_lookups > 0);
        // Memory gauge follows the cache estimate.
        assert!(system.monitor().get_system_metrics().memory_usage_mb > 0.0);
    }

    #[tokio::test]
    async fn bootstrap_fails_on_catalog_error() {
        let source = catalog();
        source.set_failure(Some("timeout".into()));
        let err = EventSystem::bootstrap(Arc::new(source), EventPoolConfig::default())
            .await
            .expect_err("should fail");
        assert!(matches!(err, EventPoolError::Catalog(_)));
    }

    #[tokio::test]
    async fn health_degrades_with_slow_checks() {
        let system = EventSystem::bootstrap(Arc::new(catalog()), EventPoolConfig::default())
            .await
            .expect("bootstrap");
        assert_eq!(system.system_health().status, HealthStatus::Healthy);

        for _ in 0..10 {
            system.monitor().record_sample(ops::EVENT_CHECK, 1.5, None);
        }
        assert_eq!(system.system_health().status, HealthStatus::Degraded);

        for _ in 0..100 {
            system.monitor().record_sample(ops::EVENT_CHECK, 5.0, None);
        }
        assert_eq!(system.system_health().status, HealthStatus::Critical);
    }

    #[tokio::test]
    async fn reload_of_orphaned_catalog_reports_validation_failure() {
        let source = Arc::new(catalog());
        let system = EventSystem::bootstrap(source.clone(), EventPoolConfig::default())
            .await
            .expect("bootstrap");

        let turns = source.fetch_all_turns().await.expect("turns");
        let mut choices = source.fetch_all_choices().await.expect("choices");
        choices.push(Choice {
            choice_id: ChoiceId(7),
            turn_number: TurnNumber(9),
            text: "Unreachable".into(),
            effects: Effect::default(),
            next_turn: TurnNumber(10),
            category: None,
            description: None,
        });
        source.replace(turns.clone(), choices.clone());

        let err = system.reload().await.expect_err("orphan");
        assert!(matches!(err, EventPoolError::Validation { .. }));
        assert!(system.cache().get_choice(ChoiceId(7)).is_some());
        assert!(!system.pool().is_ready());
        assert_eq!(system.system_health().status, HealthStatus::Critical);

        choices.retain(|c| c.choice_id != ChoiceId(7));
        source.replace(turns, choices);
        system.reload().await.expect("reload");
        assert!(system.pool().is_ready());
    }

    #[tokio::test]
    async fn reload_is_measured() {
        let system = EventSystem::bootstrap(Arc::new(catalog()), EventPoolConfig::default())
            .await
            .expect("bootstrap");
        system.reload().await.expect("reload");
        let samples = system.monitor().get_raw_measurements(ops::CACHE_LOAD);
        assert_eq!(samples.len(), 2);
        assert!(!samples[1].is_error());
    }
}
