//! Event cache — O(1) turn/choice lookups over an immutable snapshot.
//!
//! The catalog is read once, classified by the [`RuleTable`] and indexed into
//! a [`CacheSnapshot`]. Readers clone the current `Arc<CacheSnapshot>` under a
//! short read lock; `load` / `reload` build a complete new snapshot off to the
//! side and swap it in, so a reader never sees a half-built cache.
//!
//! Lookup counters are atomics owned by the snapshot and are updated on
//! every `get_*` call from any thread. A lookup is counted against the
//! snapshot it was served from, so a swap restarts the counts at zero.
//! Per-turn lists are shared slices; handing one out is a reference-count
//! bump.

mod snapshot;

pub use snapshot::{CacheSnapshot, CachedChoice, CachedTurn, ChoiceList, ChoiceMetadata};

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::CatalogSource;
use crate::classify::{Classification, RuleTable};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::types::{Choice, ChoiceId, Turn, TurnNumber};

/// Cache counters and size at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct CacheMetrics {
    /// `get_*` calls since the last load/clear.
    pub total_lookups: u64,
    /// Lookups that found an entry.
    pub cache_hits: u64,
    /// Lookups that found nothing.
    pub cache_misses: u64,
    /// `hits / lookups` as a percentage, two decimals; 0 with no lookups.
    pub hit_rate: f64,
    /// Choices cached.
    pub cached_choices: usize,
    /// Turns cached.
    pub cached_turns: usize,
    /// Estimated footprint in bytes.
    pub estimated_memory_bytes: usize,
    /// Estimated footprint in megabytes, two decimals.
    pub estimated_memory_mb: f64,
}

impl CacheMetrics {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP eventpool_cache_lookups_total Cache lookups\n\
             # TYPE eventpool_cache_lookups_total counter\n\
             eventpool_cache_lookups_total {}\n\
             # HELP eventpool_cache_hits_total Cache lookups that found an entry\n\
             # TYPE eventpool_cache_hits_total counter\n\
             eventpool_cache_hits_total {}\n\
             # HELP eventpool_cache_misses_total Cache lookups that found nothing\n\
             # TYPE eventpool_cache_misses_total counter\n\
             eventpool_cache_misses_total {}\n\
             # HELP eventpool_cache_choices Cached choices\n\
             # TYPE eventpool_cache_choices gauge\n\
             eventpool_cache_choices {}\n\
             # HELP eventpool_cache_turns Cached turns\n\
             # TYPE eventpool_cache_turns gauge\n\
             eventpool_cache_turns {}\n\
             # HELP eventpool_cache_memory_bytes Estimated cache footprint\n\
             # TYPE eventpool_cache_memory_bytes gauge\n\
             eventpool_cache_memory_bytes {}\n",
            self.total_lookups,
            self.cache_hits,
            self.cache_misses,
            self.cached_choices,
            self.cached_turns,
            self.estimated_memory_bytes,
        )
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Event Cache
// ---------------------------------------------------------------------------

/// In-memory index of the turn/choice catalog.
pub struct EventCache {
    source: Arc<dyn CatalogSource>,
    rules: RuleTable,
    config: CacheConfig,
    snapshot: RwLock<Arc<CacheSnapshot>>,
}

impl std::fmt::Debug for EventCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("EventCache")
            .field("rules", &self.rules)
            .field("choices", &snapshot.choice_count())
            .field("turns", &snapshot.turn_count())
            .finish_non_exhaustive()
    }
}

impl EventCache {
    /// Create an empty cache over `source`. Nothing is fetched until
    /// [`Self::load`].
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>, rules: RuleTable, config: CacheConfig) -> Self {
        Self {
            source,
            rules,
            config,
            snapshot: RwLock::new(Arc::new(CacheSnapshot::default())),
        }
    }

    /// Create an empty cache with the default vocabulary and cost constants.
    #[must_use]
    pub fn with_defaults(source: Arc<dyn CatalogSource>) -> Self {
        Self::new(source, RuleTable::default(), CacheConfig::default())
    }

    /// The cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The current snapshot. Reads through it do not touch the counters.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Whether a catalog has been loaded and not since cleared.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.snapshot().loaded_at().is_some()
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Fetch every choice, then every turn, and swap in the new index.
    ///
    /// # Errors
    /// Returns the source's error; the live snapshot is left untouched.
    pub async fn load(&self) -> Result<()> {
        let start = Instant::now();
        info!("Initializing event cache");

        let choices = self.source.fetch_all_choices().await?;
        let turns = self.source.fetch_all_turns().await?;
        self.load_records(turns, choices);

        let snapshot = self.snapshot();
        info!(
            choices = snapshot.choice_count(),
            turns = snapshot.turn_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            estimated_memory_mb = self.estimated_memory_mb(&snapshot),
            "Event cache initialized"
        );
        Ok(())
    }

    /// Index records already in memory and swap them in.
    ///
    /// Lookup counters restart from zero.
    pub fn load_records(&self, turns: Vec<Turn>, choices: Vec<Choice>) {
        let start = Instant::now();
        let fresh = Arc::new(CacheSnapshot::build(turns, choices, &self.rules));
        *self.snapshot.write() = fresh;
        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            "Cache snapshot swapped"
        );
    }

    /// Drop every entry and reset the counters.
    pub fn clear_cache(&self) {
        *self.snapshot.write() = Arc::new(CacheSnapshot::default());
        info!("Cache cleared");
    }

    /// Rebuild from the source.
    ///
    /// The old snapshot keeps serving reads until the new one is complete.
    ///
    /// # Errors
    /// Returns the source's error; the live snapshot and counters are kept.
    pub async fn reload_cache(&self) -> Result<()> {
        info!("Reloading event cache");
        self.load().await
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Choice by id.
    #[must_use]
    pub fn get_choice(&self, id: ChoiceId) -> Option<Arc<CachedChoice>> {
        let snapshot = self.snapshot.read();
        let found = snapshot.choice(id).cloned();
        snapshot.counters.record(found.is_some());
        found
    }

    /// A turn's choices, highest effect magnitude first. Empty if the turn
    /// has no choices.
    ///
    /// The list is shared with the snapshot; repeated calls return the same
    /// allocation until the next load.
    #[must_use]
    pub fn get_choices_for_turn(&self, turn: TurnNumber) -> ChoiceList {
        let snapshot = self.snapshot.read();
        let found = snapshot.choices_by_turn.get(&turn).cloned();
        snapshot.counters.record(found.is_some());
        found.unwrap_or_else(|| ChoiceList::from(Vec::new()))
    }

    /// Turn by number.
    #[must_use]
    pub fn get_turn(&self, turn: TurnNumber) -> Option<Arc<CachedTurn>> {
        let snapshot = self.snapshot.read();
        let found = snapshot.turn(turn).cloned();
        snapshot.counters.record(found.is_some());
        found
    }

    /// Whether `id` is classified as investment.
    #[must_use]
    pub fn is_investment_choice(&self, id: ChoiceId) -> bool {
        self.in_index(Classification::Investment, id)
    }

    /// Whether `id` grants infrastructure.
    #[must_use]
    pub fn has_infra_upgrade(&self, id: ChoiceId) -> bool {
        self.in_index(Classification::InfraUpgrade, id)
    }

    /// Whether `id` is classified as staff hiring.
    #[must_use]
    pub fn is_staff_hiring_choice(&self, id: ChoiceId) -> bool {
        self.in_index(Classification::StaffHiring, id)
    }

    /// Whether `id` is classified as consulting.
    #[must_use]
    pub fn is_consulting_choice(&self, id: ChoiceId) -> bool {
        self.in_index(Classification::Consulting, id)
    }

    fn in_index(&self, class: Classification, id: ChoiceId) -> bool {
        self.snapshot.read().index(class).contains(&id)
    }

    /// A turn's choices that grant `infra_tag`, in ranked order.
    ///
    /// The scan stops once `infra_scan_limit` matches are collected.
    #[must_use]
    pub fn get_choices_requiring_infra(
        &self,
        turn: TurnNumber,
        infra_tag: &str,
    ) -> Vec<Arc<CachedChoice>> {
        let limit = self.config.infra_scan_limit;
        let mut results = Vec::new();
        for choice in self.get_choices_for_turn(turn).iter() {
            if results.len() >= limit {
                break;
            }
            if choice.metadata.infra_tags.contains(infra_tag) {
                results.push(Arc::clone(choice));
            }
        }
        results
    }

    /// The first `limit` choices of a turn's ranked list.
    #[must_use]
    pub fn get_high_impact_choices(&self, turn: TurnNumber, limit: usize) -> Vec<Arc<CachedChoice>> {
        self.get_choices_for_turn(turn)
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// Estimated footprint of the current snapshot in bytes.
    #[must_use]
    pub fn estimated_memory_bytes(&self) -> usize {
        self.snapshot().estimated_memory_bytes(&self.config)
    }

    #[allow(clippy::cast_precision_loss)]
    fn estimated_memory_mb(&self, snapshot: &CacheSnapshot) -> f64 {
        round2(snapshot.estimated_memory_bytes(&self.config) as f64 / 1024.0 / 1024.0)
    }

    /// Lookup counters, hit rate, sizes and estimated footprint.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get_performance_metrics(&self) -> CacheMetrics {
        let snapshot = self.snapshot();
        let counters = &snapshot.counters;
        let total_lookups = counters.total_lookups.load(Ordering::Relaxed);
        let cache_hits = counters.cache_hits.load(Ordering::Relaxed);
        let cache_misses = counters.cache_misses.load(Ordering::Relaxed);
        let hit_rate = if total_lookups > 0 {
            round2(cache_hits as f64 / total_lookups as f64 * 100.0)
        } else {
            0.0
        };

        CacheMetrics {
            total_lookups,
            cache_hits,
            cache_misses,
            hit_rate,
            cached_choices: snapshot.choice_count(),
            cached_turns: snapshot.turn_count(),
            estimated_memory_bytes: snapshot.estimated_memory_bytes(&self.config),
            estimated_memory_mb: self.estimated_memory_mb(&snapshot),
        }
    }

    /// Emit the current metrics at `info`.
    pub fn log_performance_metrics(&self) {
        let metrics = self.get_performance_metrics();
        info!(
            hit_rate = %format!("{:.2}%", metrics.hit_rate),
            lookups = metrics.total_lookups,
            memory_mb = %format!("{:.2}", metrics.estimated_memory_mb),
            "Cache performance"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
