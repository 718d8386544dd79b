//! # Event Pool Core Library
//!
//! Game-agnostic event cache and choice matching for turn-based
//! simulations.
//!
//! The whole turn/choice catalog is loaded into memory once at startup,
//! classified and indexed, and then served with O(1) lookups:
//!
//! - **Event Cache** — choices by id, choices by turn (ranked by effect
//!   magnitude), turns by number, classification indexes
//! - **Choice Matcher** — eligibility-gated, scored choice lists for a game
//!   state
//! - **Performance Monitor** — per-operation latency percentiles and
//!   system counters
//! - **Pool Loader** — startup validation, statistics, warmup and health
//!
//! ## Performance Contract
//!
//! - Valid-choice check (`eventCheck`): < 1ms p95
//! - Cache footprint for a 50-turn catalog: < 5MB
//! - Lookups: O(1); per-turn scans bounded by the turn's choice count

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod pool;
pub mod system;
pub mod types;

pub use cache::{CacheMetrics, CachedChoice, CachedTurn, ChoiceList, EventCache};
pub use catalog::{CatalogSource, InMemoryCatalog};
pub use classify::{ChoiceClassifier, Classification, RuleTable};
pub use config::EventPoolConfig;
pub use error::{EventPoolError, Result};
pub use matcher::{ChoiceMatcher, MatchCriteria, MatchFilters, MatchedEvent};
pub use metrics::PerformanceMonitor;
pub use pool::EventPoolLoader;
pub use system::EventSystem;
pub use types::*;
