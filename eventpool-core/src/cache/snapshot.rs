//! Immutable cache contents built from one catalog load.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{Classification, RuleTable};
use crate::config::CacheConfig;
use crate::types::{Choice, ChoiceId, Effect, Turn, TurnNumber};

/// Metadata derived once per choice at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceMetadata {
    /// Classified as investment.
    pub is_investment: bool,
    /// Grants infrastructure.
    pub is_infra_upgrade: bool,
    /// Classified as staff hiring.
    pub is_staff_hiring: bool,
    /// Classified as consulting.
    pub is_consulting: bool,
    /// `|users| + |cash| + |trust|`.
    pub effect_magnitude: u64,
    /// Infra tags for O(1) membership tests.
    pub infra_tags: HashSet<String>,
}

/// A choice together with its derived metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedChoice {
    /// Unique choice id.
    pub choice_id: ChoiceId,
    /// Owning turn.
    pub turn_number: TurnNumber,
    /// Player-facing text.
    pub text: String,
    /// Resource effects.
    pub effects: Effect,
    /// Turn reached after taking this choice.
    pub next_turn: TurnNumber,
    /// Category label from the store, kept alongside the derived flags.
    pub category: Option<String>,
    /// Derived metadata.
    pub metadata: ChoiceMetadata,
}

impl CachedChoice {
    fn from_choice(choice: Choice, rules: &RuleTable) -> Self {
        let flags = rules.classify(&choice.text, &choice.effects);
        let metadata = ChoiceMetadata {
            is_investment: flags.has(Classification::Investment),
            is_infra_upgrade: flags.has(Classification::InfraUpgrade),
            is_staff_hiring: flags.has(Classification::StaffHiring),
            is_consulting: flags.has(Classification::Consulting),
            effect_magnitude: choice.effects.magnitude(),
            infra_tags: choice.effects.infra.iter().cloned().collect(),
        };
        Self {
            choice_id: choice.choice_id,
            turn_number: choice.turn_number,
            text: choice.text,
            effects: choice.effects,
            next_turn: choice.next_turn,
            category: choice.category,
            metadata,
        }
    }
}

/// A turn with the ids of its choices in ranked order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedTurn {
    /// Surrogate key from the store.
    pub turn_id: Option<u32>,
    /// Turn number.
    pub turn_number: TurnNumber,
    /// Narrative text.
    pub event_text: String,
    /// Longer description.
    pub description: String,
    /// Choice ids, highest effect magnitude first.
    pub choice_ids: Vec<ChoiceId>,
}

/// Lookup counters for one snapshot, incremented on the hot path.
///
/// Living in the snapshot ties every count to the contents it was served
/// from: swapping in a new snapshot starts from zero without a separate
/// reset that could race with readers.
#[derive(Debug, Default)]
pub(crate) struct LookupCounters {
    pub(crate) total_lookups: AtomicU64,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) cache_misses: AtomicU64,
}

impl LookupCounters {
    pub(crate) fn record(&self, hit: bool) {
        self.total_lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// A turn's choices in ranked order, shared by every reader.
pub type ChoiceList = Arc<[Arc<CachedChoice>]>;

/// Every index the cache serves, built in one pass and never mutated
/// apart from its lookup counters.
#[derive(Debug, Default)]
pub struct CacheSnapshot {
    pub(crate) choice_by_id: HashMap<ChoiceId, Arc<CachedChoice>>,
    pub(crate) choices_by_turn: HashMap<TurnNumber, ChoiceList>,
    pub(crate) turn_by_number: HashMap<TurnNumber, Arc<CachedTurn>>,
    pub(crate) investment: HashSet<ChoiceId>,
    pub(crate) infra_upgrade: HashSet<ChoiceId>,
    pub(crate) staff_hiring: HashSet<ChoiceId>,
    pub(crate) consulting: HashSet<ChoiceId>,
    pub(crate) loaded_at: Option<DateTime<Utc>>,
    pub(crate) counters: LookupCounters,
}

impl CacheSnapshot {
    /// Index `choices` first, then attach `turns`.
    ///
    /// Per-turn lists are sorted by effect magnitude, descending; equal
    /// magnitudes keep catalog order.
    pub(crate) fn build(turns: Vec<Turn>, choices: Vec<Choice>, rules: &RuleTable) -> Self {
        let mut snapshot = Self {
            loaded_at: Some(Utc::now()),
            ..Self::default()
        };
        let mut by_turn: HashMap<TurnNumber, Vec<Arc<CachedChoice>>> = HashMap::new();

        for choice in choices {
            let cached = Arc::new(CachedChoice::from_choice(choice, rules));
            let id = cached.choice_id;
            let meta = &cached.metadata;

            if meta.is_investment {
                snapshot.investment.insert(id);
            }
            if meta.is_infra_upgrade {
                snapshot.infra_upgrade.insert(id);
            }
            if meta.is_staff_hiring {
                snapshot.staff_hiring.insert(id);
            }
            if meta.is_consulting {
                snapshot.consulting.insert(id);
            }

            by_turn
                .entry(cached.turn_number)
                .or_default()
                .push(Arc::clone(&cached));
            snapshot.choice_by_id.insert(id, cached);
        }

        snapshot.choices_by_turn = by_turn
            .into_iter()
            .map(|(turn, mut list)| {
                list.sort_by_key(|c| Reverse(c.metadata.effect_magnitude));
                (turn, ChoiceList::from(list))
            })
            .collect();

        for turn in turns {
            let choice_ids = snapshot
                .choices_by_turn
                .get(&turn.turn_number)
                .map(|list| list.iter().map(|c| c.choice_id).collect())
                .unwrap_or_default();
            snapshot.turn_by_number.insert(
                turn.turn_number,
                Arc::new(CachedTurn {
                    turn_id: turn.turn_id,
                    turn_number: turn.turn_number,
                    event_text: turn.event_text,
                    description: turn.description,
                    choice_ids,
                }),
            );
        }

        snapshot
    }

    /// Choice by id; does not touch lookup counters.
    #[must_use]
    pub fn choice(&self, id: ChoiceId) -> Option<&Arc<CachedChoice>> {
        self.choice_by_id.get(&id)
    }

    /// A turn's choices in ranked order; does not touch lookup counters.
    #[must_use]
    pub fn choices_for_turn(&self, turn: TurnNumber) -> &[Arc<CachedChoice>] {
        self.choices_by_turn
            .get(&turn)
            .map(AsRef::as_ref)
            .unwrap_or_default()
    }

    /// Turn by number; does not touch lookup counters.
    #[must_use]
    pub fn turn(&self, turn: TurnNumber) -> Option<&Arc<CachedTurn>> {
        self.turn_by_number.get(&turn)
    }

    /// Every cached choice, in no particular order.
    pub fn choices(&self) -> impl Iterator<Item = &Arc<CachedChoice>> {
        self.choice_by_id.values()
    }

    /// Number of cached choices.
    #[must_use]
    pub fn choice_count(&self) -> usize {
        self.choice_by_id.len()
    }

    /// Number of cached turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turn_by_number.len()
    }

    /// When this snapshot was built; `None` for the empty snapshot.
    #[must_use]
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Ids indexed under `class`.
    #[must_use]
    pub fn index(&self, class: Classification) -> &HashSet<ChoiceId> {
        match class {
            Classification::Investment => &self.investment,
            Classification::InfraUpgrade => &self.infra_upgrade,
            Classification::StaffHiring => &self.staff_hiring,
            Classification::Consulting => &self.consulting,
        }
    }

    /// Approximate footprint: entry counts times fixed per-entry costs.
    #[must_use]
    pub fn estimated_memory_bytes(&self, config: &CacheConfig) -> usize {
        let index_entries: usize = Classification::ALL
            .iter()
            .map(|class| self.index(*class).len())
            .sum();
        self.choice_by_id.len() * config.choice_entry_bytes
            + self.turn_by_number.len() * config.turn_entry_bytes
            + index_entries * config.index_entry_bytes
    }
}
