//! Property-Based Tests for the Event Pool
//!
//! Uses `proptest` to check cache, matcher and monitor invariants under
//! random catalogs and game states.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use eventpool_core::config::{EligibilityConfig, MatchingConfig};
use eventpool_core::matcher::is_eligible;
use eventpool_core::metrics::percentile;
use eventpool_core::{
    Choice, ChoiceId, ChoiceMatcher, Effect, EventCache, GameStateSnapshot, InMemoryCatalog,
    PerformanceMonitor, Turn, TurnNumber,
};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

const TEXTS: &[&str] = &[
    "Ship a feature",
    "Seed investment pitch",
    "Series B funding",
    "Hire developer",
    "Recruit a designer",
    "Consulting with a solutions architect",
    "Migrate to Aurora",
];

fn arb_effect() -> impl Strategy<Value = Effect> {
    (
        -10_000i64..10_000,
        -10_000_000i64..10_000_000,
        -50i64..50,
        prop::collection::vec(prop::sample::select(vec!["EC2", "Aurora", "Redis"]), 0..3),
    )
        .prop_map(|(users, cash, trust, infra)| Effect {
            users,
            cash,
            trust,
            infra: infra.into_iter().map(str::to_string).collect(),
        })
}

/// Up to 40 choices with distinct ids spread over turns 1..=8.
fn arb_choices() -> impl Strategy<Value = Vec<Choice>> {
    prop::collection::vec(
        (1u32..=8, prop::sample::select(TEXTS.to_vec()), arb_effect()),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (turn, text, effects))| Choice {
                choice_id: ChoiceId(u32::try_from(i).unwrap_or(0) + 1),
                turn_number: TurnNumber(turn),
                text: text.to_string(),
                effects,
                next_turn: TurnNumber(turn + 1),
                category: None,
                description: None,
            })
            .collect()
    })
}

fn arb_state() -> impl Strategy<Value = GameStateSnapshot> {
    (0u32..=55, -1_000_000i64..20_000_000, -10i64..100, 0i64..10_000, 0i64..10_000).prop_map(
        |(turn, cash, trust, users, capacity)| GameStateSnapshot {
            current_turn: TurnNumber(turn),
            cash,
            trust,
            users,
            max_user_capacity: capacity,
        },
    )
}

fn turns() -> Vec<Turn> {
    (1..=8)
        .map(|n| Turn {
            turn_id: Some(n),
            turn_number: TurnNumber(n),
            event_text: format!("Turn {n}"),
            description: String::new(),
        })
        .collect()
}

fn cache_with(choices: Vec<Choice>) -> Arc<EventCache> {
    let cache = Arc::new(EventCache::with_defaults(Arc::new(InMemoryCatalog::default())));
    cache.load_records(turns(), choices);
    cache
}

// ---------------------------------------------------------------------------
// Property: every loaded choice is retrievable, unchanged, by id
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn choice_index_is_bijective(choices in arb_choices()) {
        let cache = cache_with(choices.clone());
        let snapshot = cache.snapshot();
        prop_assert_eq!(snapshot.choice_count(), choices.len());
        for choice in &choices {
            let cached = cache.get_choice(choice.choice_id).expect("cached");
            prop_assert_eq!(cached.turn_number, choice.turn_number);
            prop_assert_eq!(&cached.text, &choice.text);
            prop_assert_eq!(&cached.effects, &choice.effects);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: per-turn lists are sorted by magnitude and match the turn ids
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn turn_lists_sorted_descending(choices in arb_choices()) {
        let cache = cache_with(choices);
        for n in 1..=8 {
            let list = cache.get_choices_for_turn(TurnNumber(n));
            prop_assert!(list
                .windows(2)
                .all(|w| w[0].metadata.effect_magnitude >= w[1].metadata.effect_magnitude));

            let turn = cache.get_turn(TurnNumber(n)).expect("turn");
            let ids: Vec<ChoiceId> = list.iter().map(|c| c.choice_id).collect();
            prop_assert_eq!(&turn.choice_ids, &ids);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: unknown ids count as misses, never hits
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn unknown_id_is_a_miss(choices in arb_choices(), missing in 1000u32..5000) {
        let cache = cache_with(choices);
        let before = cache.get_performance_metrics();
        prop_assert!(cache.get_choice(ChoiceId(missing)).is_none());
        let after = cache.get_performance_metrics();
        prop_assert_eq!(after.cache_misses, before.cache_misses + 1);
        prop_assert_eq!(after.cache_hits, before.cache_hits);
        prop_assert_eq!(after.total_lookups, before.total_lookups + 1);
    }
}

// ---------------------------------------------------------------------------
// Property: investment iff enough cash and a matching keyword
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn investment_needs_cash_and_keyword(
        cash in -5_000_000i64..5_000_000,
        keyword in any::<bool>(),
    ) {
        let text = if keyword { "Angel investment round" } else { "Ship a feature" };
        let choice = Choice {
            choice_id: ChoiceId(1),
            turn_number: TurnNumber(1),
            text: text.to_string(),
            effects: Effect { users: 0, cash, trust: 0, infra: vec![] },
            next_turn: TurnNumber(2),
            category: None,
            description: None,
        };
        let cache = cache_with(vec![choice]);
        prop_assert_eq!(
            cache.is_investment_choice(ChoiceId(1)),
            keyword && cash >= 1_000_000
        );
    }
}

// ---------------------------------------------------------------------------
// Property: valid choices are capped at 6 and sorted by score
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn valid_choices_capped_and_sorted(choices in arb_choices(), state in arb_state()) {
        let cache = cache_with(choices);
        let matcher = ChoiceMatcher::new(
            cache,
            Arc::new(PerformanceMonitor::default()),
            MatchingConfig::default(),
        );
        let events = matcher.get_valid_choices(&state);
        prop_assert!(events.len() <= 6);
        prop_assert!(events.windows(2).all(|w| w[0].score >= w[1].score));

        let unique: HashSet<ChoiceId> = events.iter().map(|e| e.choice_id).collect();
        prop_assert_eq!(unique.len(), events.len());
        for event in &events {
            prop_assert!(matcher.is_choice_valid(event.choice_id, &state));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: eligibility is monotonic in resources
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn eligibility_monotonic(
        choices in arb_choices(),
        state in arb_state(),
        extra_cash in 0i64..5_000_000,
        extra_trust in 0i64..50,
        extra_turns in 0u32..5,
    ) {
        let cache = cache_with(choices);
        let rules = EligibilityConfig::default();
        let richer = GameStateSnapshot {
            current_turn: TurnNumber(state.current_turn.0 + extra_turns),
            cash: state.cash + extra_cash,
            trust: state.trust + extra_trust,
            ..state
        };
        for choice in cache.snapshot().choices() {
            if is_eligible(choice, &state, &rules) {
                prop_assert!(is_eligible(choice, &richer, &rules));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: p50 <= p95 <= p99 for any sample set
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn percentiles_ordered(samples in prop::collection::vec(0.0f64..1000.0, 1..500)) {
        let monitor = PerformanceMonitor::default();
        for ms in &samples {
            monitor.record_sample("op", *ms, None);
        }
        let stats = monitor.get_stats("op").expect("stats");
        prop_assert!(stats.min_ms <= stats.p50_ms);
        prop_assert!(stats.p50_ms <= stats.p95_ms);
        prop_assert!(stats.p95_ms <= stats.p99_ms);
        prop_assert!(stats.p99_ms <= stats.max_ms);
        prop_assert_eq!(stats.count, samples.len());
    }

    #[test]
    fn percentile_is_a_sample(mut values in prop::collection::vec(0.0f64..100.0, 1..200), p in 0.0f64..=100.0) {
        values.sort_by(f64::total_cmp);
        let v = percentile(&values, p);
        prop_assert!(values.contains(&v));
    }
}

// ---------------------------------------------------------------------------
// Property: the ring retains exactly the newest samples
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn ring_keeps_newest(extra in 1usize..3000) {
        let monitor = PerformanceMonitor::default();
        let total = 10_000 + extra;
        for i in 0..total {
            monitor.record_sample("op", i as f64, None);
        }
        let samples = monitor.get_raw_measurements("op");
        prop_assert_eq!(samples.len(), 10_000);
        prop_assert!((samples[0].duration_ms - extra as f64).abs() < f64::EPSILON);
    }
}
