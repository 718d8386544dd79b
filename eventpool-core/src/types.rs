//! Core type definitions for the event pool.
//!
//! Raw catalog records ([`Turn`], [`Choice`], [`Effect`]) as produced by a
//! [`CatalogSource`](crate::catalog::CatalogSource), plus the read-only
//! [`GameStateSnapshot`] the matcher consumes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier of a choice across the whole catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChoiceId(pub u32);

/// Number of a turn. Turns are keyed by number, not by surrogate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnNumber(pub u32);

impl From<u32> for ChoiceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<u32> for TurnNumber {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TurnNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Catalog Records
// ---------------------------------------------------------------------------

/// Signed resource deltas applied when a choice is taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    /// Change in user count.
    pub users: i64,
    /// Change in cash.
    pub cash: i64,
    /// Change in trust.
    pub trust: i64,
    /// Infrastructure capability tags granted.
    #[serde(default)]
    pub infra: Vec<String>,
}

impl Effect {
    /// `|users| + |cash| + |trust|`, used for ranking.
    #[must_use]
    pub fn magnitude(&self) -> u64 {
        self.users
            .unsigned_abs()
            .saturating_add(self.cash.unsigned_abs())
            .saturating_add(self.trust.unsigned_abs())
    }

    /// Whether the effect grants any infrastructure.
    #[must_use]
    pub fn grants_infra(&self) -> bool {
        !self.infra.is_empty()
    }
}

/// A numbered game stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Surrogate key from the backing store, if it has one.
    #[serde(default)]
    pub turn_id: Option<u32>,
    /// Unique turn number.
    pub turn_number: TurnNumber,
    /// Narrative text shown for the turn.
    pub event_text: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
}

/// A selectable action within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Unique choice id.
    pub choice_id: ChoiceId,
    /// Turn this choice belongs to.
    pub turn_number: TurnNumber,
    /// Player-facing text.
    pub text: String,
    /// Resource effects.
    pub effects: Effect,
    /// Turn reached after taking this choice.
    pub next_turn: TurnNumber,
    /// Free-form category label from the store.
    #[serde(default)]
    pub category: Option<String>,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Game State
// ---------------------------------------------------------------------------

/// Read-only view of a running game, as consumed by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    /// Turn the game is currently on.
    pub current_turn: TurnNumber,
    /// Current cash.
    pub cash: i64,
    /// Current trust.
    pub trust: i64,
    /// Current user count.
    pub users: i64,
    /// Users the current infrastructure can serve.
    pub max_user_capacity: i64,
}

impl Default for TurnNumber {
    fn default() -> Self {
        Self(1)
    }
}

impl GameStateSnapshot {
    /// `users / max_user_capacity`, or 0 when capacity is not positive.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn capacity_ratio(&self) -> f64 {
        if self.max_user_capacity > 0 {
            self.users as f64 / self.max_user_capacity as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_sums_absolute_values() {
        let effect = Effect {
            users: -20,
            cash: -1_000_000,
            trust: 5,
            infra: vec![],
        };
        assert_eq!(effect.magnitude(), 1_000_025);
    }

    #[test]
    fn magnitude_saturates_instead_of_overflowing() {
        let effect = Effect {
            users: i64::MIN,
            cash: i64::MIN,
            trust: i64::MIN,
            infra: vec![],
        };
        assert_eq!(effect.magnitude(), u64::MAX);
    }

    #[test]
    fn capacity_ratio_guards_zero_capacity() {
        let state = GameStateSnapshot {
            users: 500,
            max_user_capacity: 0,
            ..GameStateSnapshot::default()
        };
        assert!(state.capacity_ratio().abs() < f64::EPSILON);

        let state = GameStateSnapshot {
            users: 800,
            max_user_capacity: 1000,
            ..GameStateSnapshot::default()
        };
        assert!((state.capacity_ratio() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn effect_json_matches_store_shape() {
        let effect: Effect =
            serde_json::from_str(r#"{"users":100,"cash":-500000,"trust":0,"infra":["Aurora"]}"#)
                .expect("parse");
        assert_eq!(effect.infra, vec!["Aurora".to_string()]);
        assert!(effect.grants_infra());
    }
}
