//! Eligibility rules: preconditions a classified choice must meet.
//!
//! Rules are independent and checked in a fixed order; the first failure
//! decides. A choice with none of the gated classifications is always
//! eligible.

use std::fmt;

use crate::cache::CachedChoice;
use crate::config::EligibilityConfig;
use crate::types::GameStateSnapshot;

/// Why a choice is not currently available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// Investment choice while trust is below the minimum.
    LowTrust,
    /// Infra upgrade or hiring while cash is below the minimum.
    LowCash,
    /// Hiring before the minimum turn.
    TooEarly,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowTrust => write!(f, "trust too low"),
            Self::LowCash => write!(f, "cash too low"),
            Self::TooEarly => write!(f, "turn too early"),
        }
    }
}

/// Check `choice` against `state`.
///
/// # Errors
/// Returns the first rule the choice fails.
pub fn check_eligibility(
    choice: &CachedChoice,
    state: &GameStateSnapshot,
    rules: &EligibilityConfig,
) -> Result<(), Ineligible> {
    let meta = &choice.metadata;

    if meta.is_investment && state.trust < rules.investment_min_trust {
        return Err(Ineligible::LowTrust);
    }
    if meta.is_infra_upgrade && state.cash < rules.infra_min_cash {
        return Err(Ineligible::LowCash);
    }
    if meta.is_staff_hiring {
        if state.cash < rules.hiring_min_cash {
            return Err(Ineligible::LowCash);
        }
        if state.current_turn.0 < rules.hiring_min_turn {
            return Err(Ineligible::TooEarly);
        }
    }
    Ok(())
}

/// Whether `choice` is eligible under `state`.
#[must_use]
pub fn is_eligible(choice: &CachedChoice, state: &GameStateSnapshot, rules: &EligibilityConfig) -> bool {
    check_eligibility(choice, state, rules).is_ok()
}
