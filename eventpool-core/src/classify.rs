//! Choice classification — a rule table evaluated against `(text, effects)`.
//!
//! The cache derives four flags for every choice at load time. Which text and
//! effect patterns produce each flag is not hard-coded: a [`RuleTable`] maps
//! each [`Classification`] to a [`ChoiceClassifier`]. The default table is
//! built from [`ClassificationConfig`] keyword rules; callers can swap any
//! entry for a custom predicate (another locale, or a rule keyed off the
//! store's `category` column).

use std::fmt;

use crate::config::{ClassificationConfig, KeywordRule};
use crate::types::Effect;

/// The classifications the cache indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Fundraising / investment.
    Investment,
    /// Grants infrastructure.
    InfraUpgrade,
    /// Hires staff.
    StaffHiring,
    /// Consulting engagement.
    Consulting,
}

impl Classification {
    /// All classifications in index order.
    pub const ALL: [Self; 4] = [
        Self::Investment,
        Self::InfraUpgrade,
        Self::StaffHiring,
        Self::Consulting,
    ];
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Investment => write!(f, "Investment"),
            Self::InfraUpgrade => write!(f, "Infrastructure Upgrades"),
            Self::StaffHiring => write!(f, "Staff Hiring"),
            Self::Consulting => write!(f, "Consulting"),
        }
    }
}

/// A predicate deciding whether a choice belongs to a classification.
///
/// `text_lower` is the choice text already lowercased.
pub trait ChoiceClassifier: Send + Sync {
    /// Whether the choice matches.
    fn matches(&self, text_lower: &str, effects: &Effect) -> bool;
}

impl<F> ChoiceClassifier for F
where
    F: Fn(&str, &Effect) -> bool + Send + Sync,
{
    fn matches(&self, text_lower: &str, effects: &Effect) -> bool {
        self(text_lower, effects)
    }
}

impl ChoiceClassifier for KeywordRule {
    fn matches(&self, text_lower: &str, effects: &Effect) -> bool {
        if let Some(min_cash) = self.min_cash {
            if effects.cash < min_cash {
                return false;
            }
        }
        if self.requires_infra && !effects.grants_infra() {
            return false;
        }
        self.keyword_groups.iter().all(|group| {
            group
                .iter()
                .any(|term| text_lower.contains(term.to_lowercase().as_str()))
        })
    }
}

/// Classification flags derived for one choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationFlags {
    /// Investment choice.
    pub investment: bool,
    /// Infrastructure upgrade.
    pub infra_upgrade: bool,
    /// Staff hiring.
    pub staff_hiring: bool,
    /// Consulting.
    pub consulting: bool,
}

impl ClassificationFlags {
    /// Whether the flag for `class` is set.
    #[must_use]
    pub fn has(&self, class: Classification) -> bool {
        match class {
            Classification::Investment => self.investment,
            Classification::InfraUpgrade => self.infra_upgrade,
            Classification::StaffHiring => self.staff_hiring,
            Classification::Consulting => self.consulting,
        }
    }

    fn set(&mut self, class: Classification) {
        match class {
            Classification::Investment => self.investment = true,
            Classification::InfraUpgrade => self.infra_upgrade = true,
            Classification::StaffHiring => self.staff_hiring = true,
            Classification::Consulting => self.consulting = true,
        }
    }
}

/// Maps each classification to its predicate.
///
/// A classification with no entry never matches.
pub struct RuleTable {
    rules: Vec<(Classification, Box<dyn ChoiceClassifier>)>,
}

impl fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTable")
            .field(
                "classifications",
                &self.rules.iter().map(|(c, _)| *c).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RuleTable {
    /// An empty table; nothing is classified.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Build the table from configured keyword rules.
    ///
    /// The investment rule takes `investment_min_cash` unless it carries its
    /// own `min_cash`; the infra upgrade rule always requires granted infra.
    #[must_use]
    pub fn from_config(config: &ClassificationConfig) -> Self {
        let mut investment = config.investment.clone();
        investment.min_cash.get_or_insert(config.investment_min_cash);
        let mut infra_upgrade = config.infra_upgrade.clone();
        infra_upgrade.requires_infra = true;

        Self::empty()
            .with_rule(Classification::Investment, investment)
            .with_rule(Classification::InfraUpgrade, infra_upgrade)
            .with_rule(Classification::StaffHiring, config.staff_hiring.clone())
            .with_rule(Classification::Consulting, config.consulting.clone())
    }

    /// Set (or replace) the predicate for `class`.
    #[must_use]
    pub fn with_rule(
        mut self,
        class: Classification,
        rule: impl ChoiceClassifier + 'static,
    ) -> Self {
        self.rules.retain(|(c, _)| *c != class);
        self.rules.push((class, Box::new(rule)));
        self
    }

    /// Evaluate every rule against a choice.
    #[must_use]
    pub fn classify(&self, text: &str, effects: &Effect) -> ClassificationFlags {
        let text_lower = text.to_lowercase();
        let mut flags = ClassificationFlags::default();
        for (class, rule) in &self.rules {
            if rule.matches(&text_lower, effects) {
                flags.set(*class);
            }
        }
        flags
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::from_config(&ClassificationConfig::default())
    }
}
