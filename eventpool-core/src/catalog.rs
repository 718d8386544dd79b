//! Catalog source — the boundary to whatever store holds turns and choices.
//!
//! Both fetches are full-table reads, run once at startup and again on
//! explicit reload. [`InMemoryCatalog`] serves fixtures and tests; the
//! `eventpool-sqlite` crate provides a database-backed source.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{EventPoolError, Result};
use crate::types::{Choice, Turn};

/// Bulk reader of the turn/choice catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every turn in the catalog.
    async fn fetch_all_turns(&self) -> Result<Vec<Turn>>;

    /// Every choice in the catalog.
    async fn fetch_all_choices(&self) -> Result<Vec<Choice>>;
}

/// A catalog held in memory.
///
/// Contents can be replaced between loads to exercise reloads, and the
/// source can be switched into a failing mode to exercise startup errors.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogData>,
}

#[derive(Debug, Default)]
struct CatalogData {
    turns: Vec<Turn>,
    choices: Vec<Choice>,
    failure: Option<String>,
}

impl InMemoryCatalog {
    /// Create a catalog with the given records.
    #[must_use]
    pub fn new(turns: Vec<Turn>, choices: Vec<Choice>) -> Self {
        Self {
            inner: RwLock::new(CatalogData {
                turns,
                choices,
                failure: None,
            }),
        }
    }

    /// Replace the catalog contents.
    pub fn replace(&self, turns: Vec<Turn>, choices: Vec<Choice>) {
        let mut data = self.inner.write();
        data.turns = turns;
        data.choices = choices;
    }

    /// Make every subsequent fetch fail with `reason` (`None` restores).
    pub fn set_failure(&self, reason: Option<String>) {
        self.inner.write().failure = reason;
    }

    fn check(&self) -> Result<()> {
        match &self.inner.read().failure {
            Some(reason) => Err(EventPoolError::Catalog(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn fetch_all_turns(&self) -> Result<Vec<Turn>> {
        self.check()?;
        Ok(self.inner.read().turns.clone())
    }

    async fn fetch_all_choices(&self) -> Result<Vec<Choice>> {
        self.check()?;
        Ok(self.inner.read().choices.clone())
    }
}
