//! # eventpool-sqlite — SQLite Catalog for the Event Pool
//!
//! Stores the turn/choice catalog in two tables and serves it to
//! `eventpool-core` through [`CatalogSource`](eventpool_core::CatalogSource):
//!
//! ```sql
//! CREATE TABLE turns (
//!     turn_id     INTEGER PRIMARY KEY AUTOINCREMENT,
//!     turn_number INTEGER NOT NULL UNIQUE,
//!     event_text  TEXT NOT NULL,
//!     description TEXT
//! );
//! CREATE TABLE choices (
//!     choice_id   INTEGER PRIMARY KEY,
//!     turn_number INTEGER NOT NULL,
//!     text        TEXT NOT NULL,
//!     effects     TEXT NOT NULL,   -- JSON {users, cash, trust, infra}
//!     next_turn   INTEGER NOT NULL,
//!     category    TEXT,
//!     description TEXT
//! );
//! ```
//!
//! Reads run on the blocking pool; the cache calls them once at startup and
//! again on explicit reload.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod error;

pub use catalog::SqliteCatalog;
pub use error::SqliteCatalogError;
