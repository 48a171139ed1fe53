//! # apoteca-db: Database Layer and Stock Ledger
//!
//! This crate owns every SQL statement and every transaction boundary of
//! Apoteca. SQLite via sqlx; the business rules it applies come from
//! `apoteca-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Apoteca Data Flow                                │
//! │                                                                         │
//! │  Caller (sale screen, stock screen, importer)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   apoteca-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │    Ledger     │    │ Repositories │  │   │
//! │  │   │   (pool.rs)   │───►│ deplete       │───►│ product      │  │   │
//! │  │   │               │    │ credit        │    │ lot          │  │   │
//! │  │   │ SqlitePool    │    │ settle        │    │ sale         │  │   │
//! │  │   │ DbConfig      │    │ reverse       │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │ plans via apoteca-core        │   │
//! │  └────────────────────────────────┼────────────────────────────────┘   │
//! │                                   ▼                                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SQLite (WAL)   products │ lots │ sales │ sale_lines            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and ledger error types
//! - [`repository`] - Product, lot and sale persistence
//! - [`ledger`] - Locked stock transactions (deplete, credit, settle, reverse)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apoteca_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()).await?;
//! let record = db.ledger().settle(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use pool::{Database, DbConfig};

pub use repository::lot::LotRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;

use chrono::{Local, NaiveDate};

/// The pharmacy's current calendar date.
///
/// Lot expiry is a calendar concept, so it follows the local clock rather
/// than UTC.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
