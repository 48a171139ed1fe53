//! # Repository Module
//!
//! Persistence for the four ledger tables.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repository methods (&self)          Transaction helpers (free fns)     │
//! │  ──────────────────────────          ──────────────────────────────     │
//! │  run on the pool, one statement      take `&mut SqliteConnection` and   │
//! │  or their own short transaction      run inside the caller's locked     │
//! │                                      ledger transaction                 │
//! │                                                                         │
//! │  db.products().get_by_id(id)         product::require_in(&mut *tx, id)  │
//! │  db.lots().list_for_product(id)      lot::lock_available_in(...)        │
//! │  db.sales().get_record(id)           sale::insert_line_in(...)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything that changes lot quantities goes through [`crate::ledger`];
//! the repositories here never write `lots` on their own connection.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog reads, guarded writes
//! - [`lot::LotRepository`] - Lot reads and expiry queries
//! - [`sale::SaleRepository`] - Sale and sale line reads

pub mod lot;
pub mod product;
pub mod sale;

use uuid::Uuid;

/// Generates a new entity ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
