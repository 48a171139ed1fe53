//! # apoteca-core: Pure Business Logic for the Stock Ledger
//!
//! This crate is the **heart** of Apoteca. It contains the lot ledger's
//! bookkeeping rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Apoteca Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Callers (sale screen, stock screen, import)        │   │
//! │  │     build Cart ──► settle ──► render confirmation / reverse     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ apoteca-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌───────┐ │   │
//! │  │  │packaging │ │ pricing │ │   lot   │ │ depletion │ │ cart  │ │   │
//! │  │  │box⇄blist.│ │ blister │ │ debit / │ │   FEFO    │ │ group │ │   │
//! │  │  │          │ │  price  │ │ credit  │ │  planner  │ │ lines │ │   │
//! │  │  └──────────┘ └─────────┘ └─────────┘ └───────────┘ └───────┘ │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               apoteca-db (transactions, locking, SQL)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Lot, Sale, SaleLine, enums)
//! - [`money`] - Integer-cent money type
//! - [`packaging`] - Box/blister unit conversion
//! - [`pricing`] - Per-blister price derivation
//! - [`lot`] - Lot creation rules, lot codes, debit/credit bookkeeping
//! - [`depletion`] - FEFO depletion planning
//! - [`cart`] - Cart value object and per-product grouping
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use apoteca_core::packaging::{to_boxes_and_blisters, to_units};
//!
//! // 3 boxes of 10 blisters plus 4 loose blisters
//! let units = to_units(3, 4, 10).unwrap();
//! assert_eq!(units, 34);
//! assert_eq!(to_boxes_and_blisters(units, 10), (3, 4));
//! ```

pub mod cart;
pub mod depletion;
pub mod error;
pub mod lot;
pub mod money;
pub mod packaging;
pub mod pricing;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartLine, SaleRequest};
pub use depletion::{plan_depletion, DepletionPlan, LotDebit};
pub use error::{CoreError, CoreResult, ValidationError};
pub use lot::NewLot;
pub use money::Money;
pub use pricing::PricePolicy;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity on a single cart line (boxes or blisters).
///
/// Catches typos like 1000 instead of 10 at the counter.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// Largest accepted `blisters_per_box`.
pub const MAX_BLISTERS_PER_BOX: i64 = 1_000;

/// Largest unit count a single lot may hold.
///
/// Keeps every `boxes * ratio + blisters` and every credit far inside `i64`.
pub const MAX_LOT_UNITS: i64 = 1_000_000_000;

/// Minimum-stock threshold assigned to products that don't set one.
pub const DEFAULT_MIN_STOCK: i64 = 10;

/// Longest span, in days, accepted for expiry windows and return-lot shelf
/// life (about a century).
pub const MAX_DAYS_AHEAD: i64 = 36_500;

/// Shelf life, in days, of a synthetic lot created to absorb a returned sale.
pub const DEFAULT_RETURN_LOT_DAYS: i64 = 365;
