//! # Domain Types
//!
//! Core domain records used throughout Apoteca.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌─────────────────┐                         │
//! │  │    Product      │───────│      Lot        │                         │
//! │  │  ─────────────  │       │  ─────────────  │                         │
//! │  │  id (UUID)      │       │  lot_code       │  available_units ==     │
//! │  │  name, barcode  │       │  boxes          │   boxes * ratio         │
//! │  │  sale/purchase  │       │  blisters       │   + blisters            │
//! │  │  blisters/box   │       │  expiry_date    │                         │
//! │  └────────┬────────┘       └─────────────────┘                         │
//! │           │ referenced by (RESTRICT)                                   │
//! │  ┌────────┴────────┐ *   1 ┌─────────────────┐                         │
//! │  │   SaleLine      │───────│      Sale       │                         │
//! │  │  quantity, unit │       │  payment_method │  total ==               │
//! │  │  unit price     │       │  total_cents    │   Σ line.subtotal       │
//! │  │  (snapshot)     │       │  staff/customer │                         │
//! │  └─────────────────┘       └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has a UUID `id` for relations. Lots also carry a
//! human-readable `lot_code` (e.g. `AM03LT`) printed on shelf labels.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::packaging::{effective_ratio, to_units};
use crate::pricing::refresh_cached_blister_price;

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// Catalog management is external; the ledger reads products and only ever
/// writes the cached `blister_price_cents` at save time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name; the first two letters prefix its lot codes.
    pub name: String,

    /// Barcode (EAN-13 etc.), unique when present.
    pub barcode: Option<String>,

    /// Purchase price per box, in cents.
    pub purchase_price_cents: i64,

    /// Sale price per box, in cents.
    pub sale_price_cents: i64,

    /// Explicit sale price per blister. When set, always wins.
    pub explicit_blister_price_cents: Option<i64>,

    /// Per-blister price cached at save time (explicit or derived).
    pub blister_price_cents: i64,

    /// Packaging ratio: blisters in one box.
    pub blisters_per_box: i64,

    /// Stock level below which the product reports `Low`.
    pub min_stock: i64,

    /// Category label (medicine, hygiene, ...). Not used by the ledger.
    pub category: Option<String>,

    /// Dosage, e.g. "500mg".
    pub dosage: Option<String>,

    /// Active ingredient.
    pub active_ingredient: Option<String>,

    /// Controlled substance flag. Sale limits are a caller policy.
    pub controlled: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Builds a product with default metadata and a fresh price cache.
    ///
    /// Timestamps start at the Unix epoch; the repository stamps them on save.
    ///
    /// ## Example
    /// ```rust
    /// use apoteca_core::{Money, Product};
    ///
    /// let p = Product::new("p-1", "Amoxicilina 500mg", Money::from_cents(8_000), Money::from_cents(12_000), 10);
    /// assert_eq!(p.blister_price_cents, 1_200);
    /// assert_eq!(p.min_stock, apoteca_core::DEFAULT_MIN_STOCK);
    /// ```
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        purchase_price: Money,
        sale_price: Money,
        blisters_per_box: i64,
    ) -> Self {
        let now = DateTime::<Utc>::UNIX_EPOCH;
        let mut product = Product {
            id: id.into(),
            name: name.into(),
            barcode: None,
            purchase_price_cents: purchase_price.cents(),
            sale_price_cents: sale_price.cents(),
            explicit_blister_price_cents: None,
            blister_price_cents: 0,
            blisters_per_box,
            min_stock: crate::DEFAULT_MIN_STOCK,
            category: None,
            dosage: None,
            active_ingredient: None,
            controlled: false,
            created_at: now,
            updated_at: now,
        };
        refresh_cached_blister_price(&mut product);
        product
    }

    /// Sets an explicit per-blister price.
    pub fn with_blister_price(mut self, price: Money) -> Self {
        self.explicit_blister_price_cents = Some(price.cents());
        refresh_cached_blister_price(&mut self);
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_min_stock(mut self, min_stock: i64) -> Self {
        self.min_stock = min_stock;
        self
    }

    /// Sale price per box.
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    /// Purchase price per box.
    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    /// Explicit per-blister price, if the catalog set one.
    #[inline]
    pub fn explicit_blister_price(&self) -> Option<Money> {
        self.explicit_blister_price_cents.map(Money::from_cents)
    }

    /// Packaging ratio used for conversions (never below 1).
    #[inline]
    pub fn ratio(&self) -> i64 {
        effective_ratio(self.blisters_per_box)
    }
}

// =============================================================================
// Lot
// =============================================================================

/// One dated batch of a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Lot {
    pub id: String,
    pub product_id: String,

    /// `{PREFIX}{seq:02}LT`, immutable after creation.
    pub lot_code: String,

    /// Per-product sequence embedded in the lot code.
    pub sequence: i64,

    pub boxes: i64,
    pub blisters: i64,

    /// Always `boxes * ratio + blisters`.
    pub available_units: i64,

    #[ts(as = "String")]
    pub expiry_date: NaiveDate,

    #[ts(as = "Option<String>")]
    pub manufactured_on: Option<NaiveDate>,

    /// Synthetic lot created to absorb a reversed sale.
    pub is_return: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Lot {
    /// Checks the ledger invariant for the given packaging ratio.
    pub fn is_consistent(&self, ratio: i64) -> bool {
        self.available_units >= 0
            && self.boxes >= 0
            && self.blisters >= 0
            && to_units(self.boxes, self.blisters, ratio)
                .is_ok_and(|units| units == self.available_units)
    }

    /// A lot is valid (sellable without an expiry override) through its
    /// expiry date inclusive.
    #[inline]
    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        self.expiry_date >= today
    }
}

// =============================================================================
// Stock Status
// =============================================================================

/// Stock level classification against a product's minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    Low,
    Ok,
}

impl StockStatus {
    /// Classifies a total unit count against a minimum threshold.
    pub fn classify(total_units: i64, min_stock: i64) -> Self {
        if total_units <= 0 {
            StockStatus::OutOfStock
        } else if total_units < min_stock {
            StockStatus::Low
        } else {
            StockStatus::Ok
        }
    }
}

// =============================================================================
// Sale Unit
// =============================================================================

/// The unit a cart line is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleUnit {
    /// A whole box (`blisters_per_box` units).
    Box,
    /// A single blister (one unit).
    Blister,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash.
    Cash,
    /// M-Pesa mobile money.
    Mpesa,
    /// e-Mola mobile money.
    Emola,
    /// Card on a POS terminal.
    Pos,
    /// Bank transfer.
    BankTransfer,
}

// =============================================================================
// Sale
// =============================================================================

/// A settled sale transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub customer_id: Option<String>,
    pub staff_id: String,
    pub payment_method: PaymentMethod,
    /// Σ line subtotals, recomputed at settlement.
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line of a sale.
/// Uses snapshot pattern to freeze product name and price at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    pub quantity: i64,
    pub unit: SaleUnit,
    /// Price of one `unit` at time of sale (frozen).
    pub unit_price_cents: i64,
    /// `unit_price_cents * quantity`.
    pub subtotal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// A sale together with its lines, as returned by settlement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRecord {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

impl SaleRecord {
    /// Σ line subtotals. Equals `sale.total()` for every settled sale.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(SaleLine::subtotal).sum()
    }
}
