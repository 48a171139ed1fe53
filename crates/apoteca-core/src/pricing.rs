//! # Product Pricing
//!
//! Products are priced per box. Blister prices come from one of two places:
//!
//! ```text
//! explicit_blister_price_cents set?
//!      │
//!      ├── yes ──► use it unchanged
//!      │
//!      └── no  ──► sale_price_per_box / blisters_per_box
//!                  rounded half-up to cents, floored at 0.00
//! ```
//!
//! The result is cached on the product at save time
//! ([`refresh_cached_blister_price`]) so listings don't recompute it, but
//! the ledger always resolves prices through [`price_per_blister`].
//!
//! A zero or negative ratio divides by 1. Such products are rejected by
//! [`crate::validation::validate_product`]; the fallback only keeps reads
//! of bad legacy rows from failing.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Product, SaleUnit};
use crate::validation::ValidationResult;

/// Whether `sale price >= purchase price` is enforced on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricePolicy {
    /// Reject products sold below cost.
    #[default]
    Enforce,
    /// Operator override (promotions, clearance of near-expiry stock).
    AllowBelowCost,
}

/// Derives a blister price from a box price.
///
/// ## Example
/// ```rust
/// use apoteca_core::money::Money;
/// use apoteca_core::pricing::derive_blister_price;
///
/// let per_blister = derive_blister_price(Money::from_cents(12550), 10);
/// assert_eq!(per_blister.cents(), 1255);
/// ```
pub fn derive_blister_price(sale_price_per_box: Money, ratio: i64) -> Money {
    sale_price_per_box.div_round_half_up(ratio).floor_zero()
}

/// The price of one blister of `product`.
pub fn price_per_blister(product: &Product) -> Money {
    product
        .explicit_blister_price()
        .unwrap_or_else(|| derive_blister_price(product.sale_price(), product.blisters_per_box))
}

/// The price of one `unit` of `product`.
pub fn unit_price(product: &Product, unit: SaleUnit) -> Money {
    match unit {
        SaleUnit::Box => product.sale_price(),
        SaleUnit::Blister => price_per_blister(product),
    }
}

/// Writes the resolved blister price into the product's cache field.
pub fn refresh_cached_blister_price(product: &mut Product) {
    product.blister_price_cents = price_per_blister(product).cents();
}

/// Checks the soft `sale >= purchase` rule.
pub fn check_margin(product: &Product, policy: PricePolicy) -> ValidationResult<()> {
    if policy == PricePolicy::Enforce && product.sale_price() < product.purchase_price() {
        return Err(ValidationError::PriceBelowCost {
            sale: product.sale_price(),
            purchase: product.purchase_price(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(sale_cents: i64, ratio: i64, explicit: Option<i64>) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            name: "Paracetamol 500mg".to_string(),
            barcode: None,
            purchase_price_cents: 5_000,
            sale_price_cents: sale_cents,
            explicit_blister_price_cents: explicit,
            blister_price_cents: 0,
            blisters_per_box: ratio,
            min_stock: 10,
            category: None,
            dosage: None,
            active_ingredient: None,
            controlled: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_derived_blister_price_rounds_half_up() {
        // 100.05 / 10 = 10.005 → 10.01
        let p = product(10_005, 10, None);
        assert_eq!(price_per_blister(&p).cents(), 1_001);
    }

    #[test]
    fn test_explicit_blister_price_wins() {
        let p = product(10_000, 10, Some(1_500));
        assert_eq!(price_per_blister(&p).cents(), 1_500);
    }

    #[test]
    fn test_zero_ratio_divides_by_one() {
        let p = product(10_000, 0, None);
        assert_eq!(price_per_blister(&p).cents(), 10_000);
    }

    #[test]
    fn test_negative_box_price_floors_at_zero() {
        let p = product(-100, 4, None);
        assert_eq!(price_per_blister(&p), Money::zero());
    }

    #[test]
    fn test_unit_price_by_unit() {
        let p = product(12_000, 4, None);
        assert_eq!(unit_price(&p, SaleUnit::Box).cents(), 12_000);
        assert_eq!(unit_price(&p, SaleUnit::Blister).cents(), 3_000);
    }

    #[test]
    fn test_cache_follows_explicit_price() {
        let mut p = product(12_000, 4, None);
        refresh_cached_blister_price(&mut p);
        assert_eq!(p.blister_price_cents, 3_000);

        p.explicit_blister_price_cents = Some(3_500);
        refresh_cached_blister_price(&mut p);
        assert_eq!(p.blister_price_cents, 3_500);
    }

    #[test]
    fn test_margin_policy() {
        let p = product(4_000, 4, None);
        assert!(matches!(
            check_margin(&p, PricePolicy::Enforce),
            Err(ValidationError::PriceBelowCost { .. })
        ));
        assert!(check_margin(&p, PricePolicy::AllowBelowCost).is_ok());
    }
}
