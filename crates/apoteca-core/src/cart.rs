//! # Cart
//!
//! The cart is an explicit value object. Where it lives between requests
//! (session, local storage, a draft table) is the caller's business; the
//! ledger only sees the [`SaleRequest`] built from it.
//!
//! ## Grouping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart lines                       Per-product units (ratio 10)          │
//! │  ─────────────────────────        ─────────────────────────────         │
//! │  AMOX  2 box        ──┐                                                 │
//! │  AMOX  5 blister    ──┴──────►    AMOX  25                              │
//! │  PARA  1 blister    ──────────►   PARA   1                              │
//! │                                                                         │
//! │  One depletion per product with the summed units. Depleting per line   │
//! │  would let two small debits pass where the combined one must fail.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::packaging::{add_units, units_for};
use crate::types::{PaymentMethod, SaleUnit};
use crate::validation::{validate_cart_size, validate_quantity};

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit: SaleUnit,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit: SaleUnit) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
            unit,
        }
    }
}

/// Everything settlement needs to record a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub customer_id: Option<String>,
    pub staff_id: String,
    pub payment_method: PaymentMethod,
    pub lines: Vec<CartLine>,
}

impl SaleRequest {
    /// Checks the request shape before any lookup or mutation.
    pub fn validate(&self) -> CoreResult<()> {
        if self.lines.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        validate_cart_size(self.lines.len())?;

        if self.staff_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "staff_id".to_string(),
            }
            .into());
        }

        for line in &self.lines {
            if line.product_id.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "product_id".to_string(),
                }
                .into());
            }
            validate_quantity(line.quantity)?;
        }

        Ok(())
    }

    /// Distinct product ids in sorted order.
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lines.iter().map(|l| l.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Sums unit equivalents per product.
    ///
    /// `ratio_of` resolves a product's `blisters_per_box`; a product it
    /// can't resolve fails with `ProductNotFound`. The map iterates in
    /// product-id order, which is the order settlement depletes in.
    pub fn units_by_product<F>(&self, mut ratio_of: F) -> CoreResult<BTreeMap<String, i64>>
    where
        F: FnMut(&str) -> Option<i64>,
    {
        let mut totals = BTreeMap::new();
        for line in &self.lines {
            let ratio = ratio_of(&line.product_id)
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
            let units = units_for(line.quantity, line.unit, ratio)?;
            let total = totals.entry(line.product_id.clone()).or_insert(0);
            *total = add_units(*total, units)?;
        }
        Ok(totals)
    }
}

/// A cart being built at the counter.
///
/// ## Invariants
/// - Lines are unique by `(product_id, unit)`; adding again merges quantity
/// - Quantities stay within `1..=MAX_LINE_QUANTITY`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds a quantity of a product, merging with an existing line of the
    /// same unit.
    pub fn add(&mut self, product_id: &str, quantity: i64, unit: SaleUnit) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id && l.unit == unit)
        {
            let merged = line.quantity + quantity;
            validate_quantity(merged)?;
            line.quantity = merged;
            return Ok(());
        }

        validate_cart_size(self.lines.len() + 1)?;
        self.lines.push(CartLine::new(product_id, quantity, unit));
        Ok(())
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, product_id: &str, unit: SaleUnit, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            self.lines
                .retain(|l| !(l.product_id == product_id && l.unit == unit));
            return Ok(());
        }
        validate_quantity(quantity)?;

        match self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id && l.unit == unit)
        {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::ProductNotFound(product_id.to_string())),
        }
    }

    /// Removes every line of a product.
    pub fn remove_product(&mut self, product_id: &str) {
        self.lines.retain(|l| l.product_id != product_id);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Turns the cart into a sale request.
    pub fn into_request(
        self,
        staff_id: impl Into<String>,
        payment_method: PaymentMethod,
        customer_id: Option<String>,
    ) -> SaleRequest {
        SaleRequest {
            customer_id,
            staff_id: staff_id.into(),
            payment_method,
            lines: self.lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_LINE_QUANTITY;

    fn request(lines: Vec<CartLine>) -> SaleRequest {
        SaleRequest {
            customer_id: None,
            staff_id: "staff-1".to_string(),
            payment_method: PaymentMethod::Cash,
            lines,
        }
    }

    #[test]
    fn test_units_by_product_sums_boxes_and_blisters() {
        let req = request(vec![
            CartLine::new("amox", 2, SaleUnit::Box),
            CartLine::new("para", 1, SaleUnit::Blister),
            CartLine::new("amox", 5, SaleUnit::Blister),
        ]);

        let totals = req
            .units_by_product(|id| match id {
                "amox" => Some(10),
                "para" => Some(20),
                _ => None,
            })
            .unwrap();

        assert_eq!(totals.len(), 2);
        assert_eq!(totals["amox"], 25);
        assert_eq!(totals["para"], 1);
        assert_eq!(totals.keys().collect::<Vec<_>>(), vec!["amox", "para"]);
    }

    #[test]
    fn test_units_by_product_unknown_product() {
        let req = request(vec![CartLine::new("ghost", 1, SaleUnit::Box)]);
        assert!(matches!(
            req.units_by_product(|_| None),
            Err(CoreError::ProductNotFound(id)) if id == "ghost"
        ));
    }

    #[test]
    fn test_units_by_product_rejects_overflowing_ratio() {
        // A row that bypassed product validation
        let req = request(vec![CartLine::new("amox", MAX_LINE_QUANTITY, SaleUnit::Box)]);
        assert!(matches!(
            req.units_by_product(|_| Some(i64::MAX / 1_000)),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_and_bad_quantities() {
        assert!(matches!(request(vec![]).validate(), Err(CoreError::EmptyCart)));
        assert!(request(vec![CartLine::new("amox", 0, SaleUnit::Box)])
            .validate()
            .is_err());
        assert!(request(vec![CartLine::new("amox", 1, SaleUnit::Box)])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_cart_merges_same_product_and_unit() {
        let mut cart = Cart::new();
        cart.add("amox", 1, SaleUnit::Box).unwrap();
        cart.add("amox", 2, SaleUnit::Box).unwrap();
        cart.add("amox", 3, SaleUnit::Blister).unwrap();

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].quantity, 3);
        assert!(cart.add("amox", MAX_LINE_QUANTITY, SaleUnit::Box).is_err());
        assert_eq!(cart.lines[0].quantity, 3);
    }

    #[test]
    fn test_cart_set_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add("amox", 1, SaleUnit::Box).unwrap();
        cart.add("para", 4, SaleUnit::Blister).unwrap();

        cart.set_quantity("para", SaleUnit::Blister, 6).unwrap();
        assert_eq!(cart.lines[1].quantity, 6);

        cart.set_quantity("para", SaleUnit::Blister, 0).unwrap();
        assert_eq!(cart.lines.len(), 1);

        cart.remove_product("amox");
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_line_wire_shape() {
        let line = CartLine::new("amox", 2, SaleUnit::Box);
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"product_id": "amox", "quantity": 2, "unit": "box"})
        );

        let parsed: CartLine =
            serde_json::from_str(r#"{"product_id":"para","quantity":1,"unit":"blister"}"#).unwrap();
        assert_eq!(parsed.unit, SaleUnit::Blister);
    }

    #[test]
    fn test_into_request() {
        let mut cart = Cart::new();
        cart.add("amox", 1, SaleUnit::Box).unwrap();
        let req = cart.into_request("staff-9", PaymentMethod::Mpesa, Some("cust-1".into()));
        assert_eq!(req.staff_id, "staff-9");
        assert_eq!(req.lines.len(), 1);
        assert!(req.validate().is_ok());
    }
}
