//! # Product Repository
//!
//! Database operations for products.
//!
//! Catalog management belongs to the caller. What this repository adds is
//! the ledger's view of a product: validated prices, the cached blister
//! price, and deletion that refuses to orphan sales or stock.
//!
//! ## Price Cache
//! ```text
//! insert / update
//!      │
//!      ▼
//! validate_product(product, policy)   ratio > 0, prices >= 0, margin
//!      │
//!      ▼
//! refresh_cached_blister_price        explicit ?? sale / ratio (half-up)
//!      │
//!      ▼
//! products.blister_price_cents        read by listings, never by the ledger
//! ```
//!
//! ## Packaging Changes
//! Lots count stock in units, so a new `blisters_per_box` never changes how
//! much is on hand. `update` re-derives every lot's boxes and blisters in
//! the same locked transaction as the product row.

use apoteca_core::pricing::refresh_cached_blister_price;
use apoteca_core::validation::validate_product;
use apoteca_core::{CoreError, PricePolicy, Product};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult, LedgerResult};
use crate::repository::lot as lot_repo;

pub(crate) const PRODUCT_COLUMNS: &str = r#"
    id, name, barcode, purchase_price_cents, sale_price_cents,
    explicit_blister_price_cents, blister_price_cents, blisters_per_box,
    min_stock, category, dosage, active_ingredient, controlled,
    created_at, updated_at
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = Product::new(generate_id(), "Paracetamol 500mg", cost, price, 10);
/// let saved = repo.insert(product, PricePolicy::Enforce).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists products sorted by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, id LIMIT ?1");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The stored product, price cache filled in
    /// * `Err(Core(Validation))` - Bad name, barcode, prices or ratio
    /// * `Err(Db(UniqueViolation))` - Barcode already exists
    pub async fn insert(&self, mut product: Product, policy: PricePolicy) -> LedgerResult<Product> {
        debug!(name = %product.name, "Inserting product");

        validate_product(&product, policy)?;
        refresh_cached_blister_price(&mut product);
        let now = Utc::now();
        product.created_at = now;
        product.updated_at = now;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, barcode, purchase_price_cents, sale_price_cents,
                explicit_blister_price_cents, blister_price_cents, blisters_per_box,
                min_stock, category, dosage, active_ingredient, controlled,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(product.purchase_price_cents)
        .bind(product.sale_price_cents)
        .bind(product.explicit_blister_price_cents)
        .bind(product.blister_price_cents)
        .bind(product.blisters_per_box)
        .bind(product.min_stock)
        .bind(&product.category)
        .bind(&product.dosage)
        .bind(&product.active_ingredient)
        .bind(product.controlled)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Updates an existing product and refreshes its price cache.
    ///
    /// When `blisters_per_box` changes, every lot of the product keeps its
    /// `available_units` and has boxes and blisters re-derived for the new
    /// ratio, all in one locked transaction.
    pub async fn update(&self, mut product: Product, policy: PricePolicy) -> LedgerResult<Product> {
        debug!(id = %product.id, "Updating product");

        validate_product(&product, policy)?;
        refresh_cached_blister_price(&mut product);
        product.updated_at = Utc::now();

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let previous_ratio = require_in(&mut *tx, &product.id).await?.ratio();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                barcode = ?3,
                purchase_price_cents = ?4,
                sale_price_cents = ?5,
                explicit_blister_price_cents = ?6,
                blister_price_cents = ?7,
                blisters_per_box = ?8,
                min_stock = ?9,
                category = ?10,
                dosage = ?11,
                active_ingredient = ?12,
                controlled = ?13,
                updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(product.purchase_price_cents)
        .bind(product.sale_price_cents)
        .bind(product.explicit_blister_price_cents)
        .bind(product.blister_price_cents)
        .bind(product.blisters_per_box)
        .bind(product.min_stock)
        .bind(&product.category)
        .bind(&product.dosage)
        .bind(&product.active_ingredient)
        .bind(product.controlled)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product.id).into());
        }

        let ratio = product.ratio();
        if ratio != previous_ratio {
            let lots = lot_repo::list_in(&mut *tx, &product.id).await?;
            for mut lot in lots {
                let units = lot.available_units;
                lot.set_available_units(units, ratio)?;
                lot.updated_at = product.updated_at;
                lot_repo::write_quantities_in(&mut *tx, &lot, units).await?;
            }
            info!(
                id = %product.id,
                from = previous_ratio,
                to = ratio,
                "Lots repacked for new blisters per box"
            );
        }

        tx.commit().await?;
        Ok(product)
    }

    /// Deletes a product.
    ///
    /// ## Errors
    /// * `ProductInUse` - Sale lines reference the product
    /// * `LotNotEmpty` - A lot still holds stock; delete it first with
    ///   confirmation through the ledger
    /// * `ProductNotFound` - No such product
    pub async fn delete(&self, id: &str) -> LedgerResult<()> {
        debug!(id = %id, "Deleting product");

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let sale_lines: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_lines WHERE product_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if sale_lines > 0 {
            return Err(CoreError::ProductInUse {
                product_id: id.to_string(),
                sale_lines,
            }
            .into());
        }

        let stocked: Option<(String, i64)> = sqlx::query_as(
            r#"
            SELECT lot_code, available_units FROM lots
            WHERE product_id = ?1 AND available_units > 0
            ORDER BY expiry_date, id
            LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some((lot_code, available)) = stocked {
            return Err(CoreError::LotNotEmpty { lot_code, available }.into());
        }

        // Empty lots go with the product (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        tx.commit().await?;
        info!(id = %id, "Product deleted");
        Ok(())
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Reads a product inside an open transaction.
pub(crate) async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(product)
}

/// Reads a product inside an open transaction, failing with `ProductNotFound`.
pub(crate) async fn require_in(conn: &mut SqliteConnection, id: &str) -> LedgerResult<Product> {
    fetch_in(conn, id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_ledger_consistent, date, product, stock_lot, test_db};
    use crate::LedgerError;
    use apoteca_core::{Money, ValidationError};

    #[tokio::test]
    async fn test_insert_caches_blister_price() {
        let db = test_db().await;
        let saved = db
            .products()
            .insert(product("Paracetamol 500mg", 10_005, 10), PricePolicy::Enforce)
            .await
            .unwrap();
        assert_eq!(saved.blister_price_cents, 1_001);

        let loaded = db.products().get_by_id(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.blister_price_cents, 1_001);
        assert_eq!(loaded.name, "Paracetamol 500mg");
        assert!(loaded.explicit_blister_price_cents.is_none());
    }

    #[tokio::test]
    async fn test_update_refreshes_cache_with_explicit_price() {
        let db = test_db().await;
        let repo = db.products();
        let saved = repo
            .insert(product("Ibuprofeno 400mg", 12_000, 4), PricePolicy::Enforce)
            .await
            .unwrap();
        assert_eq!(saved.blister_price_cents, 3_000);

        let updated = repo
            .update(saved.with_blister_price(Money::from_cents(3_500)), PricePolicy::Enforce)
            .await
            .unwrap();
        assert_eq!(updated.blister_price_cents, 3_500);

        let loaded = repo.get_by_id(&updated.id).await.unwrap().unwrap();
        assert_eq!(loaded.explicit_blister_price_cents, Some(3_500));
    }

    #[tokio::test]
    async fn test_ratio_change_repacks_lots() {
        let db = test_db().await;
        let repo = db.products();
        let saved = repo
            .insert(product("Amoxicilina", 12_000, 10), PricePolicy::Enforce)
            .await
            .unwrap();
        let today = date(2026, 1, 1);
        let lot = stock_lot(&db, &saved, 34, date(2027, 1, 1), today).await;
        let empty = stock_lot(&db, &saved, 0, date(2027, 6, 1), today).await;

        let mut repacked = saved.clone();
        repacked.blisters_per_box = 12;
        repo.update(repacked, PricePolicy::Enforce).await.unwrap();

        let lot = db.lots().get_by_id(&lot.id).await.unwrap().unwrap();
        assert_eq!((lot.boxes, lot.blisters, lot.available_units), (2, 10, 34));
        let empty = db.lots().get_by_id(&empty.id).await.unwrap().unwrap();
        assert_eq!((empty.boxes, empty.blisters, empty.available_units), (0, 0, 0));
        assert_ledger_consistent(&db).await;

        // A box now holds 12 blisters
        db.ledger().deplete(&saved.id, 12).await.unwrap();
        let lot = db.lots().get_by_id(&lot.id).await.unwrap().unwrap();
        assert_eq!((lot.boxes, lot.blisters, lot.available_units), (1, 10, 22));
        assert_ledger_consistent(&db).await;
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_lots_alone() {
        let db = test_db().await;
        let saved = db
            .products()
            .insert(product("Amoxicilina", 12_000, 10), PricePolicy::Enforce)
            .await
            .unwrap();
        let lot = stock_lot(&db, &saved, 34, date(2027, 1, 1), date(2026, 1, 1)).await;

        let mut bad = saved.clone();
        bad.blisters_per_box = 0;
        assert!(db.products().update(bad, PricePolicy::Enforce).await.is_err());

        let lot = db.lots().get_by_id(&lot.id).await.unwrap().unwrap();
        assert_eq!((lot.boxes, lot.blisters), (3, 4));
        let loaded = db.products().get_by_id(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.blisters_per_box, 10);
    }

    #[tokio::test]
    async fn test_below_cost_needs_override() {
        let db = test_db().await;
        let mut cheap = product("Vitamina C", 1_000, 10);
        cheap.purchase_price_cents = 2_000;

        let err = db
            .products()
            .insert(cheap.clone(), PricePolicy::Enforce)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Validation(ValidationError::PriceBelowCost { .. }))
        ));

        assert!(db
            .products()
            .insert(cheap, PricePolicy::AllowBelowCost)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_barcode_rejected() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(
            product("Amoxicilina", 8_000, 10).with_barcode("7891234567890"),
            PricePolicy::Enforce,
        )
        .await
        .unwrap();

        let err = repo
            .insert(
                product("Amoxil", 8_000, 10).with_barcode("7891234567890"),
                PricePolicy::Enforce,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Db(DbError::UniqueViolation { .. })));

        let found = repo.get_by_barcode("7891234567890").await.unwrap().unwrap();
        assert_eq!(found.name, "Amoxicilina");
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let db = test_db().await;
        let err = db
            .products()
            .update(product("Ghost", 1_000, 1), PricePolicy::Enforce)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_unused_product() {
        let db = test_db().await;
        let saved = db
            .products()
            .insert(product("Soro Fisiologico", 5_000, 1), PricePolicy::Enforce)
            .await
            .unwrap();

        db.products().delete(&saved.id).await.unwrap();
        assert!(db.products().get_by_id(&saved.id).await.unwrap().is_none());
        assert_eq!(db.products().count().await.unwrap(), 0);

        let err = db.products().delete(&saved.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let db = test_db().await;
        for name in ["Zinco", "Aspirina", "Metformina"] {
            db.products()
                .insert(product(name, 1_000, 1), PricePolicy::Enforce)
                .await
                .unwrap();
        }

        let names: Vec<String> = db
            .products()
            .list(10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Aspirina", "Metformina", "Zinco"]);
    }
}
