//! # Lot Repository
//!
//! Reads over the `lots` table, plus the transaction helpers the ledger
//! uses to lock, insert and rewrite lots.
//!
//! ## Queries and Their Indexes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FEFO walk        product_id = ? AND available_units > 0                │
//! │                   ORDER BY expiry_date, id      idx_lots_product_expiry │
//! │                                                                         │
//! │  Restock target   product_id = ? AND expiry_date >= today               │
//! │                   ORDER BY expiry_date, id      idx_lots_product_expiry │
//! │                                                                         │
//! │  Expiring soon    expiry_date BETWEEN today AND today + n               │
//! │                   AND available_units > 0       idx_lots_expiry         │
//! │                                                                         │
//! │  Total stock      SUM(available_units) WHERE product_id = ?             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dates are stored as `YYYY-MM-DD` text, so string comparison is date
//! comparison.

use apoteca_core::lot::lot_code;
use apoteca_core::validation::date_after;
use apoteca_core::{CoreError, Lot, NewLot, Product};
use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, LedgerResult};
use crate::repository::generate_id;

pub(crate) const LOT_COLUMNS: &str = r#"
    id, product_id, lot_code, sequence, boxes, blisters, available_units,
    expiry_date, manufactured_on, is_return, created_at, updated_at
"#;

/// Read-only access to lots.
///
/// Every write to `lots` goes through [`crate::ledger::Ledger`], which
/// holds the write lock for the whole read-modify-write.
#[derive(Debug, Clone)]
pub struct LotRepository {
    pool: SqlitePool,
}

impl LotRepository {
    /// Creates a new LotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LotRepository { pool }
    }

    /// Gets a lot by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Lot>> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE id = ?1");
        let lot = sqlx::query_as::<_, Lot>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lot)
    }

    /// Gets a lot by its code. Codes are only unique within a product.
    pub async fn get_by_code(&self, product_id: &str, code: &str) -> DbResult<Option<Lot>> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE product_id = ?1 AND lot_code = ?2");
        let lot = sqlx::query_as::<_, Lot>(&sql)
            .bind(product_id)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lot)
    }

    /// All lots of a product, empty ones included, in FEFO order.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Lot>> {
        let mut conn = self.pool.acquire().await?;
        list_in(&mut conn, product_id).await
    }

    /// Units on hand across every lot of a product, in one aggregate query.
    pub async fn total_available(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(available_units), 0) FROM lots WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Earliest expiry on or after `today` among the product's lots.
    pub async fn nearest_valid_expiry(
        &self,
        product_id: &str,
        today: NaiveDate,
    ) -> DbResult<Option<NaiveDate>> {
        let expiry: Option<NaiveDate> = sqlx::query_scalar(
            r#"
            SELECT expiry_date FROM lots
            WHERE product_id = ?1 AND expiry_date >= ?2
            ORDER BY expiry_date
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .bind(today)
        .fetch_optional(&self.pool)
        .await?;

        Ok(expiry)
    }

    /// Lots with stock expiring between `today` and `today + days`, inclusive.
    ///
    /// ## Errors
    /// * `OutOfRange` - `days` is negative or beyond `MAX_DAYS_AHEAD`
    pub async fn expiring_within(&self, days: i64, today: NaiveDate) -> LedgerResult<Vec<Lot>> {
        let until = date_after(today, "days", days)?;
        debug!(%today, %until, "Listing expiring lots");

        let sql = format!(
            r#"
            SELECT {LOT_COLUMNS} FROM lots
            WHERE available_units > 0 AND expiry_date >= ?1 AND expiry_date <= ?2
            ORDER BY expiry_date, product_id, id
            "#
        );
        let lots = sqlx::query_as::<_, Lot>(&sql)
            .bind(today)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        Ok(lots)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Reads a lot inside an open transaction, failing with `LotNotFound`.
pub(crate) async fn require_in(conn: &mut SqliteConnection, id: &str) -> LedgerResult<Lot> {
    let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE id = ?1");
    sqlx::query_as::<_, Lot>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| CoreError::LotNotFound(id.to_string()).into())
}

/// Every lot of the product, empty ones included, in FEFO order.
pub(crate) async fn list_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Vec<Lot>> {
    let sql = format!(
        "SELECT {LOT_COLUMNS} FROM lots WHERE product_id = ?1 ORDER BY expiry_date, id"
    );
    let lots = sqlx::query_as::<_, Lot>(&sql)
        .bind(product_id)
        .fetch_all(conn)
        .await?;

    Ok(lots)
}

/// The product's lots with stock, in FEFO order.
///
/// Call only inside a `BEGIN IMMEDIATE` transaction; the write lock is what
/// keeps these rows from changing before the plan is applied.
pub(crate) async fn lock_available_in(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Vec<Lot>> {
    let sql = format!(
        r#"
        SELECT {LOT_COLUMNS} FROM lots
        WHERE product_id = ?1 AND available_units > 0
        ORDER BY expiry_date, id
        "#
    );
    let lots = sqlx::query_as::<_, Lot>(&sql)
        .bind(product_id)
        .fetch_all(conn)
        .await?;

    Ok(lots)
}

/// The soonest-expiring lot of the product still valid on `today`, empty or not.
pub(crate) async fn first_valid_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    today: NaiveDate,
) -> DbResult<Option<Lot>> {
    let sql = format!(
        r#"
        SELECT {LOT_COLUMNS} FROM lots
        WHERE product_id = ?1 AND expiry_date >= ?2
        ORDER BY expiry_date, id
        LIMIT 1
        "#
    );
    let lot = sqlx::query_as::<_, Lot>(&sql)
        .bind(product_id)
        .bind(today)
        .fetch_optional(conn)
        .await?;

    Ok(lot)
}

/// Persists a lot's new quantities.
///
/// The row must still hold `expected_units`; anything else means the lot
/// changed under a transaction that should have held the write lock.
pub(crate) async fn write_quantities_in(
    conn: &mut SqliteConnection,
    lot: &Lot,
    expected_units: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE lots SET
            boxes = ?2,
            blisters = ?3,
            available_units = ?4,
            updated_at = ?5
        WHERE id = ?1 AND available_units = ?6
        "#,
    )
    .bind(&lot.id)
    .bind(lot.boxes)
    .bind(lot.blisters)
    .bind(lot.available_units)
    .bind(lot.updated_at)
    .bind(expected_units)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Contention(format!(
            "lot {} changed during the transaction",
            lot.lot_code
        )));
    }

    Ok(())
}

/// Inserts a lot for `product`, generating its code.
///
/// The sequence is the product's lot count plus one, bumped past any code
/// that is already taken (codes of deleted lots can leave gaps).
pub(crate) async fn insert_in(
    conn: &mut SqliteConnection,
    product: &Product,
    new_lot: &NewLot,
    is_return: bool,
) -> LedgerResult<Lot> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lots WHERE product_id = ?1")
        .bind(&product.id)
        .fetch_one(&mut *conn)
        .await?;

    let mut sequence = existing + 1;
    let mut code = lot_code(&product.name, sequence);
    loop {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lots WHERE product_id = ?1 AND lot_code = ?2",
        )
        .bind(&product.id)
        .bind(&code)
        .fetch_one(&mut *conn)
        .await?;
        if taken == 0 {
            break;
        }
        sequence += 1;
        code = lot_code(&product.name, sequence);
    }

    let (boxes, blisters, available_units) = new_lot.quantities(product.ratio())?;
    let now = Utc::now();
    let lot = Lot {
        id: generate_id(),
        product_id: product.id.clone(),
        lot_code: code,
        sequence,
        boxes,
        blisters,
        available_units,
        expiry_date: new_lot.expiry_date,
        manufactured_on: new_lot.manufactured_on,
        is_return,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO lots (
            id, product_id, lot_code, sequence, boxes, blisters, available_units,
            expiry_date, manufactured_on, is_return, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&lot.id)
    .bind(&lot.product_id)
    .bind(&lot.lot_code)
    .bind(lot.sequence)
    .bind(lot.boxes)
    .bind(lot.blisters)
    .bind(lot.available_units)
    .bind(lot.expiry_date)
    .bind(lot.manufactured_on)
    .bind(lot.is_return)
    .bind(lot.created_at)
    .bind(lot.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(lot)
}

pub(crate) async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM lots WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testing::{date, saved_product, stock_lot, test_db};
    use crate::LedgerError;
    use apoteca_core::{CoreError, ValidationError, MAX_DAYS_AHEAD};

    #[tokio::test]
    async fn test_total_available_sums_lots() {
        let db = test_db().await;
        let today = date(2026, 1, 10);
        let amox = saved_product(&db, "Amoxicilina 500mg", 12_000, 10).await;
        let para = saved_product(&db, "Paracetamol", 5_000, 10).await;

        assert_eq!(db.lots().total_available(&amox.id).await.unwrap(), 0);

        stock_lot(&db, &amox, 34, date(2027, 1, 1), today).await;
        stock_lot(&db, &amox, 6, date(2027, 6, 1), today).await;
        stock_lot(&db, &para, 100, date(2027, 1, 1), today).await;

        assert_eq!(db.lots().total_available(&amox.id).await.unwrap(), 40);
        assert_eq!(db.lots().total_available(&para.id).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_list_for_product_is_fefo_ordered() {
        let db = test_db().await;
        let today = date(2026, 1, 10);
        let amox = saved_product(&db, "Amoxicilina", 12_000, 10).await;

        let late = stock_lot(&db, &amox, 10, date(2028, 1, 1), today).await;
        let early = stock_lot(&db, &amox, 10, date(2026, 3, 1), today).await;

        let lots = db.lots().list_for_product(&amox.id).await.unwrap();
        assert_eq!(lots[0].id, early.id);
        assert_eq!(lots[1].id, late.id);

        let by_code = db
            .lots()
            .get_by_code(&amox.id, &late.lot_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code.id, late.id);
    }

    #[tokio::test]
    async fn test_nearest_valid_expiry_skips_expired() {
        let db = test_db().await;
        let amox = saved_product(&db, "Amoxicilina", 12_000, 10).await;

        stock_lot(&db, &amox, 10, date(2026, 2, 1), date(2026, 1, 1)).await;
        stock_lot(&db, &amox, 10, date(2026, 9, 1), date(2026, 1, 1)).await;

        let repo = db.lots();
        assert_eq!(
            repo.nearest_valid_expiry(&amox.id, date(2026, 1, 15)).await.unwrap(),
            Some(date(2026, 2, 1))
        );
        assert_eq!(
            repo.nearest_valid_expiry(&amox.id, date(2026, 3, 1)).await.unwrap(),
            Some(date(2026, 9, 1))
        );
        assert_eq!(
            repo.nearest_valid_expiry(&amox.id, date(2026, 10, 1)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_expiring_within_window() {
        let db = test_db().await;
        let today = date(2026, 5, 1);
        let amox = saved_product(&db, "Amoxicilina", 12_000, 10).await;
        let para = saved_product(&db, "Paracetamol", 5_000, 10).await;

        let soon = stock_lot(&db, &amox, 10, date(2026, 5, 20), today).await;
        let edge = stock_lot(&db, &para, 5, date(2026, 5, 31), today).await;
        stock_lot(&db, &para, 5, date(2026, 6, 1), today).await;
        // Empty lots are not reported
        stock_lot(&db, &amox, 0, date(2026, 5, 10), today).await;

        let lots = db.lots().expiring_within(30, today).await.unwrap();
        let ids: Vec<&str> = lots.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![soon.id.as_str(), edge.id.as_str()]);
    }

    #[tokio::test]
    async fn test_expiring_within_rejects_unbounded_windows() {
        let db = test_db().await;
        let today = date(2026, 5, 1);

        for days in [i64::MAX, MAX_DAYS_AHEAD + 1, -1] {
            let err = db.lots().expiring_within(days, today).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    LedgerError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
                ),
                "days {days}: {err:?}"
            );
        }
        assert!(db.lots().expiring_within(MAX_DAYS_AHEAD, today).await.unwrap().is_empty());
    }
}
