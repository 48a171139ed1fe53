//! # Sale Repository
//!
//! Database operations for sales and sale lines.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. SETTLE  (one locked transaction, ledger::settlement)               │
//! │     └── insert_sale_in()   → Sale { total: 0 }                         │
//! │     └── deplete per product                                            │
//! │     └── insert_line_in()   → SaleLine (price snapshot)                 │
//! │     └── update_total_in()  → total = Σ subtotals                       │
//! │                                                                         │
//! │  2. READ                                                               │
//! │     └── get_record()       → SaleRecord { sale, lines }                │
//! │                                                                         │
//! │  3. (OPTIONAL) REVERSE  (one locked transaction, ledger::reversal)     │
//! │     └── credit every line back to a lot                                │
//! │     └── delete_in()        → lines, then the sale                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales have no status column: a reversed sale no longer exists.

use apoteca_core::{PaymentMethod, Sale, SaleLine, SaleRecord};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const SALE_COLUMNS: &str =
    "id, customer_id, staff_id, payment_method, total_cents, created_at, updated_at";

const LINE_COLUMNS: &str = r#"
    id, sale_id, product_id, product_name, quantity, unit,
    unit_price_cents, subtotal_cents, created_at
"#;

/// Repository for sale reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_in(&mut conn, id).await
    }

    /// Gets the lines of a sale in the order they were recorded.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let mut conn = self.pool.acquire().await?;
        lines_in(&mut conn, sale_id).await
    }

    /// Gets a sale together with its lines.
    pub async fn get_record(&self, sale_id: &str) -> DbResult<Option<SaleRecord>> {
        debug!(sale_id = %sale_id, "Loading sale record");
        let mut conn = self.pool.acquire().await?;
        let Some(sale) = fetch_in(&mut conn, sale_id).await? else {
            return Ok(None);
        };
        let lines = lines_in(&mut conn, sale_id).await?;
        Ok(Some(SaleRecord { sale, lines }))
    }

    /// Most recent sales first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC, id DESC LIMIT ?1"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Counts sale lines referencing a product.
    pub async fn count_lines_for_product(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_lines WHERE product_id = ?1")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(sale)
}

pub(crate) async fn lines_in(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleLine>> {
    let sql = format!(
        "SELECT {LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY created_at, rowid"
    );
    let lines = sqlx::query_as::<_, SaleLine>(&sql)
        .bind(sale_id)
        .fetch_all(conn)
        .await?;

    Ok(lines)
}

/// Inserts a sale header with a zero total.
pub(crate) async fn insert_sale_in(
    conn: &mut SqliteConnection,
    id: &str,
    customer_id: Option<&str>,
    staff_id: &str,
    payment_method: PaymentMethod,
    now: DateTime<Utc>,
) -> DbResult<Sale> {
    debug!(sale_id = %id, staff_id = %staff_id, "Inserting sale");
    sqlx::query(
        r#"
        INSERT INTO sales (id, customer_id, staff_id, payment_method, total_cents, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
        "#,
    )
    .bind(id)
    .bind(customer_id)
    .bind(staff_id)
    .bind(payment_method)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(Sale {
        id: id.to_string(),
        customer_id: customer_id.map(str::to_string),
        staff_id: staff_id.to_string(),
        payment_method,
        total_cents: 0,
        created_at: now,
        updated_at: now,
    })
}

pub(crate) async fn insert_line_in(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
    debug!(sale_id = %line.sale_id, product_id = %line.product_id, quantity = line.quantity, "Inserting sale line");
    sqlx::query(
        r#"
        INSERT INTO sale_lines (
            id, sale_id, product_id, product_name, quantity, unit,
            unit_price_cents, subtotal_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&line.id)
    .bind(&line.sale_id)
    .bind(&line.product_id)
    .bind(&line.product_name)
    .bind(line.quantity)
    .bind(line.unit)
    .bind(line.unit_price_cents)
    .bind(line.subtotal_cents)
    .bind(line.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn update_total_in(
    conn: &mut SqliteConnection,
    sale_id: &str,
    total_cents: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE sales SET total_cents = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(sale_id)
        .bind(total_cents)
        .bind(now)
        .execute(conn)
        .await?;

    Ok(())
}

/// Deletes a sale's lines, then the sale.
pub(crate) async fn delete_in(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM sale_lines WHERE sale_id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM sales WHERE id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
