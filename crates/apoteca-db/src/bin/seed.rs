//! # Seed Data Generator
//!
//! Populates the database with a pharmacy catalog and dated lots for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed ./apoteca.db (or $APOTECA_DB_PATH)
//! cargo run -p apoteca-db --bin seed
//!
//! # Three lots per product, custom database
//! cargo run -p apoteca-db --bin seed -- --lots 3 --db ./data/apoteca_dev.db
//! ```
//!
//! ## Generated Data
//! - One product per catalog entry, priced per box, with its packaging
//!   ratio and minimum stock
//! - `--lots` lots per product with staggered expiry dates, some within
//!   30 days so the expiry report has something to show

use std::env;

use apoteca_core::{Money, NewLot, PricePolicy, Product};
use apoteca_db::repository::generate_id;
use apoteca_db::{today, Database, DbConfig};
use chrono::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (name, dosage, category, blisters per box, sale cents, purchase cents)
const CATALOG: &[(&str, &str, &str, i64, i64, i64)] = &[
    ("Paracetamol", "500mg", "medicine", 10, 5_000, 3_200),
    ("Amoxicilina", "500mg", "medicine", 10, 12_000, 8_000),
    ("Ibuprofeno", "400mg", "medicine", 4, 8_500, 5_100),
    ("Metformina", "850mg", "medicine", 6, 15_000, 9_800),
    ("Omeprazol", "20mg", "medicine", 14, 9_800, 6_000),
    ("Losartan", "50mg", "medicine", 3, 11_000, 7_300),
    ("Cetirizina", "10mg", "medicine", 10, 6_500, 3_900),
    ("Salbutamol", "100mcg", "medicine", 1, 35_000, 24_000),
    ("Artemeter/Lumefantrina", "20/120mg", "medicine", 4, 18_000, 12_500),
    ("Sais de Reidratacao Oral", "20.5g", "medicine", 1, 1_500, 900),
    ("Vitamina C", "500mg", "supplement", 10, 4_000, 2_300),
    ("Acido Folico", "5mg", "supplement", 10, 2_500, 1_400),
    ("Sulfato Ferroso", "200mg", "supplement", 10, 3_000, 1_800),
    ("Alcool Gel", "500ml", "hygiene", 1, 12_000, 7_500),
    ("Luvas Descartaveis", "M", "hygiene", 10, 45_000, 30_000),
];

/// Days from today until each lot of a product expires.
const EXPIRY_OFFSETS: &[i64] = &[21, 120, 365, 540, 730];

/// Initializes tracing with `RUST_LOG` or the development default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,apoteca=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config = DbConfig::from_env();
    let mut lots_per_product: usize = 2;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--lots" | "-l" => {
                if i + 1 < args.len() {
                    lots_per_product = args[i + 1].parse().unwrap_or(2);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Apoteca Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -l, --lots <N>     Lots per product (default: 2, max: {})", EXPIRY_OFFSETS.len());
                println!("  -d, --db <PATH>    Database file path (default: $APOTECA_DB_PATH or ./apoteca.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }
    let lots_per_product = lots_per_product.clamp(1, EXPIRY_OFFSETS.len());

    info!(path = %config.database_path.display(), lots_per_product, "Seeding database");
    let db = Database::new(config).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products; skipping seed to avoid duplicates");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let today = today();
    let mut products = 0;
    let mut lots = 0;

    for (idx, (name, dosage, category, ratio, sale, purchase)) in CATALOG.iter().enumerate() {
        let mut product = Product::new(
            generate_id(),
            format!("{name} {dosage}"),
            Money::from_cents(*purchase),
            Money::from_cents(*sale),
            *ratio,
        )
        .with_barcode(format!("560{:010}", idx + 1));
        product.dosage = Some(dosage.to_string());
        product.category = Some(category.to_string());

        let product = match db.products().insert(product, PricePolicy::Enforce).await {
            Ok(product) => product,
            Err(err) => {
                warn!(name = %name, error = %err, "Failed to insert product");
                continue;
            }
        };
        products += 1;

        for (n, offset) in EXPIRY_OFFSETS.iter().take(lots_per_product).enumerate() {
            let boxes = 3 + ((idx + n) % 5) as i64 * 4;
            let blisters = ((idx * 7 + n) as i64) % *ratio;
            let new_lot = NewLot::boxes(boxes, today + Duration::days(*offset + idx as i64))
                .with_blisters(blisters)
                .manufactured(today - Duration::days(180));

            match db.ledger().create_lot(&product.id, &new_lot).await {
                Ok(_) => lots += 1,
                Err(err) => warn!(product = %product.name, error = %err, "Failed to insert lot"),
            }
        }
    }

    info!(products, lots, elapsed = ?start.elapsed(), "Catalog seeded");

    let expiring = db.ledger().expiring_within(30).await?;
    info!(count = expiring.len(), "Lots expiring within 30 days");
    for lot in &expiring {
        info!(
            lot_code = %lot.lot_code,
            expiry = %lot.expiry_date,
            units = lot.available_units,
            "Expiring soon"
        );
    }

    db.close().await;
    Ok(())
}
