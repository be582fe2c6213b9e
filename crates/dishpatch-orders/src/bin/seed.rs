//! # Seed Data Generator
//!
//! Populates a development database with a customer, a few shops and
//! their menus, then prints a sample delivery quote.
//!
//! ## Usage
//! ```bash
//! # Seed ./dishpatch_dev.db
//! cargo run -p dishpatch-orders --bin seed
//!
//! # Specify database path
//! cargo run -p dishpatch-orders --bin seed -- --db ./data/dishpatch.db
//!
//! # Top up the customer with a custom balance
//! cargo run -p dishpatch-orders --bin seed -- --balance 5000
//! ```

use std::env;

use dishpatch_core::{DeliveryType, Money, OrderLine, PricingPolicy, UserRole};
use dishpatch_db::{new_product, new_shop, new_user, Database, DbConfig, DbError};
use dishpatch_orders::{init_tracing, OrderCoordinator};

/// (shop, latitude, longitude, menu of (name, price, stock))
const SHOPS: &[(&str, f64, f64, &[(&str, i64, i64)])] = &[
    (
        "Noodle Bar",
        24.7890,
        120.9960,
        &[
            ("Beef Noodle Soup", 160, 40),
            ("Dan Dan Noodles", 110, 35),
            ("Pork Dumplings", 80, 60),
            ("Cucumber Salad", 45, 25),
        ],
    ),
    (
        "Taco Stand",
        24.8010,
        120.9710,
        &[
            ("Carnitas Taco", 70, 50),
            ("Al Pastor Taco", 75, 50),
            ("Elote", 55, 20),
            ("Horchata", 40, 30),
        ],
    ),
    (
        "Curry House",
        24.7730,
        121.0120,
        &[
            ("Chicken Curry", 150, 30),
            ("Vegetable Korma", 130, 25),
            ("Garlic Naan", 35, 80),
            ("Mango Lassi", 60, 40),
        ],
    ),
];

const CUSTOMER_LOCATION: (f64, f64) = (24.7870, 120.9970);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./dishpatch_dev.db");
    let mut balance: i64 = 1000;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--balance" | "-b" => {
                if i + 1 < args.len() {
                    balance = args[i + 1].parse().unwrap_or(1000);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Dishpatch Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./dishpatch_dev.db)");
                println!("  -b, --balance <UNITS>  Customer starting balance (default: 1000)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Dishpatch Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let coordinator = OrderCoordinator::new(db.clone(), PricingPolicy::default());

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut sample = None;

    for (shop_idx, (shop_name, lat, lon, menu)) in SHOPS.iter().enumerate() {
        let owner = new_user(format!("Owner {}", shop_idx + 1), UserRole::Owner, *lat, *lon);
        db.users().insert(&owner).await?;

        let shop = new_shop(&owner.id, *shop_name, *lat, *lon);
        match db.shops().insert(&shop).await {
            Ok(_) => {}
            Err(DbError::UniqueViolation { .. }) => {
                println!("⚠ Shop '{}' already exists", shop_name);
                println!("  Skipping seed to avoid duplicates.");
                println!("  Delete the database file to regenerate.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        for (name, price, stock) in menu.iter() {
            let product = new_product(&shop.id, &owner.id, *name, *price, *stock);
            db.products().insert(&product).await?;

            if sample.is_none() {
                sample = Some((shop.location(), product.id.clone()));
            }
        }

        println!("✓ {} ({} items)", shop_name, menu.len());
    }

    let (lat, lon) = CUSTOMER_LOCATION;
    let customer = new_user("Demo Customer", UserRole::Customer, lat, lon);
    db.users().insert(&customer).await?;
    if balance > 0 {
        coordinator
            .recharge(&customer.id, Money::from_units(balance))
            .await?;
    }

    println!("✓ Customer {} (balance {})", customer.id, balance);

    if let Some((shop_location, product_id)) = sample {
        let quote = coordinator
            .preview_order(
                &[OrderLine::new(product_id, 2)],
                DeliveryType::Delivery,
                customer.location(),
                shop_location,
            )
            .await?;

        println!();
        println!("Sample quote (2 x {}):", quote.lines[0].name);
        println!("  Distance:  {:.2} km", quote.distance_km);
        println!("  Subtotal:  {}", quote.subtotal);
        println!("  Delivery:  {}", quote.delivery_fee);
        println!("  Total:     {}", quote.total);
    }

    Ok(())
}
