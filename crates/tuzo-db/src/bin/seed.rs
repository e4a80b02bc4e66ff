//! # Seed Data Generator
//!
//! Populates the database with a demo loyalty programme for development.
//!
//! ## Usage
//! ```bash
//! # 50 customers (default)
//! cargo run -p tuzo-db --bin seed
//!
//! # Custom amount
//! cargo run -p tuzo-db --bin seed -- --customers 500
//!
//! # Specify database path
//! cargo run -p tuzo-db --bin seed -- --db ./data/tuzo.db
//! ```
//!
//! ## Generated Data
//! - One business, "Kahawa House"
//! - N customers checked in through the ledger, 1 to 4 visits each
//! - Every other customer referred by the customer before them
//!
//! Everything goes through `LoyaltyLedger`, so the seeded data obeys the
//! same invariants as production traffic.

use std::env;
use tuzo_core::LoyaltyRules;
use tuzo_db::{Database, DbConfig, LoyaltyLedger, NewBusiness, RetryPolicy};

/// Customer names for realistic test data
const NAMES: &[&str] = &[
    "Wanjiku", "Otieno", "Akinyi", "Kamau", "Njeri", "Mutua", "Chebet", "Kiprop", "Atieno",
    "Mwangi", "Wairimu", "Omondi", "Nekesa", "Barasa", "Zawadi", "Baraka", "Imani", "Juma",
    "Amani", "Neema",
];

/// Purchase amounts in base currency
const AMOUNTS: &[f64] = &[3.50, 7.25, 12.00, 18.40, 25.00, 42.75, 60.00, 115.30];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut customers: usize = 50;
    let mut db_path = String::from("./tuzo_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--customers" | "-n" => {
                if i + 1 < args.len() {
                    customers = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tuzo Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --customers <N>  Number of customers to create (default: 50)");
                println!("  -d, --db <PATH>      Database file path (default: ./tuzo_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tuzo Seed Data Generator");
    println!("==========================");
    println!("Database:  {}", db_path);
    println!("Customers: {}", customers);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.businesses().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} businesses", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let ledger = LoyaltyLedger::new(db.clone(), LoyaltyRules::default(), RetryPolicy::default())?;

    let business = db
        .directory()
        .register_business(NewBusiness {
            name: "Kahawa House".to_string(),
            owner_name: "Amina Otieno".to_string(),
            phone: "+254 700 100 200".to_string(),
            address: Some("Moi Avenue, Nairobi".to_string()),
        })
        .await?;

    println!();
    println!("Checking in customers...");

    let start = std::time::Instant::now();
    let mut visits = 0;
    let mut referrals = 0;
    let mut previous_code: Option<String> = None;

    for n in 0..customers {
        let phone = format!("+2547{:08}", n);
        let name = NAMES[n % NAMES.len()];

        let mut receipt = None;
        for v in 0..(1 + n % 4) {
            let amount = AMOUNTS[(n * 7 + v * 3) % AMOUNTS.len()];
            match ledger.check_in(&business.id, &phone, Some(name), amount).await {
                Ok(r) => {
                    visits += 1;
                    receipt = Some(r);
                }
                Err(e) => eprintln!("Failed to check in {}: {}", phone, e),
            }
        }

        let Some(receipt) = receipt else { continue };

        if n % 2 == 1 {
            if let Some(code) = &previous_code {
                match ledger.redeem_referral(code, &receipt.customer.id).await {
                    Ok(_) => referrals += 1,
                    Err(e) => eprintln!("Failed to redeem {} for {}: {}", code, phone, e),
                }
            }
        }

        previous_code = Some(receipt.referral_code);

        if (n + 1) % 100 == 0 {
            println!("  Checked in {} customers...", n + 1);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ {} customers, {} visits, {} referrals in {:?}",
        customers, visits, referrals, elapsed
    );

    let stats = ledger.business_stats(&business.id).await?;
    println!();
    println!("Business: {} ({})", business.name, business.id);
    println!("  Total spent:   {}", stats.total_spent_display);
    println!("  Points issued: {} ({})", stats.points_issued, stats.points_issued_display);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
