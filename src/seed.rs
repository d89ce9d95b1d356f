use chrono::NaiveDate;
use envconfig::Envconfig;
use rust_decimal::Decimal;
use sqlx::PgPool;

use pharmora::{config::Config, db::init_db, handlers::inventory::DEFAULT_REORDER_LEVEL, workflow::Role};

/// Password shared by every demo account.
const DEMO_PASSWORD: &str = "password123";

struct SeedUser {
    name: &'static str,
    email: &'static str,
    role: Role,
    phone: &'static str,
    address: &'static str,
}

struct SeedMedicine {
    name: &'static str,
    category: &'static str,
    description: &'static str,
    price: Decimal,
    stock: i32,
    expiry_date: NaiveDate,
    image_url: &'static str,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid seed date")
}

fn get_seed_data() -> (Vec<SeedUser>, Vec<SeedMedicine>) {
    let users = vec![
        SeedUser {
            name: "Admin",
            email: "admin@pharmora.com",
            role: Role::Admin,
            phone: "9000000001",
            address: "Pharmora HQ",
        },
        SeedUser {
            name: "Dr. Meera Nair",
            email: "doctor@pharmora.com",
            role: Role::Doctor,
            phone: "9000000002",
            address: "City Clinic, 4 Park Road",
        },
        SeedUser {
            name: "Ravi Kumar",
            email: "pharmacist@pharmora.com",
            role: Role::Pharmacist,
            phone: "9000000003",
            address: "Pharmora Pharmacy, 18 Market St",
        },
        SeedUser {
            name: "MediSupply Ltd",
            email: "supplier@pharmora.com",
            role: Role::Supplier,
            phone: "9000000004",
            address: "Unit 7, Industrial Estate",
        },
        SeedUser {
            name: "Anita Shah",
            email: "patient@pharmora.com",
            role: Role::Patient,
            phone: "9000000005",
            address: "12 Main St",
        },
    ];

    let medicines = vec![
        SeedMedicine {
            name: "Aspirin",
            category: "Pain Relief",
            description: "Aspirin 75mg tablets",
            price: Decimal::new(4999, 2),
            stock: 500,
            expiry_date: date(2027, 6, 30),
            image_url: "/images/aspirin.jpg",
        },
        SeedMedicine {
            name: "Amoxicillin",
            category: "Antibiotics",
            description: "Amoxicillin 500mg capsules",
            price: Decimal::new(12000, 2),
            stock: 300,
            expiry_date: date(2026, 12, 31),
            image_url: "/images/amoxicillin.jpg",
        },
        SeedMedicine {
            name: "Lisinopril",
            category: "Cardiac",
            description: "Lisinopril 10mg tablets",
            price: Decimal::new(8550, 2),
            stock: 8,
            expiry_date: date(2027, 3, 15),
            image_url: "/images/lisinopril.jpg",
        },
        SeedMedicine {
            name: "Levothyroxine",
            category: "Thyroid",
            description: "Levothyroxine 50mcg tablets",
            price: Decimal::new(6000, 2),
            stock: 250,
            expiry_date: date(2028, 1, 31),
            image_url: "/images/levothyroxine.jpg",
        },
        SeedMedicine {
            name: "Metformin",
            category: "Diabetes",
            description: "Metformin 500mg tablets",
            price: Decimal::new(3500, 2),
            stock: 350,
            expiry_date: date(2027, 9, 30),
            image_url: "/images/metformin.jpg",
        },
        SeedMedicine {
            name: "Cetirizine",
            category: "Allergy",
            description: "Cetirizine 10mg tablets",
            price: Decimal::new(2500, 2),
            stock: 0,
            expiry_date: date(2027, 2, 28),
            image_url: "/images/cetirizine.jpg",
        },
    ];

    (users, medicines)
}

pub async fn seed_database(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let (users, medicines) = get_seed_data();
    let password_hash = bcrypt::hash(DEMO_PASSWORD, bcrypt::DEFAULT_COST)?;
    let mut tx = pool.begin().await?;

    let mut supplier_id = None;
    for user in users {
        let user_id: i32 = sqlx::query_scalar(
            "INSERT INTO users (name, email, password_hash, role, phone, address)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name
             RETURNING user_id",
        )
        .bind(user.name)
        .bind(user.email)
        .bind(&password_hash)
        .bind(user.role.as_str())
        .bind(user.phone)
        .bind(user.address)
        .fetch_one(&mut *tx)
        .await?;

        if user.role == Role::Supplier {
            let id: i32 = sqlx::query_scalar(
                "INSERT INTO suppliers (user_id, company_name, phone, address)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (user_id) DO UPDATE SET company_name = EXCLUDED.company_name
                 RETURNING supplier_id",
            )
            .bind(user_id)
            .bind(user.name)
            .bind(user.phone)
            .bind(user.address)
            .fetch_one(&mut *tx)
            .await?;
            supplier_id = Some(id);
        }
        log::info!("Seeded {} account {}", user.role, user.email);
    }

    for medicine in medicines {
        let existing: Option<i32> =
            sqlx::query_scalar("SELECT medicine_id FROM medicines WHERE name = $1")
                .bind(medicine.name)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            log::info!("Medicine {} already seeded", medicine.name);
            continue;
        }

        let medicine_id: i32 = sqlx::query_scalar(
            "INSERT INTO medicines
                (supplier_id, name, category, description, price, stock, expiry_date, image_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING medicine_id",
        )
        .bind(supplier_id)
        .bind(medicine.name)
        .bind(medicine.category)
        .bind(medicine.description)
        .bind(medicine.price)
        .bind(medicine.stock)
        .bind(medicine.expiry_date)
        .bind(medicine.image_url)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(supplier_id) = supplier_id {
            // Wholesale stock sits at 60% of the retail price.
            let purchase_price = medicine.price * Decimal::new(6, 1);
            sqlx::query(
                "INSERT INTO supplier_inventory
                    (supplier_id, medicine_id, quantity_available, reorder_level,
                     purchase_price, selling_price, expiry_date)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (supplier_id, medicine_id) DO NOTHING",
            )
            .bind(supplier_id)
            .bind(medicine_id)
            .bind(medicine.stock * 2 + 10)
            .bind(DEFAULT_REORDER_LEVEL)
            .bind(purchase_price.round_dp(2))
            .bind(medicine.price)
            .bind(medicine.expiry_date)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    dotenvy::dotenv().ok();

    let config = Config::init_from_env()?;
    let pool = init_db(config.connect_options()?, config.db_max_connections).await?;
    seed_database(&pool).await?;
    log::info!("Seed data loaded; demo accounts use the password {:?}", DEMO_PASSWORD);
    Ok(())
}
