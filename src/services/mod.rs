use chrono::{NaiveDate, Utc};
use futures::future;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::utils::format_date;

/// How far ahead the expiry check looks.
pub const EXPIRY_WINDOW_DAYS: i64 = 180;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LowStockItem {
    pub company_name: String,
    pub medicine_name: String,
    pub quantity_available: i32,
    pub reorder_level: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct ExpiringMedicine {
    pub name: String,
    pub stock: i32,
    pub expiry_date: NaiveDate,
}

/// Schedules the stock alert job.
///
/// On every tick of `schedule` (a six-field cron expression) the job logs
/// supplier inventory at or below its reorder level and catalog medicines
/// expiring within [`EXPIRY_WINDOW_DAYS`].
pub async fn schedule_stock_alerts(
    pool: PgPool,
    schedule: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let sched = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let pool = pool.clone();
        Box::pin(async move {
            match check_stock_levels(&pool).await {
                Ok(alerts) => log::info!("Stock check completed with {} alert(s)", alerts),
                Err(e) => log::error!("Error checking stock levels: {}", e),
            }
        })
    })
    .map_err(|e| {
        log::error!("Failed to create job: {}", e);
        Box::new(e) as Box<dyn std::error::Error>
    })?;

    sched.add(job).await.map_err(|e| {
        log::error!("Failed to add job to scheduler: {}", e);
        Box::new(e) as Box<dyn std::error::Error>
    })?;

    tokio::spawn(async move {
        if let Err(e) = sched.start().await {
            log::error!("Scheduler error: {}", e);
        }
    });

    log::info!("Stock alert scheduler started ({})", schedule);
    Ok(())
}

/// Runs both checks concurrently and logs one warning per finding.
/// Returns how many warnings were written.
pub async fn check_stock_levels(pool: &PgPool) -> Result<usize, sqlx::Error> {
    let (low_stock, expiring) =
        future::try_join(fetch_low_stock(pool), fetch_expiring_medicines(pool)).await?;

    for item in &low_stock {
        log::warn!("{}", low_stock_message(item));
    }
    let today = Utc::now().date_naive();
    for medicine in &expiring {
        log::warn!("{}", expiry_message(medicine, today));
    }

    Ok(low_stock.len() + expiring.len())
}

async fn fetch_low_stock(pool: &PgPool) -> Result<Vec<LowStockItem>, sqlx::Error> {
    sqlx::query_as::<_, LowStockItem>(
        "SELECT s.company_name, m.name AS medicine_name, i.quantity_available, i.reorder_level
         FROM supplier_inventory i
         JOIN suppliers s ON s.supplier_id = i.supplier_id
         JOIN medicines m ON m.medicine_id = i.medicine_id
         WHERE i.quantity_available <= i.reorder_level
         ORDER BY i.quantity_available",
    )
    .fetch_all(pool)
    .await
}

async fn fetch_expiring_medicines(pool: &PgPool) -> Result<Vec<ExpiringMedicine>, sqlx::Error> {
    let cutoff = Utc::now().date_naive() + chrono::Duration::days(EXPIRY_WINDOW_DAYS);
    sqlx::query_as::<_, ExpiringMedicine>(
        "SELECT name, stock, expiry_date FROM medicines
         WHERE expiry_date IS NOT NULL AND expiry_date <= $1
         ORDER BY expiry_date",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

pub fn low_stock_message(item: &LowStockItem) -> String {
    format!(
        "Low stock: {} has {} unit(s) of {} left (reorder level {})",
        item.company_name, item.quantity_available, item.medicine_name, item.reorder_level
    )
}

pub fn expiry_message(medicine: &ExpiringMedicine, today: NaiveDate) -> String {
    let days = (medicine.expiry_date - today).num_days();
    if days < 0 {
        format!(
            "Expired: {} expired on {} ({} in stock)",
            medicine.name,
            format_date(medicine.expiry_date),
            medicine.stock
        )
    } else {
        format!(
            "Expiring: {} expires on {}, in {} day(s) ({} in stock)",
            medicine.name,
            format_date(medicine.expiry_date),
            days,
            medicine.stock
        )
    }
}
