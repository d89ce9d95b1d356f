use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Supplier {
    pub supplier_id: i32,
    pub user_id: Option<i32>,
    pub company_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Medicine {
    pub medicine_id: i32,
    pub supplier_id: Option<i32>,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub expiry_date: Option<NaiveDate>,
    pub image_url: Option<String>,
}

/// A cart row joined with the medicine it points at.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct CartLine {
    pub cart_item_id: i32,
    pub user_id: i32,
    pub medicine_id: i32,
    pub quantity: i32,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Order {
    pub order_id: i32,
    pub user_id: i32,
    pub total_price: Decimal,
    pub delivery_address: String,
    pub status: String,
    pub prescription_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct OrderItem {
    pub order_item_id: i32,
    pub order_id: i32,
    pub medicine_id: i32,
    pub medicine_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// An order as the patient dashboard shows it: line items plus whatever
/// prescription and payment hang off it.
#[derive(Serialize, Debug, Clone)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub prescription_status: Option<String>,
    pub payment_id: Option<i32>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Prescription {
    pub prescription_id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub order_id: Option<i32>,
    pub prescription_image: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub doctor_notes: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// A prescription with the patient and doctor names the dashboards show.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct PrescriptionView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub prescription: Prescription,
    pub patient_name: String,
    pub doctor_name: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Payment {
    pub payment_id: i32,
    pub order_id: i32,
    pub user_id: i32,
    pub amount: Decimal,
    pub method: String,
    pub card_last_four: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct InventoryItem {
    pub inventory_id: i32,
    pub supplier_id: i32,
    pub medicine_id: i32,
    pub medicine_name: String,
    pub quantity_available: i32,
    pub reorder_level: i32,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct StockRequest {
    pub request_id: i32,
    pub pharmacist_id: i32,
    pub supplier_id: i32,
    pub medicine_id: i32,
    pub medicine_name: String,
    pub quantity_requested: i32,
    pub status: String,
    pub delivery_status: String,
    pub notes: Option<String>,
    pub pharmacy_name: Option<String>,
    pub tracking_info: Option<String>,
    pub request_date: DateTime<Utc>,
    pub accepted_date: Option<DateTime<Utc>>,
    pub shipped_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub applied_to_inventory: bool,
}
