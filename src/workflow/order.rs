use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
        }
    }

    /// Orders only move forward, one step at a time.
    pub fn advance_to(self, next: OrderStatus) -> Result<OrderStatus, WorkflowError> {
        match (self, next) {
            (OrderStatus::Processing, OrderStatus::Shipped)
            | (OrderStatus::Shipped, OrderStatus::Delivered) => Ok(next),
            _ => Err(WorkflowError::InvalidTransition {
                entity: "order",
                from: self.to_string(),
                action: match next {
                    OrderStatus::Processing => "reopen",
                    OrderStatus::Shipped => "ship",
                    OrderStatus::Delivered => "deliver",
                },
            }),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(OrderStatus::Processing),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Delivered" => Ok(OrderStatus::Delivered),
            _ => Err(WorkflowError::UnknownValue {
                kind: "order status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cart line as it is priced at checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub medicine_id: i32,
    pub quantity: i32,
    pub price: Decimal,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Checks the delivery address on its own so handlers can refuse a blank
/// address before touching the cart.
pub fn validate_address(address: &str) -> Result<&str, WorkflowError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::MissingAddress);
    }
    Ok(trimmed)
}

/// Validates a checkout and returns the order total.
///
/// # Arguments
///
/// * `items` - The cart lines being turned into an order
/// * `address` - The delivery address entered by the patient
///
/// # Returns
///
/// The sum of every line's `price * quantity`.
pub fn checkout_total(items: &[LineItem], address: &str) -> Result<Decimal, WorkflowError> {
    if items.is_empty() {
        return Err(WorkflowError::EmptyCart);
    }
    validate_address(address)?;

    let mut total = Decimal::ZERO;
    for item in items {
        if item.quantity < 1 {
            return Err(WorkflowError::InvalidQuantity);
        }
        if item.price.is_sign_negative() {
            return Err(WorkflowError::NegativePrice);
        }
        total += item.subtotal();
    }
    Ok(total)
}
