//! Status rules for the two Pharmora workflows.
//!
//! Everything in here is free of I/O: handlers load rows, hand the current
//! statuses to these functions, and persist whatever comes back.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

pub mod order;
pub mod payment;
pub mod prescription;
pub mod stock_request;

#[derive(Error, Debug, PartialEq)]
pub enum WorkflowError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Please enter a delivery address")]
    MissingAddress,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Price must not be negative")]
    NegativePrice,
    #[error("Unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
    #[error("Cannot {action} a {entity} that is {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },
    #[error("Order {0} already has a linked prescription or does not belong to this patient")]
    OrderNotEligible(i32),
    #[error("Only pending prescriptions can be changed")]
    PrescriptionLocked,
    #[error("A prescription can only be verified or rejected")]
    InvalidDecision,
    #[error("Order has no linked prescription")]
    NoLinkedPrescription,
    #[error("Linked prescription is {0}, payment requires a verified prescription")]
    PrescriptionNotVerified(String),
    #[error("Payment amount {actual} does not match order total {expected}")]
    AmountMismatch { expected: Decimal, actual: Decimal },
    #[error("Card payments need the last four digits of the card")]
    InvalidCardDigits,
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },
    #[error("Stock request has not been delivered yet")]
    NotDelivered,
    #[error("Stock request has already been added to inventory")]
    AlreadyApplied,
}

/// The five kinds of account the SPA knows about. Stored in `users.role`
/// with the capitalisation below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Patient,
    Doctor,
    Pharmacist,
    Supplier,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::Pharmacist => "Pharmacist",
            Role::Supplier => "Supplier",
            Role::Admin => "Admin",
        }
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    // Case-insensitive: "doctor" and "Doctor" are the same role.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "pharmacist" => Ok(Role::Pharmacist),
            "supplier" => Ok(Role::Supplier),
            "admin" => Ok(Role::Admin),
            _ => Err(WorkflowError::UnknownValue {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
