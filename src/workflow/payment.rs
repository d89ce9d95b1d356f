use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::prescription::PrescriptionStatus;
use super::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Card,
    Upi,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" | "credit card" | "debit card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "cod" | "cash" | "cash on delivery" => Ok(PaymentMethod::CashOnDelivery),
            _ => Err(WorkflowError::UnknownValue {
                kind: "payment method",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the card digits to store. Card payments need exactly four ASCII
/// digits; other methods store nothing.
pub fn card_digits(
    method: PaymentMethod,
    card_last_four: Option<&str>,
) -> Result<Option<String>, WorkflowError> {
    match method {
        PaymentMethod::Card => match card_last_four.map(str::trim) {
            Some(digits) if digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(Some(digits.to_string()))
            }
            _ => Err(WorkflowError::InvalidCardDigits),
        },
        _ => Ok(None),
    }
}

/// Payment is only allowed once the order's linked prescription has been
/// verified and the amount covers the order total exactly.
pub fn authorize(
    linked_prescription: Option<PrescriptionStatus>,
    order_total: Decimal,
    amount: Decimal,
) -> Result<(), WorkflowError> {
    match linked_prescription {
        None => return Err(WorkflowError::NoLinkedPrescription),
        Some(PrescriptionStatus::Verified) => {}
        Some(other) => return Err(WorkflowError::PrescriptionNotVerified(other.to_string())),
    }
    if amount != order_total {
        return Err(WorkflowError::AmountMismatch {
            expected: order_total,
            actual: amount,
        });
    }
    Ok(())
}
