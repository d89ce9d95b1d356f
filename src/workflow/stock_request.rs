//! Pharmacist-to-supplier restock pipeline.
//!
//! ```text
//! Pending --accept--> Accepted --ship--> (Shipped) --deliver--> Completed/Delivered
//! Pending --reject--> Rejected
//! ```
//!
//! Applying a delivered request to pharmacy stock is a separate step that
//! can happen once per request.

use std::fmt;
use std::str::FromStr;

use super::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Accepted => "Accepted",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Completed => "Completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Completed)
    }
}

impl FromStr for RequestStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(RequestStatus::Pending),
            "Accepted" => Ok(RequestStatus::Accepted),
            "Rejected" => Ok(RequestStatus::Rejected),
            "Completed" => Ok(RequestStatus::Completed),
            _ => Err(WorkflowError::UnknownValue {
                kind: "stock request status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    NotShipped,
    Shipped,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::NotShipped => "NotShipped",
            DeliveryStatus::Shipped => "Shipped",
            DeliveryStatus::Delivered => "Delivered",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotShipped" => Ok(DeliveryStatus::NotShipped),
            "Shipped" => Ok(DeliveryStatus::Shipped),
            "Delivered" => Ok(DeliveryStatus::Delivered),
            _ => Err(WorkflowError::UnknownValue {
                kind: "delivery status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutable part of a stock request row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestState {
    pub status: RequestStatus,
    pub delivery: DeliveryStatus,
    pub applied_to_inventory: bool,
}

impl RequestState {
    pub fn new() -> Self {
        Self {
            status: RequestStatus::Pending,
            delivery: DeliveryStatus::NotShipped,
            applied_to_inventory: false,
        }
    }

    /// Parses the text columns stored in `stock_requests`.
    pub fn from_columns(
        status: &str,
        delivery_status: &str,
        applied_to_inventory: bool,
    ) -> Result<Self, WorkflowError> {
        Ok(Self {
            status: status.parse()?,
            delivery: delivery_status.parse()?,
            applied_to_inventory,
        })
    }

    fn refuse(&self, action: &'static str) -> WorkflowError {
        let from = match self.status {
            RequestStatus::Accepted => format!("{} ({})", self.status, self.delivery),
            _ => self.status.to_string(),
        };
        WorkflowError::InvalidTransition {
            entity: "stock request",
            from,
            action,
        }
    }

    /// Accepting reserves stock from the supplier, so the supplier's
    /// `available` quantity must cover `requested`.
    pub fn accept(self, available: i32, requested: i32) -> Result<Self, WorkflowError> {
        if self.status != RequestStatus::Pending {
            return Err(self.refuse("accept"));
        }
        if available < requested {
            return Err(WorkflowError::InsufficientStock {
                available,
                requested,
            });
        }
        Ok(Self {
            status: RequestStatus::Accepted,
            ..self
        })
    }

    pub fn reject(self) -> Result<Self, WorkflowError> {
        if self.status != RequestStatus::Pending {
            return Err(self.refuse("reject"));
        }
        Ok(Self {
            status: RequestStatus::Rejected,
            ..self
        })
    }

    pub fn ship(self) -> Result<Self, WorkflowError> {
        if self.status != RequestStatus::Accepted || self.delivery != DeliveryStatus::NotShipped {
            return Err(self.refuse("ship"));
        }
        Ok(Self {
            delivery: DeliveryStatus::Shipped,
            ..self
        })
    }

    pub fn deliver(self) -> Result<Self, WorkflowError> {
        if self.status != RequestStatus::Accepted || self.delivery != DeliveryStatus::Shipped {
            return Err(self.refuse("deliver"));
        }
        Ok(Self {
            status: RequestStatus::Completed,
            delivery: DeliveryStatus::Delivered,
            ..self
        })
    }

    /// Marks the delivered quantity as booked into pharmacy stock.
    pub fn apply_to_inventory(self) -> Result<Self, WorkflowError> {
        if self.delivery != DeliveryStatus::Delivered {
            return Err(WorkflowError::NotDelivered);
        }
        if self.applied_to_inventory {
            return Err(WorkflowError::AlreadyApplied);
        }
        Ok(Self {
            applied_to_inventory: true,
            ..self
        })
    }
}

impl Default for RequestState {
    fn default() -> Self {
        Self::new()
    }
}
