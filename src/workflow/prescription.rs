use std::fmt;
use std::str::FromStr;

use super::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrescriptionStatus {
    Pending,
    Verified,
    Rejected,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionStatus::Pending => "Pending",
            PrescriptionStatus::Verified => "Verified",
            PrescriptionStatus::Rejected => "Rejected",
        }
    }

    /// A doctor's decision on a pending prescription. `decision` has to be a
    /// final status; asking to "verify" something back to Pending is refused.
    pub fn decide(self, decision: PrescriptionStatus) -> Result<PrescriptionStatus, WorkflowError> {
        if decision == PrescriptionStatus::Pending {
            return Err(WorkflowError::InvalidDecision);
        }
        if self != PrescriptionStatus::Pending {
            return Err(WorkflowError::InvalidTransition {
                entity: "prescription",
                from: self.to_string(),
                action: "review",
            });
        }
        Ok(decision)
    }

    /// Patients may edit, relink or delete a prescription until a doctor has
    /// looked at it.
    pub fn ensure_editable(self) -> Result<(), WorkflowError> {
        match self {
            PrescriptionStatus::Pending => Ok(()),
            _ => Err(WorkflowError::PrescriptionLocked),
        }
    }
}

impl FromStr for PrescriptionStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PrescriptionStatus::Pending),
            "Verified" => Ok(PrescriptionStatus::Verified),
            "Rejected" => Ok(PrescriptionStatus::Rejected),
            _ => Err(WorkflowError::UnknownValue {
                kind: "prescription status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order can take a prescription only if it is one of the patient's
/// orders that has none yet. `eligible` is that list of order ids.
pub fn ensure_order_eligible(order_id: i32, eligible: &[i32]) -> Result<(), WorkflowError> {
    if eligible.contains(&order_id) {
        Ok(())
    } else {
        Err(WorkflowError::OrderNotEligible(order_id))
    }
}

/// Default doctor note stored alongside a decision when none is given.
pub fn default_review_note(decision: PrescriptionStatus) -> &'static str {
    match decision {
        PrescriptionStatus::Rejected => "Prescription needs review",
        _ => "Verified by doctor",
    }
}
