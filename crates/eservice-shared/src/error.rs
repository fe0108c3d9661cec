use thiserror::Error;

use crate::types::{PaymentStatus, RequestStatus};

/// A state change rejected by the transition table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Request cannot move from {from} to {to}")]
    Status {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Payment cannot move from {from} to {to}")]
    Payment {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

/// Input rejected before it reaches the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Blank(&'static str),

    #[error("Invoice must contain at least one item")]
    EmptyInvoice,

    #[error("Invoice item {index} has no description")]
    UnnamedItem { index: usize },

    #[error("Invoice item {index} has an invalid cost: {cost}")]
    InvalidCost { index: usize, cost: f64 },

    #[error("Invoice total {total} does not match the item sum {sum}")]
    TotalMismatch { total: f64, sum: f64 },

    #[error("Rating must be between 1 and 5 stars, got {0}")]
    Stars(u8),

    #[error("Please select at least one skill")]
    MissingSkills,

    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    #[error("Only technicians can list skills")]
    UnexpectedSkills,
}

/// A persisted enum label that does not name any variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
