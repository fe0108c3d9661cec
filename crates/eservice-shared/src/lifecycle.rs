//! Request lifecycle and payment progression.
//!
//! Every status change a request can undergo is listed in
//! [`STATUS_TRANSITIONS`].  The client validates against this table before
//! writing, and the store re-checks the source state with a conditional
//! update, so an edge missing from the table can never be persisted.
//!
//! ```text
//! Pending --accept--> Accepted --start--> InProgress
//!    |                   |                    |
//!    |                   +-----complete-------+--> Completed
//!    +--decline--> Declined
//! ```

use crate::error::TransitionError;
use crate::types::{PaymentStatus, RequestStatus};

use RequestStatus::*;

/// Allowed `(from, to)` status pairs.
pub const STATUS_TRANSITIONS: &[(RequestStatus, RequestStatus)] = &[
    (Pending, Accepted),
    (Pending, Declined),
    (Accepted, InProgress),
    (Accepted, Completed),
    (InProgress, Completed),
];

impl RequestStatus {
    /// `Completed` and `Declined` admit no further status change.
    pub fn is_terminal(self) -> bool {
        !STATUS_TRANSITIONS.iter().any(|(from, _)| *from == self)
    }

    /// Statuses reachable from `self` in one step, in table order.
    pub fn successors(self) -> impl Iterator<Item = RequestStatus> {
        STATUS_TRANSITIONS
            .iter()
            .filter(move |(from, _)| *from == self)
            .map(|(_, to)| *to)
    }

    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        STATUS_TRANSITIONS.contains(&(self, next))
    }

    /// Validate `self -> next`, returning `next` on success.
    pub fn transition(self, next: RequestStatus) -> Result<RequestStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError::Status {
                from: self,
                to: next,
            })
        }
    }
}

impl PaymentStatus {
    /// The single status that may follow `self`, if any.
    pub fn next(self) -> Option<PaymentStatus> {
        match self {
            PaymentStatus::None => Some(PaymentStatus::Pending),
            PaymentStatus::Pending => Some(PaymentStatus::Paid),
            PaymentStatus::Paid => None,
        }
    }

    /// Validate a one-step advance to `next`.
    pub fn advance_to(self, next: PaymentStatus) -> Result<PaymentStatus, TransitionError> {
        if self.next() == Some(next) {
            Ok(next)
        } else {
            Err(TransitionError::Payment {
                from: self,
                to: next,
            })
        }
    }
}
