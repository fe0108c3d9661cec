//! Pure derivations the dashboards render from a request snapshot.

use std::cmp::Reverse;

use eservice_shared::types::{PaymentStatus, RequestStatus, Urgency};
use eservice_store::{Conversation, ServiceRequest};
use serde::Serialize;
use uuid::Uuid;

/// Status label shown to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusBadge {
    Status(RequestStatus),
    AwaitingInvoice,
    PaymentDue,
    PaidAndCompleted,
}

impl StatusBadge {
    pub fn for_request(request: &ServiceRequest) -> Self {
        match (request.status, request.payment_status) {
            (RequestStatus::Completed, PaymentStatus::None) => Self::AwaitingInvoice,
            (RequestStatus::Completed, PaymentStatus::Pending) => Self::PaymentDue,
            (RequestStatus::Completed, PaymentStatus::Paid) => Self::PaidAndCompleted,
            (status, _) => Self::Status(status),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Status(status) => status.as_str(),
            Self::AwaitingInvoice => "Awaiting Invoice",
            Self::PaymentDue => "Payment Due",
            Self::PaidAndCompleted => "Paid & Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CustomerAction {
    MarkCompleted,
    PayInvoice,
    RateTechnician,
}

/// What the owning customer can do next, if anything.
pub fn customer_action(request: &ServiceRequest) -> Option<CustomerAction> {
    match (request.status, request.payment_status) {
        (RequestStatus::Accepted | RequestStatus::InProgress, _) => {
            Some(CustomerAction::MarkCompleted)
        }
        (RequestStatus::Completed, PaymentStatus::Pending) => Some(CustomerAction::PayInvoice),
        (RequestStatus::Completed, PaymentStatus::Paid) if request.customer_rating.is_none() => {
            Some(CustomerAction::RateTechnician)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TechnicianAction {
    Accept,
    Decline,
    CreateInvoice,
    /// Informational; nothing to do until the customer pays.
    AwaitingPayment,
    RateCustomer,
}

/// What technician `me` can do with `request`.
///
/// Any technician may pick up a pending request; billing and rating are
/// offered to the assignee only.
pub fn technician_actions(request: &ServiceRequest, me: Uuid) -> Vec<TechnicianAction> {
    match request.status {
        RequestStatus::Pending => vec![TechnicianAction::Accept, TechnicianAction::Decline],
        RequestStatus::Completed if request.is_assigned_to(me) => {
            match request.payment_status {
                PaymentStatus::None => vec![TechnicianAction::CreateInvoice],
                PaymentStatus::Pending => vec![TechnicianAction::AwaitingPayment],
                PaymentStatus::Paid if request.technician_rating.is_none() => {
                    vec![TechnicianAction::RateCustomer]
                }
                PaymentStatus::Paid => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub pending: usize,
    pub accepted: usize,
    pub completed_and_paid: usize,
    pub total: usize,
}

impl DashboardStats {
    pub fn from_requests(requests: &[ServiceRequest]) -> Self {
        let count = |f: &dyn Fn(&ServiceRequest) -> bool| requests.iter().filter(|r| f(r)).count();
        Self {
            pending: count(&|r| r.status == RequestStatus::Pending),
            accepted: count(&|r| r.status == RequestStatus::Accepted),
            completed_and_paid: count(&|r| {
                r.status == RequestStatus::Completed && r.payment_status == PaymentStatus::Paid
            }),
            total: requests.len(),
        }
    }
}

/// Status and urgency filter; `None` matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub urgency: Option<Urgency>,
}

impl RequestFilter {
    pub fn matches(&self, request: &ServiceRequest) -> bool {
        self.status.map_or(true, |s| request.status == s)
            && self.urgency.map_or(true, |u| request.urgency == u)
    }

    /// Matching requests, latest scheduled date first.
    pub fn apply<'a>(&self, requests: &'a [ServiceRequest]) -> Vec<&'a ServiceRequest> {
        let mut out: Vec<_> = requests.iter().filter(|r| self.matches(r)).collect();
        out.sort_by_key(|r| Reverse(r.date_time));
        out
    }
}

/// Upcoming work: accepted or in-progress requests, soonest first.
pub fn schedule(requests: &[ServiceRequest]) -> Vec<&ServiceRequest> {
    let mut out: Vec<_> = requests
        .iter()
        .filter(|r| matches!(r.status, RequestStatus::Accepted | RequestStatus::InProgress))
        .collect();
    out.sort_by_key(|r| r.date_time);
    out
}

/// Display name and avatar of whoever `me` is talking to.
pub fn other_participant(conversation: &Conversation, me: Uuid) -> Option<(&str, &str)> {
    conversation
        .other_participant(me)
        .map(|(_, info)| (info.full_name.as_str(), info.avatar_url.as_str()))
}
