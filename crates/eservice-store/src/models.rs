//! Document shapes persisted in the local store.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names so it can be handed directly to a UI layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use eservice_shared::types::{
    Invoice, ParticipantInfo, PaymentStatus, Rating, RatingSide, RequestStatus, Role, Urgency,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Role-tagged display record of an identity.  The id is the identity id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: String,
    /// Present for technicians only.
    pub skills: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn participant_info(&self) -> ParticipantInfo {
        ParticipantInfo {
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Email/password credentials of an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: Uuid,
    pub email: String,
    /// Hex-encoded password hash.
    pub password_hash: String,
    /// Hex-encoded salt.
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ServiceRequest
// ---------------------------------------------------------------------------

/// A unit of service work submitted by a customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Set exactly once, when the request is accepted.
    pub assigned_technician_uid: Option<Uuid>,
    pub customer_name: String,
    pub customer_avatar: String,
    pub service_category: String,
    pub description: String,
    pub location: String,
    /// Scheduled visit.
    pub date_time: DateTime<Utc>,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub invoice: Option<Invoice>,
    pub payment_status: PaymentStatus,
    pub technician_rating: Option<Rating>,
    pub customer_rating: Option<Rating>,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn rating(&self, side: RatingSide) -> Option<&Rating> {
        match side {
            RatingSide::Customer => self.customer_rating.as_ref(),
            RatingSide::Technician => self.technician_rating.as_ref(),
        }
    }

    pub fn is_assigned_to(&self, technician: Uuid) -> bool {
        self.assigned_technician_uid == Some(technician)
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A two-party message thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    /// `[customer, technician]`.
    pub participant_uids: [Uuid; 2],
    pub participant_info: BTreeMap<Uuid, ParticipantInfo>,
    pub last_message_text: String,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn includes(&self, uid: Uuid) -> bool {
        self.participant_uids.contains(&uid)
    }

    /// The participant that is not `me`, with their cached display info.
    pub fn other_participant(&self, me: Uuid) -> Option<(Uuid, &ParticipantInfo)> {
        let other = self.participant_uids.iter().copied().find(|uid| *uid != me)?;
        self.participant_info.get(&other).map(|info| (other, info))
    }
}

/// A conversation about to be written; the store stamps `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub id: Uuid,
    pub participant_uids: [Uuid; 2],
    pub participant_info: BTreeMap<Uuid, ParticipantInfo>,
    pub last_message_text: String,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single thread message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_uid: Uuid,
    pub text: String,
    /// Assigned by the store.
    pub timestamp: DateTime<Utc>,
}

/// A message about to be appended; the store stamps `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_uid: Uuid,
    pub text: String,
}

impl NewMessage {
    pub fn new(conversation_id: Uuid, sender_uid: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_uid,
            text: text.into(),
        }
    }
}
