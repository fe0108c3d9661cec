use uuid::Uuid;

/// A collection touched by a committed write.
///
/// Sent on the [`Database`](crate::Database) change feed after every commit.
/// Live queries re-run when a change for the collection they watch arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    Profiles,
    Requests,
    Conversations,
    /// Messages of one conversation.
    Messages(Uuid),
}
