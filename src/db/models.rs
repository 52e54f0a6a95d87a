use serde::{Deserialize, Serialize};

/// A chat message as kept in the local history table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredChatMessage {
    pub id: String,
    pub lecture_id: String,
    pub kind: String,
    pub text: String,
    /// JSON array of timed references, empty for user messages.
    pub references: String,
    pub created_at: String,
}
