//! Pipeline input and outcome types.
//!
//! The orchestrator never talks to the chat platform directly: it returns a
//! `PipelineOutcome` and the transport executes it (delete the platform
//! message, send a reply, and so on).

/// A message as received from the chat transport, before any persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub platform_user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub platform_message_id: i64,
    pub chat_id: i64,
    pub text: String,
}

/// What the transport should do after the pipeline ran.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Sender is an admin or mentor; nothing was run or stored.
    Skipped,
    /// Moderation flagged the message; the transport must delete it.
    Deleted {
        category: String,
        confidence: f32,
        reason: String,
    },
    /// A stored FAQ answered the question; reply with the formatted text.
    FaqReply { text: String, similarity: f32 },
    /// Mentors were tagged; post the mention text as a reply.
    MentorsPaged {
        mention_text: String,
        mentor_count: usize,
    },
    /// All three stages passed through; the message stands as-is.
    NoAction,
}
