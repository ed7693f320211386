//! Events that drive flow transitions

use crate::client::{AnswerOutcome, FlowError, StartOutcome};
use serde_json::Value;

/// Events that trigger phase transitions: user intents from the renderer
/// and completions of network calls the runtime spawned.
#[derive(Debug, Clone)]
pub enum Event {
    // User intents
    /// Begin the flow (issued once at launch).
    StartFlow,
    /// Submit the collected answer for the current node.
    SubmitAnswer { answer: Value },
    /// Discard the session and start over with the original flow id.
    Restart,

    // Network completions
    StartCompleted {
        outcome: StartOutcome,
    },
    StartFailed {
        error: FlowError,
    },
    /// Carries the identity the call was issued against so stale
    /// responses can be told apart from current ones.
    AnswerCompleted {
        session_id: String,
        node_id: String,
        outcome: AnswerOutcome,
    },
    AnswerFailed {
        session_id: String,
        node_id: String,
        error: FlowError,
    },
}

impl Event {
    /// Short tag for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Event::StartFlow => "start_flow",
            Event::SubmitAnswer { .. } => "submit_answer",
            Event::Restart => "restart",
            Event::StartCompleted { .. } => "start_completed",
            Event::StartFailed { .. } => "start_failed",
            Event::AnswerCompleted { .. } => "answer_completed",
            Event::AnswerFailed { .. } => "answer_failed",
        }
    }
}
