//! Effects produced by flow transitions

use serde_json::Value;

/// Network calls to perform after a transition. The runtime spawns each
/// one and feeds the completion back in as an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// POST /onboarding/start
    CallStart { flow_id: String },

    /// POST /onboarding/answer against a specific session and node.
    CallAnswer {
        session_id: String,
        node_id: String,
        answer: Value,
    },
}
