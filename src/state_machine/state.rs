//! Flow phase types

use crate::client::FlowErrorKind;
use crate::flow::{FlowResult, Node, Session, StepKey};
use serde_json::Value;

/// Immutable configuration for a flow run.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub flow_id: String,
}

impl FlowConfig {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
        }
    }
}

/// Phase of the client-held flow session.
///
/// Variants carry the data that is valid in that phase, so the core
/// invariant (a terminal result and a current node never coexist) holds
/// by construction rather than by bookkeeping.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FlowPhase {
    /// No session yet.
    #[default]
    Idle,

    /// Start request in flight.
    Starting,

    /// Session established, waiting for the user to answer the node.
    AwaitingAnswer { session: Session, node: Node },

    /// Answer request in flight; the node stays visible while saving.
    Submitting {
        session: Session,
        node: Node,
        answer: Value,
    },

    /// Backend signalled completion.
    Completed {
        session: Session,
        result: FlowResult,
    },

    /// A request failed. Submission failures preserve the session and node
    /// so the user can retry without losing position; start failures carry
    /// neither.
    Error {
        message: String,
        kind: FlowErrorKind,
        session: Option<Session>,
        node: Option<Node>,
    },
}

impl FlowPhase {
    /// Short tag for logging.
    pub fn name(&self) -> &'static str {
        match self {
            FlowPhase::Idle => "idle",
            FlowPhase::Starting => "starting",
            FlowPhase::AwaitingAnswer { .. } => "awaiting_answer",
            FlowPhase::Submitting { .. } => "submitting",
            FlowPhase::Completed { .. } => "completed",
            FlowPhase::Error { .. } => "error",
        }
    }

    /// A request is in flight; user actions other than restart are
    /// rejected rather than queued.
    pub fn is_busy(&self) -> bool {
        matches!(self, FlowPhase::Starting | FlowPhase::Submitting { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, FlowPhase::Completed { .. })
    }

    #[allow(dead_code)] // State query utility
    pub fn session(&self) -> Option<&Session> {
        match self {
            FlowPhase::AwaitingAnswer { session, .. }
            | FlowPhase::Submitting { session, .. }
            | FlowPhase::Completed { session, .. } => Some(session),
            FlowPhase::Error { session, .. } => session.as_ref(),
            FlowPhase::Idle | FlowPhase::Starting => None,
        }
    }

    pub fn current_node(&self) -> Option<&Node> {
        match self {
            FlowPhase::AwaitingAnswer { node, .. } | FlowPhase::Submitting { node, .. } => {
                Some(node)
            }
            FlowPhase::Error { node, .. } => node.as_ref(),
            FlowPhase::Idle | FlowPhase::Starting | FlowPhase::Completed { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&FlowResult> {
        match self {
            FlowPhase::Completed { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            FlowPhase::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Step key for progress display: the terminal step when done, the
    /// current node's step when one exists, the first step otherwise.
    pub fn active_step(&self) -> StepKey {
        if self.is_done() {
            return StepKey::Result;
        }
        self.current_node()
            .map(|n| n.meta.step_key())
            .unwrap_or(StepKey::AboutYou)
    }
}

/// Snapshot published to the renderer after every accepted event.
///
/// The renderer only reads; the runtime is the sole writer.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub phase: FlowPhase,
    /// Backend-computed accumulated variables, replaced wholesale on every
    /// answer response. Opaque to the client.
    pub context: Option<Value>,
}

impl ViewState {
    pub fn busy(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn done(&self) -> bool {
        self.phase.is_done()
    }

    pub fn current_node(&self) -> Option<&Node> {
        self.phase.current_node()
    }

    pub fn result(&self) -> Option<&FlowResult> {
        self.phase.result()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.phase.last_error()
    }

    pub fn error_kind(&self) -> Option<FlowErrorKind> {
        match &self.phase {
            FlowPhase::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn active_step(&self) -> StepKey {
        self.phase.active_step()
    }
}
