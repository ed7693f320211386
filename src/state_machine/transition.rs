//! Pure phase transition function

use super::{Effect, Event, FlowConfig, FlowPhase};
use crate::client::FlowErrorKind;
use crate::flow::Session;
use thiserror::Error;

/// Result of a phase transition.
#[derive(Debug)]
pub struct TransitionResult {
    pub new_phase: FlowPhase,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(phase: FlowPhase) -> Self {
        Self {
            new_phase: phase,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Rejected events. The phase is unchanged and no effect is issued; the
/// runtime logs and drops these.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("A request is already in flight")]
    Busy,
    #[error("No active question to answer")]
    NoActiveNode,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function: given the same phase and event it always
/// produces the same outcome, with no I/O.
pub fn transition(
    phase: &FlowPhase,
    config: &FlowConfig,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (phase, event) {
        // ============================================================
        // Restart: safe from any phase, including mid-flight requests.
        // The runtime bumps its epoch so late completions of the old
        // session are discarded rather than cancelled.
        // ============================================================
        (_, Event::Restart) => Ok(TransitionResult::new(FlowPhase::Starting).with_effect(
            Effect::CallStart {
                flow_id: config.flow_id.clone(),
            },
        )),

        // ============================================================
        // Starting a session
        // ============================================================
        (FlowPhase::Idle, Event::StartFlow) => Ok(TransitionResult::new(FlowPhase::Starting)
            .with_effect(Effect::CallStart {
                flow_id: config.flow_id.clone(),
            })),

        (FlowPhase::Starting | FlowPhase::Submitting { .. }, Event::StartFlow) => {
            Err(TransitionError::Busy)
        }

        (_, Event::StartFlow) => Err(TransitionError::InvalidTransition(
            "flow already started; restart instead".to_string(),
        )),

        (FlowPhase::Starting, Event::StartCompleted { outcome }) => {
            Ok(TransitionResult::new(FlowPhase::AwaitingAnswer {
                session: Session {
                    session_id: outcome.session_id,
                    flow_id: config.flow_id.clone(),
                },
                node: outcome.node,
            }))
        }

        // A failed start leaves no partial session behind.
        (FlowPhase::Starting, Event::StartFailed { error }) => {
            Ok(TransitionResult::new(FlowPhase::Error {
                message: error.message,
                kind: error.kind,
                session: None,
                node: None,
            }))
        }

        // ============================================================
        // Submitting an answer
        // ============================================================
        (FlowPhase::AwaitingAnswer { session, node }, Event::SubmitAnswer { answer }) => {
            Ok(TransitionResult::new(FlowPhase::Submitting {
                session: session.clone(),
                node: node.clone(),
                answer: answer.clone(),
            })
            .with_effect(Effect::CallAnswer {
                session_id: session.session_id.clone(),
                node_id: node.id.clone(),
                answer,
            }))
        }

        // Retry after a failed submission: the preserved node is still
        // the active question.
        (
            FlowPhase::Error {
                session: Some(session),
                node: Some(node),
                ..
            },
            Event::SubmitAnswer { answer },
        ) => Ok(TransitionResult::new(FlowPhase::Submitting {
            session: session.clone(),
            node: node.clone(),
            answer: answer.clone(),
        })
        .with_effect(Effect::CallAnswer {
            session_id: session.session_id.clone(),
            node_id: node.id.clone(),
            answer,
        })),

        (FlowPhase::Starting | FlowPhase::Submitting { .. }, Event::SubmitAnswer { .. }) => {
            Err(TransitionError::Busy)
        }

        (_, Event::SubmitAnswer { .. }) => Err(TransitionError::NoActiveNode),

        // ============================================================
        // Answer completions, guarded on the identity the call was
        // issued against.
        // ============================================================
        (
            FlowPhase::Submitting { session, node, .. },
            Event::AnswerCompleted {
                session_id,
                node_id,
                outcome,
            },
        ) if session.session_id == session_id && node.id == node_id => {
            if outcome.done {
                match outcome.result {
                    Some(result) => Ok(TransitionResult::new(FlowPhase::Completed {
                        session: session.clone(),
                        result,
                    })),
                    // Terminal signal without a payload: surface it, keep
                    // the node so the user can retry.
                    None => Ok(TransitionResult::new(FlowPhase::Error {
                        message: "Flow completed without a result payload".to_string(),
                        kind: FlowErrorKind::MalformedResponse,
                        session: Some(session.clone()),
                        node: Some(node.clone()),
                    })),
                }
            } else {
                match outcome.node {
                    Some(next) => Ok(TransitionResult::new(FlowPhase::AwaitingAnswer {
                        session: session.clone(),
                        node: next,
                    })),
                    None => Ok(TransitionResult::new(FlowPhase::Error {
                        message: "Backend continued the flow without a next node".to_string(),
                        kind: FlowErrorKind::MalformedResponse,
                        session: Some(session.clone()),
                        node: Some(node.clone()),
                    })),
                }
            }
        }

        (
            FlowPhase::Submitting { session, node, .. },
            Event::AnswerFailed {
                session_id,
                node_id,
                error,
            },
        ) if session.session_id == session_id && node.id == node_id => {
            Ok(TransitionResult::new(FlowPhase::Error {
                message: error.message,
                kind: error.kind,
                session: Some(session.clone()),
                node: Some(node.clone()),
            }))
        }

        // Identity mismatch or a completion arriving in the wrong phase:
        // a stale response from a superseded session. Dropped.
        (phase, event @ (Event::AnswerCompleted { .. } | Event::AnswerFailed { .. })) => {
            Err(TransitionError::InvalidTransition(format!(
                "stale {} in phase {}",
                event.name(),
                phase.name()
            )))
        }

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "no transition from {} with {}",
            phase.name(),
            event.name()
        ))),
    }
}
