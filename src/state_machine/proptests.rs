//! Property-based tests for the flow state machine
//!
//! These verify the view invariants hold across all phases and that
//! guarded events never slip through.

use super::state::*;
use super::transition::*;
use super::*;
use crate::client::{AnswerOutcome, FlowError, FlowErrorKind, StartOutcome};
use crate::flow::{FlowResult, Node, ResultSummary, Session, StepKey, UiOption, UiSpec};
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Generators
// ============================================================================

fn arb_step() -> impl Strategy<Value = StepKey> {
    prop_oneof![
        Just(StepKey::AboutYou),
        Just(StepKey::Interests),
        Just(StepKey::Personality),
        Just(StepKey::StudyPlan),
        Just(StepKey::Result),
    ]
}

fn arb_option() -> impl Strategy<Value = UiOption> {
    ("[a-z]{1,8}", "[A-Za-z ]{1,12}").prop_map(|(id, label)| UiOption {
        id,
        label,
        description: None,
    })
}

fn arb_node() -> impl Strategy<Value = Node> {
    (
        "[a-z0-9]{1,8}",
        arb_step(),
        proptest::collection::vec(arb_option(), 0..4),
    )
        .prop_map(|(id, step, options)| Node {
            id,
            ui: UiSpec {
                question_text: "Q?".to_string(),
                description: None,
                input_type: "single_choice".to_string(),
                options,
                placeholder: None,
            },
            meta: crate::flow::NodeMeta {
                step: Some(step),
                label: None,
            },
        })
}

fn arb_session() -> impl Strategy<Value = Session> {
    "[a-z0-9]{4,12}".prop_map(|session_id| Session {
        session_id,
        flow_id: "career_onboarding_v1".to_string(),
    })
}

fn arb_result() -> impl Strategy<Value = FlowResult> {
    proptest::collection::vec("[a-z]{1,10}", 0..4).prop_map(|top_traits| FlowResult {
        summary: ResultSummary {
            top_traits,
            variables: serde_json::Map::new(),
            answers: serde_json::Map::new(),
        },
        renderer: None,
        recommendations: None,
    })
}

fn arb_error_kind() -> impl Strategy<Value = FlowErrorKind> {
    prop_oneof![
        Just(FlowErrorKind::Configuration),
        Just(FlowErrorKind::Transport),
        Just(FlowErrorKind::Backend),
        Just(FlowErrorKind::MalformedResponse),
        Just(FlowErrorKind::SessionNotFound),
    ]
}

fn arb_phase() -> impl Strategy<Value = FlowPhase> {
    prop_oneof![
        Just(FlowPhase::Idle),
        Just(FlowPhase::Starting),
        (arb_session(), arb_node())
            .prop_map(|(session, node)| FlowPhase::AwaitingAnswer { session, node }),
        (arb_session(), arb_node()).prop_map(|(session, node)| FlowPhase::Submitting {
            session,
            node,
            answer: json!("a"),
        }),
        (arb_session(), arb_result())
            .prop_map(|(session, result)| FlowPhase::Completed { session, result }),
        (
            "[a-z ]{1,20}",
            arb_error_kind(),
            proptest::option::of((arb_session(), arb_node()))
        )
            .prop_map(|(message, kind, kept)| {
                let (session, node) = match kept {
                    Some((s, n)) => (Some(s), Some(n)),
                    None => (None, None),
                };
                FlowPhase::Error {
                    message,
                    kind,
                    session,
                    node,
                }
            }),
    ]
}

fn arb_answer_outcome() -> impl Strategy<Value = AnswerOutcome> {
    prop_oneof![
        arb_node().prop_map(|node| AnswerOutcome {
            done: false,
            node: Some(node),
            context: Some(json!({"variables": {}})),
            result: None,
        }),
        arb_result().prop_map(|result| AnswerOutcome {
            done: true,
            node: None,
            context: None,
            result: Some(result),
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::StartFlow),
        Just(Event::Restart),
        "[a-z]{1,6}".prop_map(|a| Event::SubmitAnswer {
            answer: Value::String(a)
        }),
        (arb_session(), arb_node()).prop_map(|(s, node)| Event::StartCompleted {
            outcome: StartOutcome {
                session_id: s.session_id,
                node,
            },
        }),
        Just(Event::StartFailed {
            error: FlowError::transport("connection refused"),
        }),
        ("[a-z0-9]{1,8}", "[a-z0-9]{1,8}", arb_answer_outcome()).prop_map(
            |(session_id, node_id, outcome)| Event::AnswerCompleted {
                session_id,
                node_id,
                outcome,
            }
        ),
        ("[a-z0-9]{1,8}", "[a-z0-9]{1,8}").prop_map(|(session_id, node_id)| {
            Event::AnswerFailed {
                session_id,
                node_id,
                error: FlowError::backend(500, "Internal error", "{}"),
            }
        }),
    ]
}

fn config() -> FlowConfig {
    FlowConfig::new("career_onboarding_v1")
}

/// The core view invariant, checked through the accessors the
/// renderer actually uses.
fn view_invariant_holds(phase: &FlowPhase) -> bool {
    let done = phase.is_done();
    let has_result = phase.result().is_some();
    let has_node = phase.current_node().is_some();

    done == has_result && (!done || !has_node)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Every phase reachable through any transition keeps the done/result/
    /// node invariant.
    #[test]
    fn transitions_preserve_view_invariant(phase in arb_phase(), event in arb_event()) {
        prop_assert!(view_invariant_holds(&phase));
        if let Ok(result) = transition(&phase, &config(), event) {
            prop_assert!(view_invariant_holds(&result.new_phase));
        }
    }

    /// Submitting while a request is in flight is rejected without effects.
    #[test]
    fn busy_phases_reject_submission(answer in "[a-z]{1,6}") {
        for phase in [FlowPhase::Starting] {
            let result = transition(
                &phase,
                &config(),
                Event::SubmitAnswer { answer: Value::String(answer.clone()) },
            );
            prop_assert!(matches!(result, Err(TransitionError::Busy)));
        }
    }

    /// Submission without a current node never issues a network call.
    #[test]
    fn submission_requires_a_node(phase in arb_phase(), answer in "[a-z]{1,6}") {
        let had_node = phase.current_node().is_some();
        let was_busy = phase.is_busy();
        let result = transition(
            &phase,
            &config(),
            Event::SubmitAnswer { answer: Value::String(answer) },
        );

        match result {
            Ok(r) => {
                prop_assert!(had_node && !was_busy);
                prop_assert_eq!(r.effects.len(), 1);
            }
            Err(TransitionError::Busy) => prop_assert!(was_busy),
            Err(_) => prop_assert!(!had_node),
        }
    }

    /// Restart is accepted from every phase and always issues exactly one
    /// start call for the original flow id.
    #[test]
    fn restart_always_restarts(phase in arb_phase()) {
        let result = transition(&phase, &config(), Event::Restart).unwrap();
        prop_assert!(matches!(result.new_phase, FlowPhase::Starting));
        prop_assert_eq!(result.effects, vec![Effect::CallStart {
            flow_id: "career_onboarding_v1".to_string(),
        }]);
    }

    /// Answer completions only land in a submitting phase with matching
    /// identity; everything else is rejected as stale.
    #[test]
    fn mismatched_completions_are_stale(
        phase in arb_phase(),
        session_id in "[a-z0-9]{1,8}",
        node_id in "[a-z0-9]{1,8}",
        outcome in arb_answer_outcome(),
    ) {
        let matches_identity = match &phase {
            FlowPhase::Submitting { session, node, .. } => {
                session.session_id == session_id && node.id == node_id
            }
            _ => false,
        };

        let result = transition(
            &phase,
            &config(),
            Event::AnswerCompleted { session_id, node_id, outcome },
        );

        if matches_identity {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(TransitionError::InvalidTransition(_))));
        }
    }
}
