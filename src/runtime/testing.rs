//! Mock flow service and async harness for runtime tests

use crate::client::{AnswerOutcome, FlowError, FlowService, StartOutcome};
use crate::flow::Node;
use crate::runtime::{FlowHandle, FlowRuntime};
use crate::state_machine::{FlowConfig, ViewState};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

// ============================================================================
// Mock Flow Service
// ============================================================================

/// Mock flow service that returns queued outcomes and records every
/// request it receives.
pub struct MockFlowService {
    starts: Mutex<VecDeque<Result<StartOutcome, FlowError>>>,
    answers: Mutex<VecDeque<Result<AnswerOutcome, FlowError>>>,
    answer_delay: Option<Duration>,
    /// Record of start requests (flow ids).
    pub start_requests: Mutex<Vec<String>>,
    /// Record of answer requests as (session_id, node_id, answer).
    pub answer_requests: Mutex<Vec<(String, String, Value)>>,
}

impl MockFlowService {
    pub fn new() -> Self {
        Self {
            starts: Mutex::new(VecDeque::new()),
            answers: Mutex::new(VecDeque::new()),
            answer_delay: None,
            start_requests: Mutex::new(Vec::new()),
            answer_requests: Mutex::new(Vec::new()),
        }
    }

    /// Delay answer calls, to hold a submission in flight while the test
    /// races a second intent against it.
    pub fn with_answer_delay(mut self, delay: Duration) -> Self {
        self.answer_delay = Some(delay);
        self
    }

    pub fn queue_start(&self, outcome: Result<StartOutcome, FlowError>) {
        self.starts.lock().unwrap().push_back(outcome);
    }

    pub fn queue_answer(&self, outcome: Result<AnswerOutcome, FlowError>) {
        self.answers.lock().unwrap().push_back(outcome);
    }

    pub fn recorded_answers(&self) -> Vec<(String, String, Value)> {
        self.answer_requests.lock().unwrap().clone()
    }
}

impl Default for MockFlowService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowService for MockFlowService {
    async fn start(&self, flow_id: &str) -> Result<StartOutcome, FlowError> {
        self.start_requests
            .lock()
            .unwrap()
            .push(flow_id.to_string());
        self.starts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FlowError::transport("No mock start queued")))
    }

    async fn submit_answer(
        &self,
        session_id: &str,
        node_id: &str,
        answer: &Value,
    ) -> Result<AnswerOutcome, FlowError> {
        self.answer_requests.lock().unwrap().push((
            session_id.to_string(),
            node_id.to_string(),
            answer.clone(),
        ));
        if let Some(delay) = self.answer_delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FlowError::transport("No mock answer queued")))
    }
}

// ============================================================================
// Test Harness
// ============================================================================

pub fn test_node(id: &str, step: &str) -> Node {
    serde_json::from_value(json!({
        "id": id,
        "ui": {
            "question_text": "Pick one",
            "input_type": "single_choice",
            "options": [{"id": "a", "label": "A"}, {"id": "b", "label": "B"}]
        },
        "meta": {"step": step}
    }))
    .unwrap()
}

pub fn start_ok(session_id: &str, node: Node) -> Result<StartOutcome, FlowError> {
    Ok(StartOutcome {
        session_id: session_id.to_string(),
        node,
    })
}

pub fn answer_next(node: Node) -> Result<AnswerOutcome, FlowError> {
    Ok(AnswerOutcome {
        done: false,
        node: Some(node),
        context: Some(json!({"variables": {}})),
        result: None,
    })
}

pub fn answer_done(top_traits: &[&str]) -> Result<AnswerOutcome, FlowError> {
    Ok(AnswerOutcome {
        done: true,
        node: None,
        context: Some(json!({"variables": {"goal": "engineering"}})),
        result: Some(
            serde_json::from_value(json!({
                "summary": {
                    "top_traits": top_traits,
                    "variables": {"goal": "engineering"},
                    "answers": {"n1": "a"}
                }
            }))
            .unwrap(),
        ),
    })
}

/// Runtime over a mock service, with wait-for-snapshot helpers.
pub struct TestFlow {
    pub handle: FlowHandle,
    pub service: Arc<MockFlowService>,
    view: watch::Receiver<ViewState>,
}

impl TestFlow {
    pub fn new(service: MockFlowService) -> Self {
        let service = Arc::new(service);
        let handle = FlowRuntime::spawn(FlowConfig::new("career_onboarding_v1"), service.clone());
        let view = handle.subscribe();
        Self {
            handle,
            service,
            view,
        }
    }

    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    /// Wait until the published snapshot satisfies the predicate.
    pub async fn wait_for(
        &mut self,
        pred: impl Fn(&ViewState) -> bool,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.view();
            if pred(&snapshot) {
                return true;
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return false;
            }
            match tokio::time::timeout(deadline - now, self.view.changed()).await {
                Ok(Ok(())) => continue,
                _ => return false,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::FlowPhase;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn happy_path_advances_through_nodes() {
        let service = MockFlowService::new();
        service.queue_start(start_ok("s1", test_node("n1", "about_you")));
        service.queue_answer(answer_next(test_node("n2", "interests")));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;

        assert!(
            flow.wait_for(
                |v| v.current_node().map(|n| n.id.as_str()) == Some("n1"),
                WAIT
            )
            .await
        );
        assert_eq!(flow.view().active_step().position(), 0);

        flow.handle.submit_answer(json!("a")).await;
        assert!(
            flow.wait_for(
                |v| v.current_node().map(|n| n.id.as_str()) == Some("n2") && !v.busy(),
                WAIT
            )
            .await
        );

        assert_eq!(flow.view().active_step().position(), 1);
        assert_eq!(
            flow.service.recorded_answers(),
            vec![("s1".to_string(), "n1".to_string(), json!("a"))]
        );
    }

    #[tokio::test]
    async fn final_answer_yields_result_and_clears_node() {
        let service = MockFlowService::new();
        service.queue_start(start_ok("s1", test_node("n1", "study_plan")));
        service.queue_answer(answer_done(&["analytical"]));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;
        assert!(flow.wait_for(|v| v.current_node().is_some(), WAIT).await);

        flow.handle.submit_answer(json!("a")).await;
        assert!(flow.wait_for(ViewState::done, WAIT).await);

        let view = flow.view();
        assert!(view.current_node().is_none());
        assert_eq!(view.result().unwrap().summary.top_traits, vec!["analytical"]);
        assert!(view.context.is_some());
    }

    #[tokio::test]
    async fn malformed_body_sets_error_and_keeps_node() {
        let service = MockFlowService::new();
        service.queue_start(start_ok("s1", test_node("n1", "about_you")));
        service.queue_answer(Err(FlowError::malformed("not-json")));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;
        assert!(flow.wait_for(|v| v.current_node().is_some(), WAIT).await);

        flow.handle.submit_answer(json!("a")).await;
        assert!(
            flow.wait_for(
                |v| v.last_error().is_some_and(|e| e.contains("not-json")),
                WAIT
            )
            .await
        );

        // The node survives the failure so the user can retry in place.
        assert_eq!(
            flow.view().current_node().map(|n| n.id.as_str()),
            Some("n1")
        );
        assert!(!flow.view().done());
    }

    #[tokio::test]
    async fn start_failure_leaves_no_partial_session() {
        let service = MockFlowService::new();
        service.queue_start(Err(FlowError::transport("Connection failed")));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;

        assert!(flow.wait_for(|v| v.last_error().is_some(), WAIT).await);
        let view = flow.view();
        assert!(view.current_node().is_none());
        assert!(view.phase.session().is_none());

        // Without a node there is nothing to answer: the intent is dropped
        // and no network call goes out.
        flow.handle.submit_answer(json!("a")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(flow.service.recorded_answers().is_empty());
    }

    #[tokio::test]
    async fn proxy_misconfiguration_surfaces_without_crashing() {
        let service = MockFlowService::new();
        service.queue_start(Err(FlowError::configuration(
            "ONBOARDING_API_BASE not configured",
        )));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;

        assert!(
            flow.wait_for(
                |v| v.last_error() == Some("ONBOARDING_API_BASE not configured"),
                WAIT
            )
            .await
        );
        assert_eq!(
            flow.view().error_kind(),
            Some(crate::client::FlowErrorKind::Configuration)
        );
    }

    #[tokio::test]
    async fn concurrent_submission_is_rejected_not_queued() {
        let service = MockFlowService::new().with_answer_delay(Duration::from_millis(150));
        service.queue_start(start_ok("s1", test_node("n1", "about_you")));
        service.queue_answer(answer_next(test_node("n2", "interests")));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;
        assert!(flow.wait_for(|v| v.current_node().is_some(), WAIT).await);

        flow.handle.submit_answer(json!("a")).await;
        assert!(flow.wait_for(ViewState::busy, WAIT).await);

        // Second submission while the first is in flight: dropped.
        flow.handle.submit_answer(json!("b")).await;

        assert!(
            flow.wait_for(
                |v| v.current_node().map(|n| n.id.as_str()) == Some("n2"),
                WAIT
            )
            .await
        );
        assert_eq!(flow.service.recorded_answers().len(), 1);
    }

    #[tokio::test]
    async fn restart_twice_is_equivalent_to_once() {
        let service = MockFlowService::new();
        service.queue_start(start_ok("s1", test_node("n1", "about_you")));
        service.queue_start(start_ok("s2", test_node("n1", "about_you")));
        service.queue_start(start_ok("s3", test_node("n1", "about_you")));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;
        assert!(flow.wait_for(|v| v.current_node().is_some(), WAIT).await);

        flow.handle.restart().await;
        assert!(
            flow.wait_for(
                |v| v.phase.session().map(|s| s.session_id.as_str()) == Some("s2"),
                WAIT
            )
            .await
        );

        flow.handle.restart().await;
        assert!(
            flow.wait_for(
                |v| v.phase.session().map(|s| s.session_id.as_str()) == Some("s3"),
                WAIT
            )
            .await
        );

        // Fresh state either way: first node, no result, no error, no context.
        let view = flow.view();
        assert!(matches!(view.phase, FlowPhase::AwaitingAnswer { .. }));
        assert_eq!(view.current_node().map(|n| n.id.as_str()), Some("n1"));
        assert!(view.result().is_none());
        assert!(view.last_error().is_none());
        assert!(view.context.is_none());
        assert_eq!(flow.service.start_requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stale_submission_does_not_mutate_post_restart_state() {
        let service = MockFlowService::new().with_answer_delay(Duration::from_millis(150));
        service.queue_start(start_ok("s1", test_node("n1", "about_you")));
        service.queue_start(start_ok("s2", test_node("n1", "about_you")));
        // The in-flight answer would complete the old session's flow.
        service.queue_answer(answer_done(&["analytical"]));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;
        assert!(flow.wait_for(|v| v.current_node().is_some(), WAIT).await);

        flow.handle.submit_answer(json!("a")).await;
        assert!(flow.wait_for(ViewState::busy, WAIT).await);

        // Restart while the submission is in flight.
        flow.handle.restart().await;
        assert!(
            flow.wait_for(
                |v| v.phase.session().map(|s| s.session_id.as_str()) == Some("s2"),
                WAIT
            )
            .await
        );

        // Let the stale answer resolve, then check it changed nothing.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let view = flow.view();
        assert!(!view.done());
        assert!(view.result().is_none());
        assert_eq!(
            view.phase.session().map(|s| s.session_id.as_str()),
            Some("s2")
        );
        assert_eq!(
            view.current_node().map(|n| n.id.as_str()),
            Some("n1")
        );
    }

    #[tokio::test]
    async fn session_ids_flow_through_untouched() {
        // Opaque identity round-trip: whatever the backend hands out is
        // what submissions carry back.
        let session_id = uuid::Uuid::new_v4().to_string();
        let service = MockFlowService::new();
        service.queue_start(start_ok(&session_id, test_node("n1", "about_you")));
        service.queue_answer(answer_next(test_node("n2", "interests")));

        let mut flow = TestFlow::new(service);
        flow.handle.start_flow().await;
        assert!(flow.wait_for(|v| v.current_node().is_some(), WAIT).await);

        flow.handle.submit_answer(json!("b")).await;
        assert!(
            flow.wait_for(
                |v| v.current_node().map(|n| n.id.as_str()) == Some("n2"),
                WAIT
            )
            .await
        );

        let recorded = flow.service.recorded_answers();
        assert_eq!(recorded[0].0, session_id);
    }
}
