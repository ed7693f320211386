//! Flow protocol data model
//!
//! Wire types for the server-driven onboarding flow. The backend owns the
//! question sequence; the client only renders nodes and relays answers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity binding one run through a flow.
///
/// Created when the backend accepts a start request; immutable for the
/// session's lifetime and discarded wholesale on restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub flow_id: String,
}

/// One question/step definition returned by the backend.
///
/// Immutable once received; a later response supersedes it with a new node,
/// never mutates it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub ui: UiSpec,
    #[serde(default)]
    pub meta: NodeMeta,
}

/// How the backend wants a node rendered and answered.
///
/// `input_type` is an open-ended tag; unrecognized tags fall back to a
/// renderer that produces no answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiSpec {
    #[serde(default)]
    pub question_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_type: String,
    #[serde(default)]
    pub options: Vec<UiOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// A selectable option within a choice-type node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Step metadata attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl NodeMeta {
    /// Step key for progress display, defaulting unknown/missing keys to
    /// the first stage.
    pub fn step_key(&self) -> StepKey {
        self.step.unwrap_or(StepKey::AboutYou)
    }
}

/// Named position in the client-defined progress enumeration.
///
/// Presentation concern only: the server may emit steps in any order, and
/// this enumeration never drives control flow. Unknown wire values map to
/// `AboutYou`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKey {
    Interests,
    Personality,
    StudyPlan,
    Result,
    #[serde(other)]
    AboutYou,
}

impl StepKey {
    /// Fixed display order of the progress row.
    pub const ORDER: [StepKey; 5] = [
        StepKey::AboutYou,
        StepKey::Interests,
        StepKey::Personality,
        StepKey::StudyPlan,
        StepKey::Result,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StepKey::AboutYou => "About you",
            StepKey::Interests => "Interests",
            StepKey::Personality => "Work Style",
            StepKey::StudyPlan => "Study Plan",
            StepKey::Result => "Starter Plan",
        }
    }

    /// Position in the fixed order.
    pub fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or(0)
    }
}

/// Terminal payload produced exactly once, when the backend signals
/// completion. `renderer` and `recommendations` are carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub summary: ResultSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Value>,
}

/// Summary section of a flow result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    #[serde(default)]
    pub top_traits: Vec<String>,
    /// Derived variables (class/goal/location style fields).
    #[serde(default)]
    pub variables: serde_json::Map<String, Value>,
    /// Raw answers keyed by node id.
    #[serde(default)]
    pub answers: serde_json::Map<String, Value>,
}
