//! Step-lifecycle events pushed by the SDK

use castate_error::{CaError, Result};
use serde::{Deserialize, Serialize};

/// One phase of a multi-phase cross-chain operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStep {
    /// Stable step identifier used for matching (e.g. "IF")
    #[serde(rename = "typeID")]
    pub type_id: String,
    /// Human-readable step kind
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Payload attached when the step completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProgressStep {
    /// Creates a step with no payload
    pub fn new(type_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            kind: kind.into(),
            data: None,
        }
    }

    /// Attaches a payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Progress event, tagged the way the SDK emits it: `{"type": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaEvent {
    /// Full list of steps the operation will go through
    ExpectedSteps(Vec<ProgressStep>),
    /// One step finished
    StepDone(ProgressStep),
}

impl CaEvent {
    /// Parses an event from its JSON form
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| CaError::InvalidEvent(e.to_string()))
    }

    /// Wire name of the event tag
    pub fn kind(&self) -> &'static str {
        match self {
            CaEvent::ExpectedSteps(_) => "EXPECTED_STEPS",
            CaEvent::StepDone(_) => "STEP_DONE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_expected_steps() {
        let event = CaEvent::from_json(
            r#"{"type":"EXPECTED_STEPS","data":[{"type":"INTENT_ACCEPTED","typeID":"IA"},{"type":"INTENT_FULFILLED","typeID":"IF"}]}"#,
        )
        .unwrap();

        match event {
            CaEvent::ExpectedSteps(steps) => {
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[1].type_id, "IF");
                assert_eq!(steps[1].kind, "INTENT_FULFILLED");
                assert!(steps[0].data.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_step_done_with_payload() {
        let event = CaEvent::from_json(
            r#"{"type":"STEP_DONE","data":{"type":"INTENT_SUBMITTED","typeID":"IS","data":{"explorerURL":"https://explorer/1"}}}"#,
        )
        .unwrap();

        assert_eq!(event.kind(), "STEP_DONE");
        match event {
            CaEvent::StepDone(step) => {
                assert_eq!(step.type_id, "IS");
                assert_eq!(step.data, Some(json!({"explorerURL": "https://explorer/1"})));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_rejected() {
        let err = CaEvent::from_json(r#"{"type":"SOMETHING_ELSE","data":[]}"#).unwrap_err();
        assert!(matches!(err, CaError::InvalidEvent(_)));
    }

    #[test]
    fn test_serialize_roundtrip_shape() {
        let event = CaEvent::StepDone(ProgressStep::new("IF", "INTENT_FULFILLED").with_data(json!({"x": 1})));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "STEP_DONE");
        assert_eq!(value["data"]["typeID"], "IF");
        assert_eq!(value["data"]["data"]["x"], 1);
    }
}
