//! Step tracking for multi-phase cross-chain operations

use castate_traits::{CaEvent, ProgressStep};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A step the operation will go through, and whether it finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedStep {
    /// The step as announced (payload replaced on completion)
    #[serde(flatten)]
    pub step: ProgressStep,
    /// Set once a matching `STEP_DONE` arrives
    pub done: bool,
}

/// Progress of the current operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// An operation announced its steps and has not finished
    pub in_progress: bool,
    /// Every announced step is done
    pub completed: bool,
    /// Announced steps in order
    pub steps: Vec<TrackedStep>,
}

/// What a progress event did to the step list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    /// The step list was replaced
    StepsExpected {
        /// Number of announced steps
        count: usize,
    },
    /// A tracked step was marked done
    StepCompleted {
        /// Type id of the step
        type_id: String,
        /// Position in the step list
        index: usize,
        /// Whether this completed the operation
        all_done: bool,
    },
    /// No tracked step had the event's type id; nothing changed
    Unmatched {
        /// Type id carried by the event
        type_id: String,
    },
}

impl ProgressState {
    /// Applies one event.
    ///
    /// `EXPECTED_STEPS` discards whatever was tracked. `STEP_DONE` marks the
    /// first step with the same type id, even one already done.
    pub fn apply(&mut self, event: CaEvent) -> EventOutcome {
        match event {
            CaEvent::ExpectedSteps(steps) => {
                self.steps = steps
                    .into_iter()
                    .map(|step| TrackedStep { step, done: false })
                    .collect();
                self.in_progress = true;
                self.completed = false;
                EventOutcome::StepsExpected {
                    count: self.steps.len(),
                }
            }
            CaEvent::StepDone(done) => {
                let Some(index) = self.steps.iter().position(|s| s.step.type_id == done.type_id) else {
                    return EventOutcome::Unmatched {
                        type_id: done.type_id,
                    };
                };

                let tracked = &mut self.steps[index];
                tracked.done = true;
                if let Some(data) = done.data.filter(carries_payload) {
                    tracked.step.data = Some(data);
                }

                let all_done = self.all_done();
                if all_done {
                    self.completed = true;
                    self.in_progress = false;
                }
                EventOutcome::StepCompleted {
                    type_id: done.type_id,
                    index,
                    all_done,
                }
            }
        }
    }

    /// Whether steps were announced and every one of them is done
    pub fn all_done(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.done)
    }

    /// Looks up a tracked step by type id
    pub fn step(&self, type_id: &str) -> Option<&TrackedStep> {
        self.steps.iter().find(|s| s.step.type_id == type_id)
    }

    /// Number of steps done
    pub fn done_count(&self) -> usize {
        self.steps.iter().filter(|s| s.done).count()
    }
}

/// Null, false, zero and the empty string count as no payload
fn carries_payload(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castate_testing::{progress_steps, sample_steps};
    use proptest::prelude::*;
    use serde_json::json;

    fn expected(state: &mut ProgressState, steps: Vec<ProgressStep>) {
        state.apply(CaEvent::ExpectedSteps(steps));
    }

    #[test]
    fn test_expected_steps_resets() {
        let mut state = ProgressState::default();
        expected(&mut state, sample_steps());
        state.apply(CaEvent::StepDone(ProgressStep::new("IA", "INTENT_ACCEPTED")));

        let outcome = state.apply(CaEvent::ExpectedSteps(vec![ProgressStep::new("X", "OTHER")]));
        assert_eq!(outcome, EventOutcome::StepsExpected { count: 1 });
        assert_eq!(state.steps.len(), 1);
        assert!(!state.steps[0].done);
        assert!(state.in_progress);
        assert!(!state.completed);
    }

    #[test]
    fn test_step_done_marks_first_match() {
        let mut state = ProgressState::default();
        expected(
            &mut state,
            vec![ProgressStep::new("A", "ONE"), ProgressStep::new("A", "TWO")],
        );

        let outcome = state.apply(CaEvent::StepDone(ProgressStep::new("A", "ONE")));
        assert!(matches!(outcome, EventOutcome::StepCompleted { index: 0, all_done: false, .. }));
        assert!(state.steps[0].done);
        assert!(!state.steps[1].done);
    }

    #[test]
    fn test_step_payload_overwritten_only_when_present() {
        let mut state = ProgressState::default();
        expected(
            &mut state,
            vec![ProgressStep::new("A", "ONE").with_data(json!({"announced": true}))],
        );

        state.apply(CaEvent::StepDone(ProgressStep::new("A", "ONE")));
        assert_eq!(state.steps[0].step.data, Some(json!({"announced": true})));

        state.apply(CaEvent::StepDone(ProgressStep::new("A", "ONE").with_data(json!({"x": 1}))));
        assert_eq!(state.steps[0].step.data, Some(json!({"x": 1})));
    }

    #[test]
    fn test_falsy_payload_keeps_announced_one() {
        let announced = json!({"announced": true});
        for falsy in [json!(0), json!(""), json!(false), json!(0.0)] {
            let mut state = ProgressState::default();
            expected(&mut state, vec![ProgressStep::new("A", "ONE").with_data(announced.clone())]);

            state.apply(CaEvent::StepDone(ProgressStep::new("A", "ONE").with_data(falsy)));
            assert!(state.steps[0].done);
            assert_eq!(state.steps[0].step.data, Some(announced.clone()));
        }

        let mut state = ProgressState::default();
        expected(&mut state, vec![ProgressStep::new("A", "ONE")]);
        state.apply(CaEvent::StepDone(ProgressStep::new("A", "ONE").with_data(json!([]))));
        assert_eq!(state.steps[0].step.data, Some(json!([])));
    }

    #[test]
    fn test_unmatched_leaves_steps_alone() {
        let mut state = ProgressState::default();
        expected(&mut state, sample_steps());
        let before = state.clone();

        let outcome = state.apply(CaEvent::StepDone(ProgressStep::new("ZZ", "UNKNOWN")));
        assert_eq!(outcome, EventOutcome::Unmatched { type_id: "ZZ".into() });
        assert_eq!(state, before);
    }

    #[test]
    fn test_completion() {
        let mut state = ProgressState::default();
        expected(&mut state, sample_steps());
        for step in sample_steps() {
            state.apply(CaEvent::StepDone(step));
        }

        assert!(state.completed);
        assert!(!state.in_progress);
        assert_eq!(state.done_count(), 3);
    }

    #[test]
    fn test_fulfilled_step_keeps_earlier_pending() {
        let mut state = ProgressState::default();
        expected(
            &mut state,
            vec![ProgressStep::new("A", "STEP_A"), ProgressStep::new("IF", "INTENT_FULFILLED")],
        );
        state.apply(CaEvent::StepDone(ProgressStep::new("IF", "INTENT_FULFILLED").with_data(json!({"x": 1}))));

        assert!(!state.step("A").unwrap().done);
        let fulfilled = state.step("IF").unwrap();
        assert!(fulfilled.done);
        assert_eq!(fulfilled.step.data, Some(json!({"x": 1})));
    }

    #[test]
    fn test_view_shape() {
        let mut state = ProgressState::default();
        expected(&mut state, vec![ProgressStep::new("IF", "INTENT_FULFILLED")]);
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["inProgress"], true);
        assert_eq!(value["steps"][0]["typeID"], "IF");
        assert_eq!(value["steps"][0]["done"], false);
    }

    proptest! {
        #[test]
        fn test_expected_steps_all_pending(steps in progress_steps(12)) {
            let mut state = ProgressState::default();
            let n = steps.len();
            state.apply(CaEvent::ExpectedSteps(steps));

            prop_assert_eq!(state.steps.len(), n);
            prop_assert!(state.steps.iter().all(|s| !s.done));
            prop_assert!(state.in_progress);
            prop_assert!(!state.completed);
        }

        #[test]
        fn test_step_done_touches_at_most_one(steps in progress_steps(12), pick in 0usize..12) {
            prop_assume!(!steps.is_empty());
            let target = steps[pick % steps.len()].clone();
            let mut state = ProgressState::default();
            state.apply(CaEvent::ExpectedSteps(steps));

            state.apply(CaEvent::StepDone(ProgressStep::new(target.type_id.clone(), target.kind)));
            prop_assert_eq!(state.done_count(), 1);
            let first = state.steps.iter().position(|s| s.step.type_id == target.type_id).unwrap();
            prop_assert!(state.steps[first].done);
        }
    }
}
