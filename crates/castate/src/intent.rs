//! Intent negotiation record

use castate_error::{CaError, Result};
use castate_traits::{Intent, IntentDecision, IntentHookRequest, IntentRefresher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The pending transfer plan, its controls and UI flags
pub struct IntentState {
    intent: Option<Intent>,
    responder: Option<oneshot::Sender<IntentDecision>>,
    refresher: Option<Arc<dyn IntentRefresher>>,
    open: bool,
    sources_open: bool,
    fees_open: bool,
    timer: Option<JoinHandle<()>>,
    refreshing: bool,
    completed: bool,
    /// Bumped whenever the plan is replaced or cleared
    generation: u64,
}

/// Read-only copy of [`IntentState`] for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentView {
    /// The proposed plan
    pub intent: Option<Intent>,
    /// Whether the plan panel should show
    pub open: bool,
    /// Whether a decision can still be sent
    pub pending: bool,
    /// Whether the plan can be re-quoted
    pub can_refresh: bool,
    /// Sources disclosure panel
    pub sources_open: bool,
    /// Fee breakdown disclosure panel
    pub fees_open: bool,
    /// Whether the polling timer runs
    pub timer_running: bool,
    /// A re-quote is in flight
    pub refreshing: bool,
    /// The transfer finished
    pub completed: bool,
}

impl Default for IntentState {
    fn default() -> Self {
        Self {
            intent: None,
            responder: None,
            refresher: None,
            open: false,
            sources_open: true,
            fees_open: false,
            timer: None,
            refreshing: false,
            completed: false,
            generation: 0,
        }
    }
}

impl fmt::Debug for IntentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentState")
            .field("intent", &self.intent)
            .field("open", &self.open)
            .field("pending", &self.responder.is_some())
            .field("timer_running", &self.timer_running())
            .field("refreshing", &self.refreshing)
            .field("completed", &self.completed)
            .finish()
    }
}

impl IntentState {
    /// Stores a new request over whatever was pending.
    ///
    /// Returns true when a live responder got replaced.
    pub fn receive(&mut self, request: IntentHookRequest) -> bool {
        let replaced = self
            .responder
            .as_ref()
            .map(|previous| !previous.is_closed())
            .unwrap_or(false);

        self.intent = Some(request.intent);
        self.responder = Some(request.responder);
        self.refresher = Some(request.refresher);
        self.open = true;
        self.refreshing = false;
        self.generation = self.generation.wrapping_add(1);
        replaced
    }

    /// Relays acceptance of the plan
    pub fn accept(&mut self) -> Result<()> {
        self.answer(IntentDecision::Allow)
    }

    /// Relays refusal of the plan
    pub fn reject(&mut self) -> Result<()> {
        self.answer(IntentDecision::Deny)
    }

    fn answer(&mut self, decision: IntentDecision) -> Result<()> {
        let responder = self
            .responder
            .take()
            .ok_or(CaError::NoPendingRequest("intent"))?;
        responder
            .send(decision)
            .map_err(|_| CaError::ResponderClosed("intent"))
    }

    /// Marks a re-quote in flight and hands out the capability to run it,
    /// tagged with the plan it re-quotes
    pub fn begin_refresh(&mut self) -> Result<(u64, Arc<dyn IntentRefresher>)> {
        let refresher = self.refresher.clone().ok_or(CaError::RefreshUnavailable)?;
        self.refreshing = true;
        Ok((self.generation, refresher))
    }

    /// Ends a re-quote, storing the new plan when it succeeded.
    ///
    /// Returns false, leaving the record alone, when the plan was replaced
    /// or cleared since `begin_refresh`.
    pub fn finish_refresh(&mut self, generation: u64, quote: &Result<Intent>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.refreshing = false;
        if let Ok(intent) = quote {
            self.intent = Some(intent.clone());
        }
        true
    }

    /// Keeps a polling task, aborting the one it replaces
    pub fn set_timer(&mut self, timer: JoinHandle<()>) {
        self.stop_timer();
        self.timer = Some(timer);
    }

    /// Aborts the polling task; returns whether one was running
    pub fn stop_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a polling task is held and still running
    pub fn timer_running(&self) -> bool {
        self.timer.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Flips the sources panel, returning the new state
    pub fn toggle_sources(&mut self) -> bool {
        self.sources_open = !self.sources_open;
        self.sources_open
    }

    /// Flips the fee breakdown panel, returning the new state
    pub fn toggle_fees(&mut self) -> bool {
        self.fees_open = !self.fees_open;
        self.fees_open
    }

    /// Marks the transfer finished
    pub fn set_completed(&mut self) {
        self.completed = true;
    }

    /// Resets every field, aborting the timer
    pub fn clear(&mut self) {
        let generation = self.generation.wrapping_add(1);
        self.stop_timer();
        *self = Self::default();
        self.generation = generation;
    }

    /// Copies the record for the UI
    pub fn view(&self) -> IntentView {
        IntentView {
            intent: self.intent.clone(),
            open: self.open,
            pending: self.responder.is_some(),
            can_refresh: self.refresher.is_some(),
            sources_open: self.sources_open,
            fees_open: self.fees_open,
            timer_running: self.timer_running(),
            refreshing: self.refreshing,
            completed: self.completed,
        }
    }
}

impl Drop for IntentState {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castate_testing::{sample_intent, sample_intent_with_total, ScriptedRefresher};
    use std::time::Duration;

    fn request(refresher: ScriptedRefresher) -> (IntentHookRequest, oneshot::Receiver<IntentDecision>) {
        IntentHookRequest::new(sample_intent(), Arc::new(refresher))
    }

    #[test]
    fn test_defaults() {
        let view = IntentState::default().view();
        assert!(view.intent.is_none());
        assert!(!view.open);
        assert!(view.sources_open);
        assert!(!view.fees_open);
        assert!(!view.refreshing);
        assert!(!view.completed);
        assert!(!view.can_refresh);
    }

    #[tokio::test]
    async fn test_receive_accept() {
        let mut state = IntentState::default();
        let (req, decision) = request(ScriptedRefresher::default());
        assert!(!state.receive(req));

        let view = state.view();
        assert!(view.open && view.pending && view.can_refresh);
        assert_eq!(view.intent, Some(sample_intent()));

        state.accept().unwrap();
        assert_eq!(decision.await.unwrap(), IntentDecision::Allow);
        assert!(matches!(state.reject(), Err(CaError::NoPendingRequest("intent"))));
    }

    #[tokio::test]
    async fn test_refresh_bookkeeping() {
        let mut state = IntentState::default();
        assert!(matches!(state.begin_refresh(), Err(CaError::RefreshUnavailable)));

        let (req, _decision) = request(ScriptedRefresher::new(vec![sample_intent_with_total("99")]));
        state.receive(req);

        let (generation, refresher) = state.begin_refresh().unwrap();
        assert!(state.view().refreshing);

        let quote = refresher.refresh().await;
        assert!(state.finish_refresh(generation, &quote));
        let view = state.view();
        assert!(!view.refreshing);
        assert_eq!(view.intent.unwrap().destination.amount, "99");

        let (generation, _) = state.begin_refresh().unwrap();
        state.finish_refresh(generation, &Err(CaError::sdk("intent.refresh", "expired")));
        let view = state.view();
        assert!(!view.refreshing);
        assert_eq!(view.intent.unwrap().destination.amount, "99");
    }

    #[tokio::test]
    async fn test_quote_after_clear_is_dropped() {
        let mut state = IntentState::default();
        let (req, _decision) = request(ScriptedRefresher::new(vec![sample_intent_with_total("7")]));
        state.receive(req);

        let (generation, refresher) = state.begin_refresh().unwrap();
        state.clear();
        let quote = refresher.refresh().await;

        assert!(!state.finish_refresh(generation, &quote));
        assert_eq!(state.view(), IntentState::default().view());
    }

    #[tokio::test]
    async fn test_quote_for_replaced_plan_is_dropped() {
        let mut state = IntentState::default();
        let (first, _first_decision) =
            request(ScriptedRefresher::new(vec![sample_intent_with_total("7")]));
        state.receive(first);
        let (generation, refresher) = state.begin_refresh().unwrap();

        let newer = sample_intent_with_total("42");
        let (second, _second_decision) =
            IntentHookRequest::new(newer.clone(), Arc::new(ScriptedRefresher::default()));
        state.receive(second);

        let quote = refresher.refresh().await;
        assert!(!state.finish_refresh(generation, &quote));
        let view = state.view();
        assert_eq!(view.intent, Some(newer));
        assert!(!view.refreshing);
    }

    #[test]
    fn test_toggles() {
        let mut state = IntentState::default();
        assert!(!state.toggle_sources());
        assert!(state.toggle_fees());
        assert!(state.toggle_sources());
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let mut state = IntentState::default();
        let (req, _decision) = request(ScriptedRefresher::default());
        state.receive(req);
        state.toggle_sources();
        state.toggle_fees();
        state.set_completed();
        state.set_timer(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));
        assert!(state.view().timer_running);

        state.clear();
        let view = state.view();
        assert_eq!(view, IntentState::default().view());
        assert!(view.sources_open);
        assert!(!view.fees_open);
        assert!(!view.timer_running);
    }

    #[tokio::test]
    async fn test_replacing_timer_aborts_previous() {
        let mut state = IntentState::default();
        let (alive, gone) = oneshot::channel::<()>();
        state.set_timer(tokio::spawn(async move {
            let _alive = alive;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));
        state.set_timer(tokio::spawn(async {}));

        assert!(gone.await.is_err());
        assert!(state.stop_timer());
        assert!(!state.stop_timer());
    }
}
