//! Allowance negotiation record

use castate_error::{CaError, Result};
use castate_traits::{
    AllowanceChoice, AllowanceDecision, AllowanceHookRequest, AllowanceSource, AllowanceValue,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// The pending allowance request, if any, and the last fetched allowances
#[derive(Debug, Default)]
pub struct AllowanceState {
    sources: Vec<AllowanceSource>,
    open: bool,
    responder: Option<oneshot::Sender<AllowanceDecision>>,
    choices: Vec<AllowanceChoice>,
    values: Vec<AllowanceValue>,
}

/// Read-only copy of [`AllowanceState`] for the UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceView {
    /// Sources that need an allowance
    pub sources: Vec<AllowanceSource>,
    /// Whether the approval panel should show
    pub open: bool,
    /// Whether a decision can still be sent
    pub pending: bool,
    /// Chosen policy per source
    pub choices: Vec<AllowanceChoice>,
    /// Raw allowances already granted
    pub values: Vec<AllowanceValue>,
}

impl AllowanceState {
    /// Stores a new request over whatever was pending.
    ///
    /// Returns true when a live responder got replaced; the SDK sees that
    /// request's channel close.
    pub fn receive(&mut self, request: AllowanceHookRequest, default_choice: AllowanceChoice) -> bool {
        let replaced = self
            .responder
            .as_ref()
            .map(|previous| !previous.is_closed())
            .unwrap_or(false);

        self.sources = request.sources;
        self.responder = Some(request.responder);
        self.open = true;
        self.choices = vec![default_choice];
        replaced
    }

    /// Relays an approval with one policy per source
    pub fn accept(&mut self, choices: Vec<AllowanceChoice>) -> Result<()> {
        let responder = self
            .responder
            .take()
            .ok_or(CaError::NoPendingRequest("allowance"))?;
        self.choices = choices.clone();
        responder
            .send(AllowanceDecision::Allow(choices))
            .map_err(|_| CaError::ResponderClosed("allowance"))
    }

    /// Relays a refusal
    pub fn reject(&mut self) -> Result<()> {
        let responder = self
            .responder
            .take()
            .ok_or(CaError::NoPendingRequest("allowance"))?;
        responder
            .send(AllowanceDecision::Deny)
            .map_err(|_| CaError::ResponderClosed("allowance"))
    }

    /// Changes the chosen policy list without answering
    pub fn set_choices(&mut self, choices: Vec<AllowanceChoice>) {
        self.choices = choices;
    }

    /// Drops the responder, closes the panel and empties the raw values.
    /// Sources and chosen policies stay.
    pub fn clear(&mut self) {
        self.responder = None;
        self.open = false;
        self.values.clear();
    }

    /// Replaces the raw allowance values
    pub fn set_values(&mut self, values: Vec<AllowanceValue>) {
        self.values = values;
    }

    /// Whether a decision can still be sent
    pub fn is_pending(&self) -> bool {
        self.responder.is_some()
    }

    /// Copies the record for the UI
    pub fn view(&self) -> AllowanceView {
        AllowanceView {
            sources: self.sources.clone(),
            open: self.open,
            pending: self.is_pending(),
            choices: self.choices.clone(),
            values: self.values.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castate_testing::{sample_allowance_values, sample_sources};

    #[tokio::test]
    async fn test_receive_and_accept() {
        let mut state = AllowanceState::default();
        let (request, decision) = AllowanceHookRequest::new(sample_sources());
        assert!(!state.receive(request, AllowanceChoice::Max));

        let view = state.view();
        assert!(view.open);
        assert!(view.pending);
        assert_eq!(view.choices, vec![AllowanceChoice::Max]);
        assert_eq!(view.sources.len(), 2);

        state
            .accept(vec![AllowanceChoice::Min, AllowanceChoice::Exact(5)])
            .unwrap();
        assert_eq!(
            decision.await.unwrap(),
            AllowanceDecision::Allow(vec![AllowanceChoice::Min, AllowanceChoice::Exact(5)])
        );

        // answering does not close the panel
        assert!(state.view().open);
        assert!(matches!(state.accept(vec![]), Err(CaError::NoPendingRequest(_))));
    }

    #[tokio::test]
    async fn test_reject() {
        let mut state = AllowanceState::default();
        let (request, decision) = AllowanceHookRequest::new(sample_sources());
        state.receive(request, AllowanceChoice::Max);

        state.reject().unwrap();
        assert_eq!(decision.await.unwrap(), AllowanceDecision::Deny);
    }

    #[test]
    fn test_without_request() {
        let mut state = AllowanceState::default();
        assert!(matches!(state.reject(), Err(CaError::NoPendingRequest("allowance"))));
        assert!(!state.view().open);
    }

    #[test]
    fn test_closed_responder() {
        let mut state = AllowanceState::default();
        let (request, decision) = AllowanceHookRequest::new(sample_sources());
        state.receive(request, AllowanceChoice::Max);
        drop(decision);

        assert!(matches!(state.reject(), Err(CaError::ResponderClosed(_))));
    }

    #[tokio::test]
    async fn test_new_request_overwrites() {
        let mut state = AllowanceState::default();
        let (first, first_decision) = AllowanceHookRequest::new(sample_sources());
        state.receive(first, AllowanceChoice::Max);

        let (second, _second_decision) = AllowanceHookRequest::new(sample_sources()[..1].to_vec());
        assert!(state.receive(second, AllowanceChoice::Min));

        assert!(first_decision.await.is_err());
        assert_eq!(state.view().sources.len(), 1);
        assert_eq!(state.view().choices, vec![AllowanceChoice::Min]);
    }

    #[test]
    fn test_clear_empties_values_keeps_sources_and_choices() {
        let mut state = AllowanceState::default();
        state.set_values(sample_allowance_values());
        let (request, _decision) = AllowanceHookRequest::new(sample_sources());
        state.receive(request, AllowanceChoice::Max);

        state.clear();
        let view = state.view();
        assert!(!view.open);
        assert!(!view.pending);
        assert!(view.values.is_empty());
        assert_eq!(view.choices, vec![AllowanceChoice::Max]);
        assert_eq!(view.sources, sample_sources());

        // reject after clearing has nothing to answer
        assert!(state.reject().is_err());
    }
}
