//! # castate Testing Infrastructure
//!
//! Test doubles and data for exercising the castate adapter without a real
//! chain-abstraction backend:
//! - [`MockCaClient`]: scripted SDK client that counts calls, captures the hook
//!   sinks the adapter registers and lets a test push into them
//! - [`ScriptedRefresher`]: intent refresh capability with canned quotes
//! - [`MockProvider`]: wallet provider answering a fixed chain and account
//! - Fixtures and proptest strategies for balances, intents and progress steps
//!
//! ## Usage
//!
//! ```rust,ignore
//! use castate_testing::*;
//!
//! let client = MockCaClient::new().with_balances(sample_balances());
//! let factory = client.factory();
//! // build an adapter with `factory`, then drive the SDK side:
//! client.fire_event(CaEvent::ExpectedSteps(sample_steps()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use castate_error::{CaError, Result};
use castate_traits::{
    AllowanceDecision, AllowanceHookRequest, AllowanceHookSink, AllowanceSource, AllowanceValue,
    BridgeOutcome, BridgeRequest, CaEvent, ChainAbstractionClient, ChainBalance, ChainInfo,
    ClientFactory, EventSink, EvmProvider, Intent, IntentDecision, IntentDestination, IntentFees,
    IntentHookRequest, IntentHookSink, IntentRefresher, IntentSource, IntentToken, NetworkKind,
    ProgressStep, TokenBalance, TokenDescriptor, TxHash,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

/// Address the mock wallet reports
pub const MOCK_ACCOUNT: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f5fFb9";

/// Chain the mock wallet reports (Base)
pub const MOCK_CHAIN_ID: u64 = 8453;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Mock SDK Client
// ============================================================================

/// Hook registrations a client has received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registrations {
    /// `add_event_listener` calls
    pub event_listeners: usize,
    /// `set_allowance_hook` calls
    pub allowance_hooks: usize,
    /// `set_intent_hook` calls
    pub intent_hooks: usize,
}

#[derive(Default)]
struct Failures {
    init: Option<String>,
    balances: Option<String>,
    allowance_values: Option<String>,
    bridge: Option<String>,
}

#[derive(Default)]
struct Sinks {
    events: Option<EventSink>,
    allowance: Option<AllowanceHookSink>,
    intent: Option<IntentHookSink>,
}

/// Scripted chain-abstraction SDK client.
///
/// Cheap to clone; clones share all state, so a test keeps one handle while the
/// adapter owns another.
#[derive(Clone, Default)]
pub struct MockCaClient {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    init_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    allowance_value_calls: AtomicUsize,
    clients_created: AtomicUsize,
    event_listeners: AtomicUsize,
    allowance_hooks: AtomicUsize,
    intent_hooks: AtomicUsize,
    balances: Mutex<Vec<TokenBalance>>,
    allowance_values: Mutex<Vec<AllowanceValue>>,
    failures: Mutex<Failures>,
    init_delay: Mutex<Option<Duration>>,
    provider: Mutex<Option<Arc<dyn EvmProvider>>>,
    sinks: Mutex<Sinks>,
    bridge_requests: Mutex<Vec<BridgeRequest>>,
    scripted_progress: Mutex<Option<Vec<ProgressStep>>>,
}

impl MockCaClient {
    /// Creates a client with no balances and no allowance values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the balances the client returns
    pub fn with_balances(self, balances: Vec<TokenBalance>) -> Self {
        self.set_balances(balances);
        self
    }

    /// Sets the raw allowance values the client returns
    pub fn with_allowance_values(self, values: Vec<AllowanceValue>) -> Self {
        *lock(&self.inner.allowance_values) = values;
        self
    }

    /// Makes the handshake sleep before completing
    pub fn with_init_delay(self, delay: Duration) -> Self {
        *lock(&self.inner.init_delay) = Some(delay);
        self
    }

    /// Makes `bridge` emit `EXPECTED_STEPS` with these steps, then a
    /// `STEP_DONE` for each, through the registered event sink
    pub fn with_scripted_progress(self, steps: Vec<ProgressStep>) -> Self {
        *lock(&self.inner.scripted_progress) = Some(steps);
        self
    }

    /// Replaces the balances returned by later fetches
    pub fn set_balances(&self, balances: Vec<TokenBalance>) {
        *lock(&self.inner.balances) = balances;
    }

    /// Makes the handshake fail (or succeed again with `None`)
    pub fn fail_init(&self, reason: Option<&str>) {
        lock(&self.inner.failures).init = reason.map(str::to_string);
    }

    /// Makes balance fetches fail (or succeed again with `None`)
    pub fn fail_balances(&self, reason: Option<&str>) {
        lock(&self.inner.failures).balances = reason.map(str::to_string);
    }

    /// Makes allowance value fetches fail (or succeed again with `None`)
    pub fn fail_allowance_values(&self, reason: Option<&str>) {
        lock(&self.inner.failures).allowance_values = reason.map(str::to_string);
    }

    /// Makes bridge calls fail (or succeed again with `None`)
    pub fn fail_bridge(&self, reason: Option<&str>) {
        lock(&self.inner.failures).bridge = reason.map(str::to_string);
    }

    /// Factory handing out this client, counting each construction
    pub fn factory(&self) -> Arc<dyn ClientFactory> {
        let client = self.clone();
        Arc::new(move || -> Arc<dyn ChainAbstractionClient> {
            client.inner.clients_created.fetch_add(1, Ordering::SeqCst);
            Arc::new(client.clone())
        })
    }

    /// Number of clients the factory built
    pub fn clients_created(&self) -> usize {
        self.inner.clients_created.load(Ordering::SeqCst)
    }

    /// Number of handshakes performed
    pub fn init_calls(&self) -> usize {
        self.inner.init_calls.load(Ordering::SeqCst)
    }

    /// Number of balance fetches performed
    pub fn balance_calls(&self) -> usize {
        self.inner.balance_calls.load(Ordering::SeqCst)
    }

    /// Number of allowance value fetches performed
    pub fn allowance_value_calls(&self) -> usize {
        self.inner.allowance_value_calls.load(Ordering::SeqCst)
    }

    /// Hook registrations received so far
    pub fn registrations(&self) -> Registrations {
        Registrations {
            event_listeners: self.inner.event_listeners.load(Ordering::SeqCst),
            allowance_hooks: self.inner.allowance_hooks.load(Ordering::SeqCst),
            intent_hooks: self.inner.intent_hooks.load(Ordering::SeqCst),
        }
    }

    /// Whether a wallet provider was bound
    pub fn has_provider(&self) -> bool {
        lock(&self.inner.provider).is_some()
    }

    /// Bridge requests received, oldest first
    pub fn bridge_requests(&self) -> Vec<BridgeRequest> {
        lock(&self.inner.bridge_requests).clone()
    }

    /// Pushes a progress event into the registered listener.
    ///
    /// Returns false when no listener is registered or it has gone away.
    pub fn fire_event(&self, event: CaEvent) -> bool {
        match &lock(&self.inner.sinks).events {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    /// Invokes the allowance hook, returning where the decision will arrive
    pub fn request_allowance(
        &self,
        sources: Vec<AllowanceSource>,
    ) -> Option<oneshot::Receiver<AllowanceDecision>> {
        let (request, decision) = AllowanceHookRequest::new(sources);
        let sinks = lock(&self.inner.sinks);
        sinks.allowance.as_ref()?.send(request).ok()?;
        Some(decision)
    }

    /// Invokes the intent hook, returning where the decision will arrive
    pub fn request_intent(
        &self,
        intent: Intent,
        refresher: Arc<dyn IntentRefresher>,
    ) -> Option<oneshot::Receiver<IntentDecision>> {
        let (request, decision) = IntentHookRequest::new(intent, refresher);
        let sinks = lock(&self.inner.sinks);
        sinks.intent.as_ref()?.send(request).ok()?;
        Some(decision)
    }

    fn failure(&self, pick: impl Fn(&Failures) -> &Option<String>) -> Option<String> {
        pick(&lock(&self.inner.failures)).clone()
    }
}

impl std::fmt::Debug for MockCaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCaClient")
            .field("init_calls", &self.init_calls())
            .field("registrations", &self.registrations())
            .field("balance_calls", &self.balance_calls())
            .finish()
    }
}

#[async_trait]
impl ChainAbstractionClient for MockCaClient {
    fn set_evm_provider(&self, provider: Arc<dyn EvmProvider>) {
        *lock(&self.inner.provider) = Some(provider);
    }

    fn add_event_listener(&self, sink: EventSink) {
        self.inner.event_listeners.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.sinks).events = Some(sink);
    }

    fn set_allowance_hook(&self, sink: AllowanceHookSink) {
        self.inner.allowance_hooks.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.sinks).allowance = Some(sink);
    }

    fn set_intent_hook(&self, sink: IntentHookSink) {
        self.inner.intent_hooks.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.sinks).intent = Some(sink);
    }

    async fn init(&self) -> Result<()> {
        self.inner.init_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.inner.init_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.failure(|f| &f.init) {
            Some(reason) => Err(CaError::sdk("init", reason)),
            None => Ok(()),
        }
    }

    async fn unified_balances(&self) -> Result<Vec<TokenBalance>> {
        self.inner.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.failure(|f| &f.balances) {
            return Err(CaError::sdk("getUnifiedBalances", reason));
        }
        Ok(lock(&self.inner.balances).clone())
    }

    async fn allowance_values(&self) -> Result<Vec<AllowanceValue>> {
        self.inner.allowance_value_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.failure(|f| &f.allowance_values) {
            return Err(CaError::sdk("allowance.get", reason));
        }
        Ok(lock(&self.inner.allowance_values).clone())
    }

    async fn bridge(&self, request: BridgeRequest) -> Result<BridgeOutcome> {
        let sequence = {
            let mut requests = lock(&self.inner.bridge_requests);
            requests.push(request);
            requests.len()
        };
        if let Some(reason) = self.failure(|f| &f.bridge) {
            return Err(CaError::sdk("bridge", reason));
        }

        let steps = lock(&self.inner.scripted_progress).clone();
        if let Some(steps) = steps {
            self.fire_event(CaEvent::ExpectedSteps(steps.clone()));
            for step in steps {
                let payload = json!({ "sequence": sequence });
                self.fire_event(CaEvent::StepDone(step.with_data(payload)));
            }
        }

        let intent_id = format!("mock-intent-{}", sequence);
        Ok(BridgeOutcome {
            explorer_url: Some(format!("https://explorer.example/intent/{}", intent_id)),
            tx_hash: Some(TxHash::new(format!("0x{:064x}", sequence))),
            intent_id,
        })
    }
}

// ============================================================================
// Intent Refresher
// ============================================================================

/// Intent refresh capability answering from a queue of quotes.
///
/// When the queue runs dry the last quote is repeated.
#[derive(Default)]
pub struct ScriptedRefresher {
    quotes: Mutex<VecDeque<Intent>>,
    last: Mutex<Option<Intent>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedRefresher {
    /// Refresher answering with `quotes` in order
    pub fn new(quotes: Vec<Intent>) -> Self {
        Self {
            quotes: Mutex::new(quotes.into()),
            ..Self::default()
        }
    }

    /// Refresher that always fails
    pub fn failing(reason: &str) -> Self {
        let refresher = Self::default();
        *lock(&refresher.failure) = Some(reason.to_string());
        refresher
    }

    /// Makes every refresh take `delay` before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = Some(delay);
        self
    }

    /// Number of refreshes performed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentRefresher for ScriptedRefresher {
    async fn refresh(&self) -> Result<Intent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = lock(&self.failure).clone() {
            return Err(CaError::sdk("intent.refresh", reason));
        }

        let mut last = lock(&self.last);
        if let Some(next) = lock(&self.quotes).pop_front() {
            *last = Some(next);
        }
        last.clone()
            .ok_or_else(|| CaError::sdk("intent.refresh", "no quote scripted"))
    }
}

// ============================================================================
// Mock Wallet Provider
// ============================================================================

/// Wallet provider answering a fixed chain and account
#[derive(Debug, Default)]
pub struct MockProvider {
    methods: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Creates the provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Methods requested so far, oldest first
    pub fn methods(&self) -> Vec<String> {
        lock(&self.methods).clone()
    }
}

#[async_trait]
impl EvmProvider for MockProvider {
    async fn request(&self, method: &str, _params: Value) -> Result<Value> {
        lock(&self.methods).push(method.to_string());
        match method {
            "eth_chainId" => Ok(json!(format!("0x{:x}", MOCK_CHAIN_ID))),
            "eth_accounts" | "eth_requestAccounts" => Ok(json!([MOCK_ACCOUNT])),
            other => Err(CaError::RpcError {
                code: 4200,
                message: format!("unsupported method {}", other),
            }),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn chain_balance(id: u64, name: &str, contract: &str, balance: &str, fiat: f64) -> ChainBalance {
    ChainBalance {
        chain: ChainInfo {
            id,
            name: name.to_string(),
            logo: format!("https://logos.example/{}.svg", id),
        },
        network: NetworkKind::Evm,
        contract_address: contract.to_string(),
        is_native: None,
        balance: balance.to_string(),
        balance_in_fiat: fiat,
    }
}

/// Unified balances holding USDC on two chains and native ETH
pub fn sample_balances() -> Vec<TokenBalance> {
    vec![
        TokenBalance {
            symbol: "USDC".to_string(),
            balance: "150.25".to_string(),
            balance_in_fiat: 150.2,
            decimals: 6,
            icon: Some("https://icons.example/usdc.svg".to_string()),
            breakdown: vec![
                chain_balance(
                    10,
                    "OP Mainnet",
                    "0x0b2c639c533813f4aa9d7837caf62653d097ff85",
                    "100.25",
                    100.2,
                ),
                chain_balance(
                    42161,
                    "Arbitrum One",
                    "0xaf88d065e77c8cc2239327c5edb3a432268e5831",
                    "50",
                    50.0,
                ),
            ],
            local: None,
            abstracted: Some(true),
        },
        TokenBalance {
            symbol: "ETH".to_string(),
            balance: "0.5".to_string(),
            balance_in_fiat: 1500.0,
            decimals: 18,
            icon: None,
            breakdown: vec![ChainBalance {
                is_native: Some(true),
                ..chain_balance(
                    8453,
                    "Base",
                    "0x0000000000000000000000000000000000000000",
                    "0.5",
                    1500.0,
                )
            }],
            local: None,
            abstracted: None,
        },
    ]
}

/// Sources needing a USDC allowance on Optimism and Arbitrum
pub fn sample_sources() -> Vec<AllowanceSource> {
    let usdc = |contract: &str| TokenDescriptor {
        contract_address: contract.to_string(),
        decimals: 6,
        symbol: "USDC".to_string(),
        name: "USD Coin".to_string(),
    };
    vec![
        AllowanceSource {
            min_allowance: "100250000".to_string(),
            current_allowance: "0".to_string(),
            chain_id: 10,
            chain_name: "OP Mainnet".to_string(),
            token: usdc("0x0b2c639c533813f4aa9d7837caf62653d097ff85"),
        },
        AllowanceSource {
            min_allowance: "50000000".to_string(),
            current_allowance: "1000".to_string(),
            chain_id: 42161,
            chain_name: "Arbitrum One".to_string(),
            token: usdc("0xaf88d065e77c8cc2239327c5edb3a432268e5831"),
        },
    ]
}

/// Raw allowances already granted
pub fn sample_allowance_values() -> Vec<AllowanceValue> {
    vec![
        AllowanceValue {
            chain_id: 10,
            allowance: 0,
            token: "USDC".to_string(),
        },
        AllowanceValue {
            chain_id: 42161,
            allowance: u128::MAX,
            token: "USDC".to_string(),
        },
    ]
}

/// A plan moving USDC from Optimism and Arbitrum to Base
pub fn sample_intent() -> Intent {
    sample_intent_with_total("150")
}

/// [`sample_intent`] with a different destination amount, to tell quotes apart
pub fn sample_intent_with_total(amount: &str) -> Intent {
    Intent {
        sources: vec![
            IntentSource {
                amount: "100.25".to_string(),
                chain_id: 10,
                chain_name: "OP Mainnet".to_string(),
                chain_logo: None,
                contract_address: "0x0b2c639c533813f4aa9d7837caf62653d097ff85".to_string(),
            },
            IntentSource {
                amount: "50".to_string(),
                chain_id: 42161,
                chain_name: "Arbitrum One".to_string(),
                chain_logo: None,
                contract_address: "0xaf88d065e77c8cc2239327c5edb3a432268e5831".to_string(),
            },
        ],
        destination: IntentDestination {
            amount: amount.to_string(),
            chain_id: 8453,
            chain_name: "Base".to_string(),
            chain_logo: None,
        },
        fees: IntentFees {
            ca_gas: "0.05".to_string(),
            gas_supplied: "0".to_string(),
            protocol: "0.1".to_string(),
            solver: "0.1".to_string(),
            total: "0.25".to_string(),
        },
        token: IntentToken {
            symbol: "USDC".to_string(),
            name: "USD Coin".to_string(),
            decimals: 6,
            logo: None,
        },
        sources_total: "150.25".to_string(),
    }
}

/// The step list of a typical bridge: accepted, submitted, fulfilled
pub fn sample_steps() -> Vec<ProgressStep> {
    vec![
        ProgressStep::new("IA", "INTENT_ACCEPTED"),
        ProgressStep::new("IS", "INTENT_SUBMITTED"),
        ProgressStep::new("IF", "INTENT_FULFILLED"),
    ]
}

// ============================================================================
// Property-Based Testing Strategies
// ============================================================================

/// Generates short step type ids like the SDK's ("IA", "IF", ...)
pub fn step_type_id() -> impl Strategy<Value = String> {
    "[A-Z]{1,3}"
}

/// Generates a progress step with an optional small payload
pub fn progress_step() -> impl Strategy<Value = ProgressStep> {
    (step_type_id(), "[A-Z_]{3,16}", proptest::option::of(any::<u32>())).prop_map(
        |(type_id, kind, payload)| {
            let step = ProgressStep::new(type_id, kind);
            match payload {
                Some(n) => step.with_data(json!({ "n": n })),
                None => step,
            }
        },
    )
}

/// Generates a step list of up to `max_len` steps (type ids may repeat)
pub fn progress_steps(max_len: usize) -> impl Strategy<Value = Vec<ProgressStep>> {
    prop::collection::vec(progress_step(), 0..=max_len)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let client = MockCaClient::new().with_balances(sample_balances());
        client.init().await.unwrap();
        assert_eq!(client.init_calls(), 1);

        let balances = client.unified_balances().await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(client.balance_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let client = MockCaClient::new();
        client.fail_init(Some("backend down"));
        assert!(client.init().await.is_err());

        client.fail_init(None);
        assert!(client.init().await.is_ok());

        client.fail_bridge(Some("insufficient funds"));
        assert!(client.bridge(BridgeRequest::new()).await.is_err());
        assert_eq!(client.bridge_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fire_event_requires_listener() {
        let client = MockCaClient::new();
        assert!(!client.fire_event(CaEvent::ExpectedSteps(vec![])));

        let (tx, mut rx) = mpsc::unbounded_channel();
        client.add_event_listener(tx);
        assert!(client.fire_event(CaEvent::ExpectedSteps(sample_steps())));
        assert!(matches!(rx.recv().await, Some(CaEvent::ExpectedSteps(steps)) if steps.len() == 3));
        assert_eq!(client.registrations().event_listeners, 1);
    }

    #[tokio::test]
    async fn test_scripted_progress_on_bridge() {
        let client = MockCaClient::new().with_scripted_progress(sample_steps());
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.add_event_listener(tx);

        let outcome = client.bridge(BridgeRequest::new().amount(1)).await.unwrap();
        assert_eq!(outcome.intent_id, "mock-intent-1");

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["EXPECTED_STEPS", "STEP_DONE", "STEP_DONE", "STEP_DONE"]);
    }

    #[tokio::test]
    async fn test_factory_shares_state() {
        let client = MockCaClient::new();
        let factory = client.factory();
        let built = factory.create();
        built.init().await.unwrap();

        assert_eq!(client.clients_created(), 1);
        assert_eq!(client.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_refresher_repeats_last() {
        let refresher = ScriptedRefresher::new(vec![sample_intent_with_total("1"), sample_intent_with_total("2")]);
        assert_eq!(refresher.refresh().await.unwrap().destination.amount, "1");
        assert_eq!(refresher.refresh().await.unwrap().destination.amount, "2");
        assert_eq!(refresher.refresh().await.unwrap().destination.amount, "2");
        assert_eq!(refresher.calls(), 3);

        assert!(ScriptedRefresher::failing("quote expired").refresh().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockProvider::new();
        assert_eq!(provider.chain_id().await.unwrap(), MOCK_CHAIN_ID);
        assert_eq!(provider.accounts().await.unwrap(), vec![MOCK_ACCOUNT.to_string()]);
        assert!(provider.request("eth_sign", json!([])).await.is_err());
        assert_eq!(provider.methods().len(), 3);
    }

    #[test]
    fn test_fixtures_are_consistent() {
        let intent = sample_intent();
        let source_chains: Vec<u64> = sample_sources().iter().map(|s| s.chain_id).collect();
        assert_eq!(intent.source_chain_ids(), source_chains);
        assert!(sample_steps().iter().any(|s| s.type_id == "IF"));
    }

    proptest! {
        #[test]
        fn test_generated_steps_bounded(steps in progress_steps(8)) {
            prop_assert!(steps.len() <= 8);
            for step in steps {
                prop_assert!(!step.type_id.is_empty() && step.type_id.len() <= 3);
            }
        }
    }
}
