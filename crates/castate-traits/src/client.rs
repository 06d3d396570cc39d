//! Chain-abstraction SDK client seam, hook payloads and the bridge request

use crate::allowance::{AllowanceDecision, AllowanceSource, AllowanceValue};
use crate::balance::TokenBalance;
use crate::intent::{Intent, IntentDecision, IntentRefresher};
use crate::progress::CaEvent;
use crate::provider::EvmProvider;
use async_trait::async_trait;
use castate_error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Sink the SDK pushes progress events into
pub type EventSink = mpsc::UnboundedSender<CaEvent>;

/// Sink the SDK pushes allowance requests into
pub type AllowanceHookSink = mpsc::UnboundedSender<AllowanceHookRequest>;

/// Sink the SDK pushes intent requests into
pub type IntentHookSink = mpsc::UnboundedSender<IntentHookRequest>;

/// The SDK asks the user to approve token allowances on some source chains
#[derive(Debug)]
pub struct AllowanceHookRequest {
    /// Sources that need an allowance
    pub sources: Vec<AllowanceSource>,
    /// Where the decision goes
    pub responder: oneshot::Sender<AllowanceDecision>,
}

impl AllowanceHookRequest {
    /// Creates a request and the receiver the SDK awaits the decision on
    pub fn new(sources: Vec<AllowanceSource>) -> (Self, oneshot::Receiver<AllowanceDecision>) {
        let (responder, decision) = oneshot::channel();
        (Self { sources, responder }, decision)
    }
}

/// The SDK asks the user to accept a transfer plan
pub struct IntentHookRequest {
    /// The proposed plan
    pub intent: Intent,
    /// Where the decision goes
    pub responder: oneshot::Sender<IntentDecision>,
    /// Re-quotes the plan on demand
    pub refresher: Arc<dyn IntentRefresher>,
}

impl IntentHookRequest {
    /// Creates a request and the receiver the SDK awaits the decision on
    pub fn new(
        intent: Intent,
        refresher: Arc<dyn IntentRefresher>,
    ) -> (Self, oneshot::Receiver<IntentDecision>) {
        let (responder, decision) = oneshot::channel();
        (
            Self {
                intent,
                responder,
                refresher,
            },
            decision,
        )
    }
}

impl fmt::Debug for IntentHookRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentHookRequest")
            .field("intent", &self.intent)
            .field("responder_closed", &self.responder.is_closed())
            .finish()
    }
}

/// Transfer request assembled by the fluent bridge builder.
///
/// Fields stay optional: the SDK validates, not the adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRequest {
    /// Amount in human-readable units
    pub amount: Option<String>,
    /// Destination chain ID
    pub chain_id: Option<u64>,
    /// Token symbol
    pub token: Option<String>,
    /// Destination gas budget in wei
    pub gas: Option<u128>,
}

impl BridgeRequest {
    /// Creates an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the amount (string or number)
    pub fn amount(mut self, amount: impl ToString) -> Self {
        self.amount = Some(amount.to_string());
        self
    }

    /// Sets the destination chain
    pub fn chain(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Sets the token symbol
    pub fn token(mut self, symbol: impl Into<String>) -> Self {
        self.token = Some(symbol.into());
        self
    }

    /// Sets the destination gas budget
    pub fn gas(mut self, gas: u128) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// Represents a transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    /// Creates a new TxHash from a string
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the hash as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of an executed bridge transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeOutcome {
    /// SDK-side intent identifier
    pub intent_id: String,
    /// Destination transaction, once known
    pub tx_hash: Option<TxHash>,
    /// Explorer link for the intent
    pub explorer_url: Option<String>,
}

/// Client of the chain-abstraction SDK.
///
/// Hook registration is synchronous; everything that talks to the network is
/// async. Implementations push into the registered sinks for the lifetime of
/// the client.
#[async_trait]
pub trait ChainAbstractionClient: Send + Sync {
    /// Binds the wallet provider the SDK signs with
    fn set_evm_provider(&self, provider: Arc<dyn EvmProvider>);

    /// Registers the progress event sink
    fn add_event_listener(&self, sink: EventSink);

    /// Registers the allowance hook sink
    fn set_allowance_hook(&self, sink: AllowanceHookSink);

    /// Registers the intent hook sink
    fn set_intent_hook(&self, sink: IntentHookSink);

    /// Performs the handshake with the SDK backend
    async fn init(&self) -> Result<()>;

    /// Fetches the unified balance list
    async fn unified_balances(&self) -> Result<Vec<TokenBalance>>;

    /// Fetches the raw allowances currently granted
    async fn allowance_values(&self) -> Result<Vec<AllowanceValue>>;

    /// Executes a bridge transfer
    async fn bridge(&self, request: BridgeRequest) -> Result<BridgeOutcome>;
}

/// Constructs a fresh SDK client for a new session
pub trait ClientFactory: Send + Sync {
    /// Creates the client
    fn create(&self) -> Arc<dyn ChainAbstractionClient>;
}

impl<F> ClientFactory for F
where
    F: Fn() -> Arc<dyn ChainAbstractionClient> + Send + Sync,
{
    fn create(&self) -> Arc<dyn ChainAbstractionClient> {
        self()
    }
}
