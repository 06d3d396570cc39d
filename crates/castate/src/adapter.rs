//! The adapter facade and its shared state

use crate::allowance::{AllowanceState, AllowanceView};
use crate::balance::fetch_snapshot;
use crate::bridge::BridgeBuilder;
use crate::config::AdapterConfig;
use crate::intent::{IntentState, IntentView};
use crate::progress::{EventOutcome, ProgressState};
use crate::session::{SessionHandle, SessionRecord, SessionStatus};
use crate::updates::{AdapterUpdate, UpdateBus};
use castate_error::{CaError, Result};
use castate_provider::ProviderRegistry;
use castate_traits::{
    AllowanceChoice, AllowanceHookRequest, AllowanceValue, BalanceSnapshot, BridgeOutcome,
    CaEvent, ChainAbstractionClient, ClientFactory, EvmProvider, Intent, IntentHookRequest,
};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

// ============ Builder ============

/// Configures a [`CaAdapter`] before construction
pub struct AdapterBuilder {
    factory: Arc<dyn ClientFactory>,
    config: AdapterConfig,
    registry: Option<Arc<ProviderRegistry>>,
}

impl AdapterBuilder {
    /// Sets the configuration
    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// Reads injected providers from this registry instead of the global one
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validates the configuration and builds the adapter
    pub fn build(self) -> Result<CaAdapter> {
        self.config.validate()?;
        Ok(CaAdapter::assemble(self.factory, self.config, self.registry))
    }
}

// ============ Adapter ============

/// State adapter between a chain-abstraction SDK and a wallet UI.
///
/// Owns one lazily started SDK session and the records the UI reads: the
/// unified balance, the pending allowance and intent negotiations, and the
/// progress of the current cross-chain operation. The SDK pushes into the
/// adapter over hook channels drained by background tasks; dropping or
/// disposing the adapter stops them.
pub struct CaAdapter {
    inner: Arc<AdapterInner>,
}

impl CaAdapter {
    /// Creates an adapter with the default configuration
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self::assemble(factory, AdapterConfig::default(), None)
    }

    /// Creates an adapter with a validated configuration
    pub fn with_config(factory: Arc<dyn ClientFactory>, config: AdapterConfig) -> Result<Self> {
        Self::builder(factory).config(config).build()
    }

    fn assemble(
        factory: Arc<dyn ClientFactory>,
        config: AdapterConfig,
        registry: Option<Arc<ProviderRegistry>>,
    ) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                updates: UpdateBus::new(config.update_channel_capacity),
                config,
                factory,
                registry,
                init_gate: Mutex::new(()),
                session: RwLock::new(SessionRecord::default()),
                balance: RwLock::new(None),
                allowance: RwLock::new(AllowanceState::default()),
                intent: RwLock::new(IntentState::default()),
                progress: RwLock::new(ProgressState::default()),
                pumps: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Starts configuring an adapter
    pub fn builder(factory: Arc<dyn ClientFactory>) -> AdapterBuilder {
        AdapterBuilder {
            factory,
            config: AdapterConfig::default(),
            registry: None,
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    // ============ Session ============

    /// Starts the SDK session bound to `provider`, or returns the existing one.
    ///
    /// Concurrent callers wait for the first to finish. Failures are logged and
    /// reported through the handle's status, never as an error. A failed
    /// session stays failed; only [`retry_session`](Self::retry_session)
    /// starts another attempt.
    pub async fn ensure_session(&self, provider: Arc<dyn EvmProvider>) -> SessionHandle {
        self.inner.ensure_session(provider).await
    }

    /// Starts a new attempt with a fresh client unless the session is ready
    pub async fn retry_session(&self, provider: Arc<dyn EvmProvider>) -> SessionHandle {
        self.inner.retry_session(provider).await
    }

    /// [`ensure_session`](Self::ensure_session) with the provider found in the
    /// configured injected slot
    pub async fn ensure_injected_session(&self) -> Result<SessionHandle> {
        let slot = &self.inner.config.provider_slot;
        let provider = match &self.inner.registry {
            Some(registry) => registry.get(slot),
            None => ProviderRegistry::global().get(slot),
        }
        .ok_or_else(|| CaError::ProviderNotInjected(slot.clone()))?;
        Ok(self.ensure_session(provider).await)
    }

    /// Current session status
    pub async fn session_status(&self) -> SessionStatus {
        self.inner.session.read().await.status.clone()
    }

    /// True once the session is ready
    pub async fn is_initialized(&self) -> bool {
        self.inner.session.read().await.status.is_ready()
    }

    /// Tears the session down: stops the hook tasks and the intent timer and
    /// releases the SDK client
    pub async fn dispose(self) {
        self.inner.abort_pumps();
        self.inner.intent.write().await.stop_timer();
        {
            let mut session = self.inner.session.write().await;
            session.client = None;
            session.provider = None;
            session.status = SessionStatus::Uninitialized;
        }
        self.inner
            .updates
            .publish(AdapterUpdate::SessionChanged(SessionStatus::Uninitialized));
        tracing::info!("adapter disposed");
    }

    // ============ Balance ============

    /// Cached unified balance.
    ///
    /// With `force_refresh` and an existing session, session setup is run
    /// again in the background. That does nothing once a session exists, so
    /// no balance is fetched; [`refresh_balance`](Self::refresh_balance) is
    /// the actual refetch. Returns the cached snapshot either way.
    pub async fn get_balance(&self, force_refresh: bool) -> Option<BalanceSnapshot> {
        self.inner.get_balance(force_refresh).await
    }

    /// Refetches the unified balance and waits for it
    pub async fn refresh_balance(&self) -> Result<BalanceSnapshot> {
        self.inner.refresh_balance().await
    }

    // ============ Allowance ============

    /// Copy of the allowance record
    pub async fn allowance(&self) -> AllowanceView {
        self.inner.allowance.read().await.view()
    }

    /// Handles an allowance request pushed by the SDK
    pub async fn on_allowance_request(&self, request: AllowanceHookRequest) {
        self.inner.on_allowance_request(request).await
    }

    /// Approves the pending request with one policy per source
    pub async fn accept_allowance(&self, choices: Vec<AllowanceChoice>) -> Result<()> {
        self.inner.allowance.write().await.accept(choices)?;
        tracing::info!("allowance accepted");
        Ok(())
    }

    /// Refuses the pending request
    pub async fn reject_allowance(&self) -> Result<()> {
        self.inner.allowance.write().await.reject()?;
        tracing::info!("allowance rejected");
        Ok(())
    }

    /// Replaces the chosen policy list without answering
    pub async fn set_allowance_choices(&self, choices: Vec<AllowanceChoice>) {
        self.inner.allowance.write().await.set_choices(choices);
    }

    /// Forgets the pending request, closes the panel and empties the raw values
    pub async fn clear_allowance(&self) {
        self.inner.allowance.write().await.clear();
        self.inner.updates.publish(AdapterUpdate::AllowanceCleared);
    }

    /// Refetches the raw allowances granted
    pub async fn refresh_allowance_values(&self) -> Result<Vec<AllowanceValue>> {
        let client = self.inner.client().await.ok_or(CaError::NoSession)?;
        let values = client.allowance_values().await?;
        self.inner.allowance.write().await.set_values(values.clone());
        Ok(values)
    }

    // ============ Intent ============

    /// Copy of the intent record
    pub async fn intent(&self) -> IntentView {
        self.inner.intent.read().await.view()
    }

    /// Handles a transfer plan pushed by the SDK
    pub async fn on_intent_request(&self, request: IntentHookRequest) {
        self.inner.on_intent_request(request).await
    }

    /// Accepts the pending plan
    pub async fn accept_intent(&self) -> Result<()> {
        self.inner.intent.write().await.accept()?;
        tracing::info!("intent accepted");
        Ok(())
    }

    /// Refuses the pending plan
    pub async fn reject_intent(&self) -> Result<()> {
        self.inner.intent.write().await.reject()?;
        tracing::info!("intent rejected");
        Ok(())
    }

    /// Re-quotes the pending plan and stores the result.
    ///
    /// A quote for a plan that was cleared or replaced while it was in flight
    /// is returned but not stored.
    pub async fn refresh_intent(&self) -> Result<Intent> {
        self.inner.refresh_intent().await
    }

    /// Re-quotes the plan every `interval` (configured period when `None`)
    /// until stopped or cleared. Replaces a running timer.
    pub async fn start_intent_refresh_timer(&self, interval: Option<Duration>) -> Result<()> {
        self.inner.start_intent_refresh_timer(interval).await
    }

    /// Stops the polling timer; returns whether one was running
    pub async fn stop_intent_refresh_timer(&self) -> bool {
        self.inner.intent.write().await.stop_timer()
    }

    /// Flips the sources panel, returning its new state
    pub async fn toggle_sources_panel(&self) -> bool {
        self.inner.intent.write().await.toggle_sources()
    }

    /// Flips the fee breakdown panel, returning its new state
    pub async fn toggle_fees_panel(&self) -> bool {
        self.inner.intent.write().await.toggle_fees()
    }

    /// Marks the transfer finished
    pub async fn set_intent_completed(&self) {
        self.inner.intent.write().await.set_completed();
    }

    /// Resets the intent record to defaults, stopping the timer
    pub async fn clear_intent(&self) {
        self.inner.intent.write().await.clear();
        self.inner.updates.publish(AdapterUpdate::IntentCleared);
    }

    // ============ Progress ============

    /// Copy of the progress record
    pub async fn progress(&self) -> ProgressState {
        self.inner.progress.read().await.clone()
    }

    /// Applies a progress event.
    ///
    /// A `STEP_DONE` carrying the configured marker also refetches the balance;
    /// a failed refetch is returned after the step has been recorded.
    pub async fn on_event(&self, event: CaEvent) -> Result<EventOutcome> {
        self.inner.on_event(event).await
    }

    /// [`on_event`](Self::on_event) for an event in its JSON form
    pub async fn on_event_json(&self, raw: &str) -> Result<EventOutcome> {
        self.on_event(CaEvent::from_json(raw)?).await
    }

    // ============ Bridge ============

    /// Bridges `amount` of `symbol` to `chain_id`
    pub async fn bridge(
        &self,
        amount: impl ToString,
        chain_id: u64,
        symbol: impl Into<String>,
        gas: Option<u128>,
    ) -> Result<BridgeOutcome> {
        let mut builder = self.bridge_builder().await?.amount(amount).chain(chain_id).token(symbol);
        if let Some(gas) = gas {
            builder = builder.gas(gas);
        }
        builder.exec().await
    }

    /// Starts a fluent bridge call on the session's client
    pub async fn bridge_builder(&self) -> Result<BridgeBuilder> {
        let client = self.inner.client().await.ok_or(CaError::NoSession)?;
        Ok(BridgeBuilder::new(client))
    }

    // ============ Updates ============

    /// Subscribes to record changes
    pub fn subscribe(&self) -> broadcast::Receiver<AdapterUpdate> {
        self.inner.updates.subscribe()
    }
}

impl Drop for CaAdapter {
    fn drop(&mut self) {
        self.inner.abort_pumps();
        if let Ok(mut intent) = self.inner.intent.try_write() {
            intent.stop_timer();
        }
    }
}

impl std::fmt::Debug for CaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaAdapter")
            .field("config", &self.inner.config)
            .finish()
    }
}

// ============ Shared state ============

struct AdapterInner {
    config: AdapterConfig,
    factory: Arc<dyn ClientFactory>,
    registry: Option<Arc<ProviderRegistry>>,
    /// Held across the handshake so initializers serialize
    init_gate: Mutex<()>,
    session: RwLock<SessionRecord>,
    balance: RwLock<Option<BalanceSnapshot>>,
    allowance: RwLock<AllowanceState>,
    intent: RwLock<IntentState>,
    progress: RwLock<ProgressState>,
    updates: UpdateBus,
    pumps: StdMutex<Vec<AbortHandle>>,
}

impl AdapterInner {
    async fn client(&self) -> Option<Arc<dyn ChainAbstractionClient>> {
        self.session.read().await.client.clone()
    }

    async fn ready_handle(&self) -> Option<SessionHandle> {
        let session = self.session.read().await;
        session.status.is_ready().then(|| session.handle())
    }

    /// Handle of a session that is ready or has failed
    async fn settled_handle(&self) -> Option<SessionHandle> {
        let session = self.session.read().await;
        matches!(session.status, SessionStatus::Ready | SessionStatus::Failed(_))
            .then(|| session.handle())
    }

    async fn ensure_session(self: &Arc<Self>, provider: Arc<dyn EvmProvider>) -> SessionHandle {
        if let Some(handle) = self.settled_handle().await {
            return handle;
        }

        let _gate = self.init_gate.lock().await;
        if let Some(handle) = self.settled_handle().await {
            return handle;
        }
        self.start_session(provider).await
    }

    async fn retry_session(self: &Arc<Self>, provider: Arc<dyn EvmProvider>) -> SessionHandle {
        let _gate = self.init_gate.lock().await;
        if let Some(handle) = self.ready_handle().await {
            return handle;
        }
        self.start_session(provider).await
    }

    async fn start_session(self: &Arc<Self>, provider: Arc<dyn EvmProvider>) -> SessionHandle {
        // leftovers of a failed attempt
        self.abort_pumps();

        let client = self.factory.create();
        client.set_evm_provider(Arc::clone(&provider));

        // the client is reachable while initializing so early hook traffic can use it
        let attempt = {
            let mut session = self.session.write().await;
            session.attempts += 1;
            session.status = SessionStatus::Initializing;
            session.client = Some(Arc::clone(&client));
            session.provider = Some(provider);
            session.attempts
        };
        self.updates
            .publish(AdapterUpdate::SessionChanged(SessionStatus::Initializing));
        tracing::info!(attempt, "starting chain-abstraction session");

        self.register_hooks(client.as_ref());

        match Self::handshake(client.as_ref()).await {
            Ok((snapshot, values)) => {
                *self.balance.write().await = Some(snapshot.clone());
                self.allowance.write().await.set_values(values);

                let handle = {
                    let mut session = self.session.write().await;
                    session.status = SessionStatus::Ready;
                    session.handle()
                };
                tracing::info!(attempt, assets = snapshot.len(), "chain-abstraction session ready");
                self.updates
                    .publish(AdapterUpdate::SessionChanged(SessionStatus::Ready));
                self.updates.publish(AdapterUpdate::BalanceUpdated(snapshot));
                handle
            }
            Err(err) => {
                tracing::error!(attempt, error = %err, "chain-abstraction session failed to initialize");
                self.abort_pumps();

                let status = SessionStatus::Failed(err.to_string());
                let handle = {
                    let mut session = self.session.write().await;
                    session.status = status.clone();
                    session.client = None;
                    session.handle()
                };
                self.updates.publish(AdapterUpdate::SessionChanged(status));
                handle
            }
        }
    }

    async fn handshake(
        client: &dyn ChainAbstractionClient,
    ) -> Result<(BalanceSnapshot, Vec<AllowanceValue>)> {
        client.init().await?;
        let snapshot = fetch_snapshot(client).await?;
        let values = client.allowance_values().await?;
        Ok((snapshot, values))
    }

    fn register_hooks(self: &Arc<Self>, client: &dyn ChainAbstractionClient) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (allowance_tx, allowance_rx) = mpsc::unbounded_channel();
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();

        client.add_event_listener(event_tx);
        client.set_allowance_hook(allowance_tx);
        client.set_intent_hook(intent_tx);

        let weak = Arc::downgrade(self);
        let pumps = vec![
            spawn_pump("events", weak.clone(), event_rx, |inner, event: CaEvent| async move {
                if let Err(err) = inner.on_event(event).await {
                    tracing::warn!(error = %err, "progress event handling failed");
                }
            }),
            spawn_pump("allowance", weak.clone(), allowance_rx, |inner, request: AllowanceHookRequest| async move {
                inner.on_allowance_request(request).await
            }),
            spawn_pump("intent", weak, intent_rx, |inner, request: IntentHookRequest| async move {
                inner.on_intent_request(request).await
            }),
        ];

        let mut held = self.pumps.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        held.extend(pumps);
        tracing::debug!(pumps = held.len(), "hook channels registered");
    }

    fn abort_pumps(&self) {
        let mut held = self.pumps.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for pump in held.drain(..) {
            pump.abort();
        }
    }

    async fn get_balance(self: &Arc<Self>, force_refresh: bool) -> Option<BalanceSnapshot> {
        if force_refresh {
            let provider = {
                let session = self.session.read().await;
                session.client.as_ref().and(session.provider.clone())
            };
            if let Some(provider) = provider {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    inner.ensure_session(provider).await;
                });
            }
        }
        self.balance.read().await.clone()
    }

    async fn refresh_balance(&self) -> Result<BalanceSnapshot> {
        let client = self.client().await.ok_or(CaError::NoSession)?;
        let snapshot = fetch_snapshot(client.as_ref()).await?;
        *self.balance.write().await = Some(snapshot.clone());
        self.updates
            .publish(AdapterUpdate::BalanceUpdated(snapshot.clone()));
        Ok(snapshot)
    }

    async fn on_allowance_request(&self, request: AllowanceHookRequest) {
        let sources = request.sources.len();
        let replaced = self
            .allowance
            .write()
            .await
            .receive(request, self.config.default_allowance);
        if replaced {
            tracing::warn!("pending allowance request replaced before it was answered");
        }
        tracing::debug!(sources, "allowance requested");
        self.updates
            .publish(AdapterUpdate::AllowanceRequested { sources });
    }

    async fn on_intent_request(&self, request: IntentHookRequest) {
        let chains = request.intent.source_chain_ids();
        let replaced = self.intent.write().await.receive(request);
        if replaced {
            tracing::warn!("pending intent replaced before it was answered");
        }
        tracing::debug!(source_chains = ?chains, "intent requested");
        self.updates.publish(AdapterUpdate::IntentRequested);
    }

    async fn refresh_intent(&self) -> Result<Intent> {
        let (generation, refresher) = self.intent.write().await.begin_refresh()?;
        let quote = refresher.refresh().await;
        let stored = self.intent.write().await.finish_refresh(generation, &quote);

        match &quote {
            Ok(intent) if stored => {
                tracing::debug!(total = %intent.fees.total, "intent re-quoted");
                self.updates.publish(AdapterUpdate::IntentRefreshed);
            }
            Ok(_) => tracing::debug!("re-quote arrived after the plan was cleared or replaced"),
            Err(err) => tracing::warn!(error = %err, "intent re-quote failed"),
        }
        quote
    }

    async fn start_intent_refresh_timer(self: &Arc<Self>, interval: Option<Duration>) -> Result<()> {
        let period = interval.unwrap_or_else(|| self.config.intent_refresh_interval());
        if period.is_zero() {
            return Err(CaError::ConfigError("intent refresh interval must be non-zero".into()));
        }

        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                // errors are logged by refresh_intent
                let _ = inner.refresh_intent().await;
            }
        });

        self.intent.write().await.set_timer(timer);
        tracing::debug!(period_ms = period.as_millis() as u64, "intent refresh timer started");
        Ok(())
    }

    async fn on_event(&self, event: CaEvent) -> Result<EventOutcome> {
        let kind = event.kind();
        let refetch = matches!(
            &event,
            CaEvent::StepDone(step) if step.type_id == self.config.balance_refresh_step
        );

        let outcome = self.progress.write().await.apply(event);
        match &outcome {
            EventOutcome::Unmatched { type_id } => {
                tracing::debug!(type_id = %type_id, "step done for an untracked step");
            }
            EventOutcome::StepCompleted { all_done: true, .. } => {
                self.intent.write().await.set_completed();
                tracing::info!("all steps done");
            }
            _ => tracing::debug!(event = kind, outcome = ?outcome, "progress event applied"),
        }
        self.updates.publish(AdapterUpdate::Progress(outcome.clone()));

        if refetch {
            self.refresh_balance().await?;
        }
        Ok(outcome)
    }
}

fn spawn_pump<T, F, Fut>(
    name: &'static str,
    inner: Weak<AdapterInner>,
    mut rx: mpsc::UnboundedReceiver<T>,
    handle: F,
) -> AbortHandle
where
    T: Send + 'static,
    F: Fn(Arc<AdapterInner>, T) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let Some(inner) = inner.upgrade() else { break };
            handle(inner, item).await;
        }
        tracing::debug!(pump = name, "hook channel closed");
    })
    .abort_handle()
}
