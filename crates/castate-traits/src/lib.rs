//! # castate Traits
//!
//! Domain types and the trait seams between the castate adapter and the
//! outside world. The chain-abstraction SDK is reached through
//! [`ChainAbstractionClient`], the wallet through [`EvmProvider`].
//!
//! ## Core Traits
//!
//! - [`ChainAbstractionClient`] - The SDK client (handshake, balances, allowances, bridge)
//! - [`ClientFactory`] - Lazily constructs SDK clients for new sessions
//! - [`EvmProvider`] - EIP-1193 style wallet provider
//! - [`IntentRefresher`] - Re-quotes a pending intent
//!
//! ## Hook channels
//!
//! The SDK pushes into the adapter over typed channels instead of callbacks:
//! [`CaEvent`] for progress, [`AllowanceHookRequest`] and [`IntentHookRequest`]
//! for negotiations. Each negotiation carries a one-shot responder the UI
//! answers through the adapter.
//!
//! ## Example
//!
//! ```ignore
//! use castate_traits::prelude::*;
//!
//! async fn symbols(client: &dyn ChainAbstractionClient) -> Result<Vec<String>> {
//!     let balances = client.unified_balances().await?;
//!     Ok(balances.into_iter().map(|b| b.symbol).collect())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allowance;
pub mod balance;
pub mod client;
pub mod intent;
pub mod progress;
pub mod provider;

pub use allowance::{AllowanceChoice, AllowanceDecision, AllowanceSource, AllowanceValue, TokenDescriptor};
pub use balance::{BalanceSnapshot, ChainBalance, ChainInfo, NetworkKind, TokenBalance};
pub use client::{
    AllowanceHookRequest, AllowanceHookSink, BridgeOutcome, BridgeRequest, ChainAbstractionClient,
    ClientFactory, EventSink, IntentHookRequest, IntentHookSink, TxHash,
};
pub use intent::{Intent, IntentDecision, IntentDestination, IntentFees, IntentRefresher, IntentSource, IntentToken};
pub use progress::{CaEvent, ProgressStep};
pub use provider::{parse_hex_quantity, validate_evm_address, EvmProvider};

pub use castate_error::{CaError, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AllowanceChoice, AllowanceDecision, AllowanceHookRequest, AllowanceSource, AllowanceValue,
        BalanceSnapshot, BridgeOutcome, BridgeRequest, CaError, CaEvent, ChainAbstractionClient,
        ChainBalance, ChainInfo, ClientFactory, EvmProvider, Intent, IntentDecision,
        IntentHookRequest, IntentRefresher, NetworkKind, ProgressStep, Result, TokenBalance,
        TokenDescriptor,
    };
}
