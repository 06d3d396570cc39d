//! # castate - Chain-Abstraction State Adapter
//!
//! castate sits between a chain-abstraction SDK (unified balances across
//! chains, token allowance negotiation, cross-chain transfer intents) and a
//! wallet UI. It keeps the records the UI renders and relays the UI's
//! decisions back to the SDK.
//!
//! ## Features
//!
//! | Record | Read | Written by |
//! |--------|------|------------|
//! | Session | [`CaAdapter::session_status`] | [`CaAdapter::ensure_session`], [`CaAdapter::retry_session`] |
//! | Balance | [`CaAdapter::get_balance`] | initial fetch, [`CaAdapter::refresh_balance`], balance marker step |
//! | Allowance | [`CaAdapter::allowance`] | SDK allowance hook, accept/reject/clear |
//! | Intent | [`CaAdapter::intent`] | SDK intent hook, accept/reject/refresh/clear |
//! | Progress | [`CaAdapter::progress`] | SDK progress events |
//!
//! Every change is also published on [`CaAdapter::subscribe`].
//!
//! ## Example
//!
//! ```ignore
//! use castate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> castate::Result<()> {
//!     castate::logging::init("info")?;
//!
//!     let adapter = CaAdapter::new(my_sdk_factory());
//!     let session = adapter.ensure_injected_session().await?;
//!     if !session.is_ready() {
//!         eprintln!("session failed: {}", session.status());
//!     }
//!
//!     let outcome = adapter
//!         .bridge_builder()
//!         .await?
//!         .amount("25")
//!         .chain(8453)
//!         .token("USDC")
//!         .exec()
//!         .await?;
//!     println!("intent {}", outcome.intent_id);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod balance;

pub mod allowance;
pub mod bridge;
pub mod config;
pub mod intent;
pub mod logging;
pub mod progress;
pub mod session;
pub mod updates;

// ============================================================================
// Re-exports
// ============================================================================

pub use castate_provider as provider;
pub use castate_traits as traits;

pub use adapter::{AdapterBuilder, CaAdapter};
pub use allowance::{AllowanceState, AllowanceView};
pub use bridge::BridgeBuilder;
pub use config::AdapterConfig;
pub use intent::{IntentState, IntentView};
pub use progress::{EventOutcome, ProgressState, TrackedStep};
pub use session::{SessionHandle, SessionStatus};
pub use updates::AdapterUpdate;

pub use castate_error::{CaError, ErrorCode, ErrorContext, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AdapterConfig, AdapterUpdate, AllowanceView, CaAdapter, CaError, EventOutcome,
        IntentView, ProgressState, Result, SessionHandle, SessionStatus,
    };
    pub use castate_traits::prelude::*;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
