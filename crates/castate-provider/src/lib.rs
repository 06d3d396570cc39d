//! # castate Provider
//!
//! Wallet provider plumbing for the castate adapter.
//!
//! ## Features
//!
//! - [`JsonRpcProvider`]: an [`EvmProvider`] that forwards EIP-1193 requests to
//!   a JSON-RPC endpoint, with connection reuse and request rate limiting
//! - [`ProviderRegistry`]: named slots a host injects wallet providers into;
//!   the adapter reads the well-known [`ETHEREUM_SLOT`] when asked to start a
//!   session from the injected provider
//!
//! ## Example
//!
//! ```ignore
//! use castate_provider::{JsonRpcProvider, ProviderConfig, ProviderRegistry, ETHEREUM_SLOT};
//! use std::sync::Arc;
//!
//! let provider = JsonRpcProvider::new(ProviderConfig::new("http://localhost:8545"))?;
//! ProviderRegistry::global().inject(ETHEREUM_SLOT, Arc::new(provider));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use castate_error::CaError;
use castate_traits::EvmProvider;
use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Slot name hosts inject the EVM wallet under
pub const ETHEREUM_SLOT: &str = "ethereum";

/// Provider-related errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RPC error response
    #[error("RPC error: code={code}, message={message}")]
    RpcError {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<ProviderError> for CaError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RpcError { code, message } => CaError::RpcError { code, message },
            ProviderError::InvalidUrl(reason) | ProviderError::InvalidConfig(reason) => {
                CaError::ConfigError(reason)
            }
            other => CaError::RpcRequestError {
                method: "request".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Configuration for a JSON-RPC wallet endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// RPC URL
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum requests per second
    pub requests_per_second: u32,
    /// Burst size
    pub burst_size: u32,
}

impl ProviderConfig {
    /// Creates a new provider configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: 30,
            requests_per_second: 10,
            burst_size: 20,
        }
    }

    /// Sets the request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the rate limit
    pub fn with_rate_limit(mut self, requests_per_second: u32, burst_size: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self.burst_size = burst_size;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.url).map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;
        if self.requests_per_second == 0 || self.burst_size == 0 {
            return Err(ProviderError::InvalidConfig(
                "rate limit values must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new("http://localhost:8545")
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(serde::Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(serde::Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Wallet provider backed by a JSON-RPC endpoint
pub struct JsonRpcProvider {
    url: String,
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    request_id: AtomicU64,
}

impl JsonRpcProvider {
    /// Creates a provider for the configured endpoint
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("castate/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| ProviderError::InvalidConfig("requests_per_second is zero".into()))?;
        let burst = NonZeroU32::new(config.burst_size)
            .ok_or_else(|| ProviderError::InvalidConfig("burst_size is zero".into()))?;

        Ok(Self {
            url: config.url,
            client,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
            request_id: AtomicU64::new(1),
        })
    }

    /// Makes a JSON-RPC request
    pub async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        tracing::debug!(method, id, url = %self.url, "wallet rpc call");

        let response = self.client.post(&self.url).json(&request).send().await?;
        let rpc_response: JsonRpcResponse = response.json().await?;

        if let Some(error) = rpc_response.error {
            return Err(ProviderError::RpcError {
                code: error.code,
                message: error.message,
            });
        }

        rpc_response.result.ok_or_else(|| ProviderError::RpcError {
            code: -1,
            message: "No result in response".to_string(),
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the number of requests made
    pub fn request_count(&self) -> u64 {
        self.request_id.load(Ordering::SeqCst) - 1
    }
}

impl std::fmt::Debug for JsonRpcProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcProvider")
            .field("url", &self.url)
            .field("request_count", &self.request_count())
            .finish()
    }
}

#[async_trait]
impl EvmProvider for JsonRpcProvider {
    async fn request(&self, method: &str, params: Value) -> castate_error::Result<Value> {
        Ok(self.rpc_call(method, params).await?)
    }
}

static GLOBAL_REGISTRY: Lazy<ProviderRegistry> = Lazy::new(ProviderRegistry::new);

/// Named slots hosts inject wallet providers into
#[derive(Default)]
pub struct ProviderRegistry {
    slots: DashMap<String, Arc<dyn EvmProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Process-wide registry, the equivalent of a host's global provider slot
    pub fn global() -> &'static ProviderRegistry {
        &GLOBAL_REGISTRY
    }

    /// Puts a provider into a slot, replacing any previous one
    pub fn inject(&self, slot: impl Into<String>, provider: Arc<dyn EvmProvider>) {
        let slot = slot.into();
        tracing::info!(slot = %slot, "wallet provider injected");
        self.slots.insert(slot, provider);
    }

    /// Reads the provider in a slot
    pub fn get(&self, slot: &str) -> Option<Arc<dyn EvmProvider>> {
        self.slots.get(slot).map(|entry| entry.value().clone())
    }

    /// Empties a slot
    pub fn remove(&self, slot: &str) -> Option<Arc<dyn EvmProvider>> {
        self.slots.remove(slot).map(|(_, provider)| provider)
    }

    /// Names of the occupied slots
    pub fn slots(&self) -> Vec<String> {
        self.slots.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("slots", &self.slots())
            .finish()
    }
}
