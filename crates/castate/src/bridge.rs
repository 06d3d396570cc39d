//! Fluent bridge invocation

use castate_error::Result;
use castate_traits::{BridgeOutcome, BridgeRequest, ChainAbstractionClient};
use std::fmt;
use std::sync::Arc;

/// Collects a transfer and runs it through the session's SDK client.
///
/// Nothing is validated here; whatever the SDK says comes back as is.
///
/// ```ignore
/// let outcome = adapter
///     .bridge_builder()
///     .await?
///     .amount("12.5")
///     .chain(8453)
///     .token("USDC")
///     .exec()
///     .await?;
/// ```
#[must_use = "a bridge does nothing until `exec` is awaited"]
pub struct BridgeBuilder {
    client: Arc<dyn ChainAbstractionClient>,
    request: BridgeRequest,
}

impl BridgeBuilder {
    pub(crate) fn new(client: Arc<dyn ChainAbstractionClient>) -> Self {
        Self {
            client,
            request: BridgeRequest::new(),
        }
    }

    /// Sets the amount (string or number)
    pub fn amount(mut self, amount: impl ToString) -> Self {
        self.request = self.request.amount(amount);
        self
    }

    /// Sets the destination chain
    pub fn chain(mut self, chain_id: u64) -> Self {
        self.request = self.request.chain(chain_id);
        self
    }

    /// Sets the token symbol
    pub fn token(mut self, symbol: impl Into<String>) -> Self {
        self.request = self.request.token(symbol);
        self
    }

    /// Sets the destination gas budget
    pub fn gas(mut self, gas: u128) -> Self {
        self.request = self.request.gas(gas);
        self
    }

    /// The request as collected so far
    pub fn request(&self) -> &BridgeRequest {
        &self.request
    }

    /// Runs the transfer
    pub async fn exec(self) -> Result<BridgeOutcome> {
        tracing::info!(
            amount = ?self.request.amount,
            chain_id = ?self.request.chain_id,
            token = ?self.request.token,
            "bridging"
        );
        self.client.bridge(self.request).await
    }
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("request", &self.request)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castate_testing::MockCaClient;

    #[tokio::test]
    async fn test_exec_passes_request_through() {
        let mock = MockCaClient::new();
        let outcome = BridgeBuilder::new(Arc::new(mock.clone()))
            .amount(2)
            .chain(137)
            .token("USDT")
            .gas(50_000)
            .exec()
            .await
            .unwrap();

        assert_eq!(outcome.intent_id, "mock-intent-1");
        assert_eq!(
            mock.bridge_requests(),
            vec![BridgeRequest::new().amount(2).chain(137).token("USDT").gas(50_000)]
        );
    }

    #[tokio::test]
    async fn test_sdk_error_unmodified() {
        let mock = MockCaClient::new();
        mock.fail_bridge(Some("insufficient balance"));

        let err = BridgeBuilder::new(Arc::new(mock)).amount(1).exec().await.unwrap_err();
        assert!(matches!(
            err,
            castate_error::CaError::Sdk { ref operation, ref reason }
                if operation == "bridge" && reason == "insufficient balance"
        ));
    }
}
