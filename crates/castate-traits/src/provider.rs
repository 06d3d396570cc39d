//! Wallet provider seam

use async_trait::async_trait;
use castate_error::{CaError, Result};
use serde_json::Value;

/// EIP-1193 style wallet provider able to sign and send on an EVM chain.
///
/// The adapter never inspects the provider; it hands it to the SDK client.
#[async_trait]
pub trait EvmProvider: Send + Sync {
    /// Sends a JSON-RPC request through the wallet
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    /// Returns the chain the wallet is connected to
    async fn chain_id(&self) -> Result<u64> {
        let raw = self.request("eth_chainId", Value::Array(vec![])).await?;
        let text = raw.as_str().ok_or_else(|| CaError::RpcRequestError {
            method: "eth_chainId".to_string(),
            reason: format!("expected hex string, got {}", raw),
        })?;
        parse_hex_quantity(text)
    }

    /// Returns the accounts the wallet exposes
    async fn accounts(&self) -> Result<Vec<String>> {
        let raw = self.request("eth_accounts", Value::Array(vec![])).await?;
        let accounts: Vec<String> = serde_json::from_value(raw)?;
        for account in &accounts {
            validate_evm_address(account)?;
        }
        Ok(accounts)
    }
}

/// Parses a `0x`-prefixed JSON-RPC quantity
pub fn parse_hex_quantity(text: &str) -> Result<u64> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| CaError::InvalidAmount(format!("missing 0x prefix: {}", text)))?;
    u64::from_str_radix(digits, 16).map_err(|e| CaError::InvalidAmount(format!("{}: {}", text, e)))
}

/// Checks that `address` is `0x` followed by 20 hex-encoded bytes
pub fn validate_evm_address(address: &str) -> Result<()> {
    let invalid = |reason: &str| CaError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let body = address.strip_prefix("0x").ok_or_else(|| invalid("missing 0x prefix"))?;
    if body.len() != 40 {
        return Err(invalid("expected 40 hex characters"));
    }
    hex::decode(body).map_err(|e| invalid(&e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedProvider(Value);

    #[async_trait]
    impl EvmProvider for FixedProvider {
        async fn request(&self, _method: &str, _params: Value) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x1").unwrap(), 1);
        assert_eq!(parse_hex_quantity("0xa4b1").unwrap(), 42161);
        assert!(parse_hex_quantity("42161").is_err());
        assert!(parse_hex_quantity("0xzz").is_err());
    }

    #[test]
    fn test_validate_evm_address() {
        assert!(validate_evm_address("0x742d35Cc6634C0532925a3b844Bc9e7595f5fFb9").is_ok());
        assert!(validate_evm_address("742d35Cc6634C0532925a3b844Bc9e7595f5fFb9").is_err());
        assert!(validate_evm_address("0x742d35Cc6634C0532925a3b844Bc9e7595f5").is_err());
        assert!(validate_evm_address("0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG").is_err());
    }

    #[tokio::test]
    async fn test_default_chain_id() {
        let provider = FixedProvider(json!("0x89"));
        assert_eq!(provider.chain_id().await.unwrap(), 137);
    }

    #[tokio::test]
    async fn test_default_accounts_validates() {
        let provider = FixedProvider(json!(["0x742d35Cc6634C0532925a3b844Bc9e7595f5fFb9"]));
        assert_eq!(provider.accounts().await.unwrap().len(), 1);

        let bad = FixedProvider(json!(["not-an-address"]));
        assert!(bad.accounts().await.is_err());
    }
}
