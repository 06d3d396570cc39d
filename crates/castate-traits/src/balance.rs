//! Unified balance types

use serde::{Deserialize, Serialize};

/// Kind of network a holding lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    /// EVM-compatible chain
    #[default]
    Evm,
}

/// Chain identity as reported by the SDK
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Chain ID
    pub id: u64,
    /// Display name
    pub name: String,
    /// Logo URL
    pub logo: String,
}

/// Holding of one token on one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBalance {
    /// Chain the holding lives on
    pub chain: ChainInfo,
    /// Network kind
    #[serde(default)]
    pub network: NetworkKind,
    /// Token contract address on that chain
    pub contract_address: String,
    /// Whether this is the chain's native token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_native: Option<bool>,
    /// Human-readable balance
    pub balance: String,
    /// Fiat value of the balance
    pub balance_in_fiat: f64,
}

/// Aggregated balance of one token across all chains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// Token symbol (e.g. "USDC")
    pub symbol: String,
    /// Human-readable aggregated balance
    pub balance: String,
    /// Fiat value of the aggregated balance
    pub balance_in_fiat: f64,
    /// Decimal precision of the token
    pub decimals: u8,
    /// Icon URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Per-chain breakdown
    #[serde(default)]
    pub breakdown: Vec<ChainBalance>,
    /// Held locally (outside the abstracted account)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<bool>,
    /// Held by the abstracted account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstracted: Option<bool>,
}

impl TokenBalance {
    /// Returns the holding on the given chain, if any
    pub fn on_chain(&self, chain_id: u64) -> Option<&ChainBalance> {
        self.breakdown.iter().find(|b| b.chain.id == chain_id)
    }
}

/// The most recently fetched unified balance list.
///
/// Always replaced wholesale; never merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceSnapshot {
    /// Per-token entries in SDK order
    pub assets: Vec<TokenBalance>,
}

impl BalanceSnapshot {
    /// Wraps a fetched balance list
    pub fn new(assets: Vec<TokenBalance>) -> Self {
        Self { assets }
    }

    /// Looks up a token by symbol (case-insensitive)
    pub fn asset(&self, symbol: &str) -> Option<&TokenBalance> {
        self.assets.iter().find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Sum of the fiat value of every token
    pub fn total_fiat(&self) -> f64 {
        self.assets.iter().map(|a| a.balance_in_fiat).sum()
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// True when the SDK reported no tokens
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl From<Vec<TokenBalance>> for BalanceSnapshot {
    fn from(assets: Vec<TokenBalance>) -> Self {
        Self::new(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDK_JSON: &str = r#"[
        {
            "symbol": "USDC",
            "balance": "12.5",
            "balanceInFiat": 12.49,
            "decimals": 6,
            "icon": "https://icons/usdc.svg",
            "breakdown": [
                {
                    "chain": { "id": 10, "name": "OP Mainnet", "logo": "https://logos/op.svg" },
                    "network": "evm",
                    "contractAddress": "0x0b2c639c533813f4aa9d7837caf62653d097ff85",
                    "balance": "12.5",
                    "balanceInFiat": 12.49
                }
            ],
            "abstracted": true
        },
        {
            "symbol": "ETH",
            "balance": "0.01",
            "balanceInFiat": 30.0,
            "decimals": 18,
            "breakdown": []
        }
    ]"#;

    #[test]
    fn test_deserialize_sdk_shape() {
        let snapshot: BalanceSnapshot = serde_json::from_str(SDK_JSON).unwrap();
        assert_eq!(snapshot.len(), 2);

        let usdc = snapshot.asset("usdc").unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.abstracted, Some(true));
        assert_eq!(usdc.local, None);
        assert_eq!(usdc.breakdown[0].network, NetworkKind::Evm);
        assert!(usdc.on_chain(10).is_some());
        assert!(usdc.on_chain(1).is_none());

        let eth = snapshot.asset("ETH").unwrap();
        assert!(eth.icon.is_none());
    }

    #[test]
    fn test_total_fiat() {
        let snapshot: BalanceSnapshot = serde_json::from_str(SDK_JSON).unwrap();
        assert!((snapshot.total_fiat() - 42.49).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = BalanceSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total_fiat(), 0.0);
        assert!(snapshot.asset("ETH").is_none());
    }

    #[test]
    fn test_transparent_serialization() {
        let snapshot: BalanceSnapshot = serde_json::from_str(SDK_JSON).unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["balanceInFiat"], 12.49);
        assert!(json[0].get("local").is_none());
    }
}
