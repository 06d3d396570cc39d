//! Cross-chain transfer plan ("intent") types

use async_trait::async_trait;
use castate_error::Result;
use serde::{Deserialize, Serialize};

/// Funds pulled from one source chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSource {
    /// Amount taken from this chain
    pub amount: String,
    /// Chain ID
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    /// Chain display name
    pub chain_name: String,
    /// Chain logo URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_logo: Option<String>,
    /// Token contract on this chain
    pub contract_address: String,
}

/// Where the funds land
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentDestination {
    /// Amount received
    pub amount: String,
    /// Chain ID
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    /// Chain display name
    pub chain_name: String,
    /// Chain logo URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_logo: Option<String>,
}

/// Fee breakdown shown in the fee panel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentFees {
    /// Gas paid by the abstracted account
    pub ca_gas: String,
    /// Gas supplied on the destination
    pub gas_supplied: String,
    /// Protocol fee
    pub protocol: String,
    /// Solver fee
    pub solver: String,
    /// Sum of all fees
    pub total: String,
}

/// Token being moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentToken {
    /// Symbol
    pub symbol: String,
    /// Name
    pub name: String,
    /// Decimal places
    pub decimals: u8,
    /// Logo URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// A proposed cross-chain transfer plan awaiting the user's decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    /// Source chains and amounts
    pub sources: Vec<IntentSource>,
    /// Destination
    pub destination: IntentDestination,
    /// Fees
    pub fees: IntentFees,
    /// Token
    pub token: IntentToken,
    /// Total pulled from all sources (amount + fees)
    pub sources_total: String,
}

impl Intent {
    /// Chain IDs funds are pulled from, in plan order
    pub fn source_chain_ids(&self) -> Vec<u64> {
        self.sources.iter().map(|s| s.chain_id).collect()
    }
}

/// The UI's answer to an intent request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentDecision {
    /// Execute the plan
    Allow,
    /// Abort the transfer
    Deny,
}

/// Re-quotes a pending intent (fees and routes drift while the user decides)
#[async_trait]
pub trait IntentRefresher: Send + Sync {
    /// Returns an updated plan
    async fn refresh(&self) -> Result<Intent>;
}
