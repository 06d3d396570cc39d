//! Allowance negotiation types

use castate_error::CaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token a required allowance applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    /// Contract address
    pub contract_address: String,
    /// Decimal places
    pub decimals: u8,
    /// Token symbol
    pub symbol: String,
    /// Token name
    pub name: String,
}

/// One source chain that needs an allowance before the transfer can run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceSource {
    /// Minimum allowance the transfer needs
    pub min_allowance: String,
    /// Allowance currently granted
    pub current_allowance: String,
    /// Chain ID
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    /// Chain display name
    pub chain_name: String,
    /// Token descriptor
    pub token: TokenDescriptor,
}

/// Per-source allowance picked by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AllowanceChoice {
    /// Exactly what the transfer needs
    Min,
    /// Unlimited approval
    Max,
    /// An exact amount in the token's smallest unit
    Exact(u128),
}

impl fmt::Display for AllowanceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowanceChoice::Min => write!(f, "min"),
            AllowanceChoice::Max => write!(f, "max"),
            AllowanceChoice::Exact(amount) => write!(f, "{}", amount),
        }
    }
}

impl From<AllowanceChoice> for String {
    fn from(choice: AllowanceChoice) -> Self {
        choice.to_string()
    }
}

impl TryFrom<String> for AllowanceChoice {
    type Error = CaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for AllowanceChoice {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "min" => Ok(AllowanceChoice::Min),
            "max" => Ok(AllowanceChoice::Max),
            other => other
                .parse::<u128>()
                .map(AllowanceChoice::Exact)
                .map_err(|e| CaError::InvalidAmount(format!("'{}': {}", other, e))),
        }
    }
}

/// Raw allowance currently granted on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceValue {
    /// Chain ID
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    /// Granted allowance in the token's smallest unit
    #[serde(with = "u128_string")]
    pub allowance: u128,
    /// Token symbol or address
    pub token: String,
}

/// The UI's answer to an allowance request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceDecision {
    /// Approve with one choice per source
    Allow(Vec<AllowanceChoice>),
    /// Refuse the approval
    Deny,
}

/// Serializes u128 amounts as decimal strings.
///
/// Reads decimal strings or integer numbers. JSON numbers above `u64::MAX`
/// arrive from serde_json as floats and lose precision, so they are refused;
/// amounts that large must be sent as strings.
mod u128_string {
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    struct AmountVisitor;

    impl<'de> de::Visitor<'de> for AmountVisitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "a non-negative integer or a decimal string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            v.trim().parse().map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(v as u128)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom(format!("negative amount {}", v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u128, E> {
            Err(E::custom(format!(
                "amount {} is not an exact integer; send amounts above u64::MAX as strings",
                v
            )))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}
