//! Unified balance fetching

use castate_error::Result;
use castate_traits::{BalanceSnapshot, ChainAbstractionClient};

/// Fetches a fresh snapshot; SDK errors come back unmodified
pub(crate) async fn fetch_snapshot(client: &dyn ChainAbstractionClient) -> Result<BalanceSnapshot> {
    let assets = client.unified_balances().await?;
    tracing::debug!(
        assets = assets.len(),
        symbols = ?assets.iter().map(|a| a.symbol.as_str()).collect::<Vec<_>>(),
        "unified balances fetched"
    );
    Ok(BalanceSnapshot::new(assets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use castate_testing::{sample_balances, MockCaClient};

    #[tokio::test]
    async fn test_fetch_wraps_assets() {
        let mock = MockCaClient::new().with_balances(sample_balances());
        let snapshot = fetch_snapshot(&mock).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.asset("usdc").is_some());
        assert!((snapshot.total_fiat() - 1650.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let mock = MockCaClient::new();
        mock.fail_balances(Some("rate limited"));
        assert!(fetch_snapshot(&mock).await.is_err());
        assert_eq!(mock.balance_calls(), 1);
    }
}
