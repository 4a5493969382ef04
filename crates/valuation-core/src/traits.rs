use async_trait::async_trait;
use crate::{EarningsRecord, PricePoint, ValuationError};

/// Source of quarterly earnings and daily adjusted prices.
///
/// Both methods return records in provider order (most recent first),
/// truncated to at most `limit` entries. Entries past `limit` are never
/// parsed, so a malformed old record cannot fail the request.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn quarterly_earnings(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<EarningsRecord>, ValuationError>;

    async fn daily_adjusted_prices(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<PricePoint>, ValuationError>;

    fn provider_name(&self) -> &'static str;
}

/// Source of the free-text strategic growth summary.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// `Ok(None)` means the provider answered without a completion.
    async fn strategy_summary(&self, symbol: &str) -> Result<Option<String>, ValuationError>;

    fn provider_name(&self) -> &'static str;
}
