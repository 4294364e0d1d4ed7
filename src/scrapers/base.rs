use crate::models::market::{MoverKind, PriceBar, RawMover, SymbolDetail};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of the ranked top-mover lists and per-symbol quote details.
#[async_trait]
pub trait MoverSource {
    /// Fetch the first `top_n` rows of the ranked list, in rank order
    async fn fetch_top_movers(&self, kind: MoverKind, top_n: usize) -> Result<Vec<RawMover>>;

    /// Fetch open / close / point change for a symbol; any field may be absent
    async fn fetch_symbol_detail(&self, symbol: &str) -> Result<SymbolDetail>;
}

/// Source of daily price history.
#[async_trait]
pub trait PriceHistorySource {
    /// Daily bars with `start <= date < end`, ordered by date.
    /// An `Ok(vec![])` means no rows; failures are `Err`.
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>>;
}
