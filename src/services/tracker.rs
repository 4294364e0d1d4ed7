use crate::calendar::MarketOracle;
use crate::models::mover::MoverRecord;
use crate::models::tracking::{series_key, DayObservation};
use crate::scrapers::base::PriceHistorySource;
use crate::store::{MoverStore, TrackerStore};
use chrono::{Days, NaiveDate};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// What happened to one `TICKER|EVENT_DATE` series during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStep {
    Appended,
    Complete,
    Waiting,
    SessionOpen,
    MissingPrices,
    Skipped,
}

/// 跟踪每个异动事件之后的交易日表现，每次运行每个键最多追加一天
pub struct SubsequentTracker {
    oracle: Arc<MarketOracle>,
    history: Arc<dyn PriceHistorySource + Send + Sync>,
    cutoff_hour: u32,
}

impl SubsequentTracker {
    pub fn new(
        oracle: Arc<MarketOracle>,
        history: Arc<dyn PriceHistorySource + Send + Sync>,
        cutoff_hour: u32,
    ) -> Self {
        Self {
            oracle,
            history,
            cutoff_hour,
        }
    }

    /// Loads both stores, advances every series by at most one day and
    /// saves the tracker store iff something was appended. Returns the
    /// number of appended days; a failed save reports 0.
    pub async fn advance_all(&self, movers_path: &Path, tracker_path: &Path, max_days: usize) -> usize {
        let movers = MoverStore::load(movers_path);
        let mut tracker = TrackerStore::load(tracker_path);
        if tracker.is_unreadable() {
            error!("Tracker store {} is unreadable; skipping pass", tracker_path.display());
            return 0;
        }

        let appended = self.advance_store(&movers, &mut tracker, max_days).await;
        if appended == 0 {
            info!("No new subsequent days appended");
            return 0;
        }

        match tracker.save() {
            Ok(()) => {
                info!("Appended {} new subsequent day(s)", appended);
                appended
            }
            Err(e) => {
                error!("Failed to save cache {}: {}", tracker_path.display(), e);
                0
            }
        }
    }

    /// In-memory pass over every mover, in ascending event-date order.
    pub async fn advance_store(
        &self,
        movers: &MoverStore,
        tracker: &mut TrackerStore,
        max_days: usize,
    ) -> usize {
        let today = self.oracle.today();
        let mut seen = HashSet::new();
        let mut appended = 0;

        for (event_key, record) in movers.entries() {
            let event_date = match NaiveDate::parse_from_str(event_key, "%Y-%m-%d") {
                Ok(d) => d,
                Err(e) => {
                    warn!("Invalid event date '{}': {}", event_key, e);
                    continue;
                }
            };

            for ticker in tickers(record) {
                let key = series_key(&ticker, event_key);
                if !seen.insert(key.clone()) {
                    continue;
                }
                let step = self
                    .advance_series(tracker, &key, &ticker, event_date, today, max_days)
                    .await;
                if step == SeriesStep::Appended {
                    appended += 1;
                }
            }
        }

        appended
    }

    async fn advance_series(
        &self,
        tracker: &mut TrackerStore,
        key: &str,
        ticker: &str,
        event_date: NaiveDate,
        today: NaiveDate,
        max_days: usize,
    ) -> SeriesStep {
        if tracker.is_malformed(key) {
            warn!("Cached value for {} is not a day list; skipping", key);
            return SeriesStep::Skipped;
        }

        let existing = tracker.get(key).map(Vec::as_slice).unwrap_or_default();
        let n = existing.len();
        if n >= max_days {
            return SeriesStep::Complete;
        }

        let (Some(start), Some(end)) = (
            event_date.checked_add_days(Days::new(1)),
            today.checked_add_days(Days::new(1)),
        ) else {
            warn!("Date overflow while tracking {}", key);
            return SeriesStep::Skipped;
        };

        let bars = match self.history.fetch_daily_history(ticker, start, end).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!("Failed to fetch history for {}: {}", ticker, e);
                return SeriesStep::Skipped;
            }
        };

        let mut candidates: Vec<_> = bars.into_iter().filter(|b| b.date > event_date).collect();
        candidates.sort_by_key(|b| b.date);
        candidates.dedup_by_key(|b| b.date);

        let Some(candidate) = candidates.get(n).copied() else {
            debug!("No new trading day available yet for {}", key);
            return SeriesStep::Waiting;
        };

        // 第 n 个候选日只有在前 n 个日期与已存序列一致时才是下一个偏移日
        let prefix_matches = candidates[..n]
            .iter()
            .map(|b| b.date)
            .eq(existing.iter().map(|d| d.date));
        if !prefix_matches {
            warn!(
                "History for {} does not line up with {} stored day(s); not appending {}",
                key, n, candidate.date
            );
            return SeriesStep::Skipped;
        }

        if !self.oracle.is_session_complete(candidate.date, self.cutoff_hour) {
            debug!("Session {} not complete yet for {}", candidate.date, key);
            return SeriesStep::SessionOpen;
        }

        // 缺少开盘或收盘价视为“尚未可用”，下次运行重试
        let (Some(open), Some(close)) = (candidate.open, candidate.close) else {
            info!("No OHLC for {} on {}; skipping", key, candidate.date);
            return SeriesStep::MissingPrices;
        };

        let day = DayObservation::new(candidate.date, open, close);
        match tracker.get_mut(key) {
            Some(series) => series.push(day),
            None => {
                tracker.insert_new(key.to_string(), vec![day]);
            }
        }
        info!("Appended subsequent day for {}: {:?}", key, day);
        SeriesStep::Appended
    }
}

/// 规范化后的代码，先涨幅榜后跌幅榜，跳过空代码
fn tickers(record: &MoverRecord) -> Vec<String> {
    record
        .items()
        .map(|(_, item)| item.ticker())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::errors::{MoversError, Result};
    use crate::models::market::PriceBar;
    use crate::scrapers::base::PriceHistorySource;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 内存中的日线数据源
    #[derive(Default)]
    pub struct FakeHistory {
        pub bars: HashMap<String, Vec<PriceBar>>,
        pub failing: Vec<String>,
        pub calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    }

    impl FakeHistory {
        pub fn with_days(mut self, ticker: &str, days: &[(NaiveDate, Option<f64>, Option<f64>)]) -> Self {
            let bars = days
                .iter()
                .map(|&(date, open, close)| PriceBar { date, open, close })
                .collect();
            self.bars.insert(ticker.to_string(), bars);
            self
        }
    }

    #[async_trait]
    impl PriceHistorySource for FakeHistory {
        async fn fetch_daily_history(
            &self,
            ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PriceBar>> {
            self.calls.lock().unwrap().push((ticker.to_string(), start, end));
            if self.failing.iter().any(|t| t == ticker) {
                return Err(MoversError::SourceError(format!("timeout for {}", ticker)));
            }
            Ok(self
                .bars
                .get(ticker)
                .map(|bars| {
                    bars.iter()
                        .filter(|b| b.date >= start && b.date < end)
                        .copied()
                        .collect()
                })
                .unwrap_or_default())
        }
    }
}
