use crate::calendar::MarketOracle;
use crate::models::market::{MoverKind, RawMover};
use crate::models::mover::{MoverItem, MoverRecord};
use crate::scrapers::base::MoverSource;
use crate::store::MoverStore;
use chrono::NaiveDate;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    NotTradingDay(NaiveDate),
    SessionOpen(NaiveDate),
    AlreadyRecorded(NaiveDate),
    NoMovers(NaiveDate),
    NoNumericData(NaiveDate),
    Persisted {
        date: NaiveDate,
        gainers: usize,
        losers: usize,
    },
    Failed(String),
}

impl AcquireOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, AcquireOutcome::Persisted { .. })
    }
}

/// 抓取当日涨跌榜并按日期写入（每个日期只写一次）
pub struct MoverAcquisition {
    oracle: Arc<MarketOracle>,
    source: Arc<dyn MoverSource + Send + Sync>,
    top_n: usize,
    cutoff_hour: u32,
}

impl MoverAcquisition {
    pub fn new(
        oracle: Arc<MarketOracle>,
        source: Arc<dyn MoverSource + Send + Sync>,
        top_n: usize,
        cutoff_hour: u32,
    ) -> Self {
        Self {
            oracle,
            source,
            top_n,
            cutoff_hour,
        }
    }

    pub async fn acquire_today(&self, movers_path: &Path) -> AcquireOutcome {
        let now = self.oracle.now();
        let today = now.date_naive();
        let date_key = today.format("%Y-%m-%d").to_string();

        if !self.oracle.is_trading_day(today) {
            info!("Not a market day ({}); skipping persist.", date_key);
            return AcquireOutcome::NotTradingDay(today);
        }

        if !self.oracle.is_session_complete(today, self.cutoff_hour) {
            info!(
                "Before cutoff ({}:00). Current reference time: {}; skipping.",
                self.cutoff_hour,
                now.time()
            );
            return AcquireOutcome::SessionOpen(today);
        }

        let mut store = MoverStore::load(movers_path);
        if store.is_unreadable() {
            error!("Mover store {} is unreadable; not scraping", movers_path.display());
            return AcquireOutcome::Failed("mover store unreadable".to_string());
        }
        if store.contains_key(&date_key) {
            info!("Entry for {} already exists; not overwriting.", date_key);
            return AcquireOutcome::AlreadyRecorded(today);
        }

        let (gainers, losers) = match self.scrape().await {
            Ok(lists) => lists,
            Err(e) => {
                warn!("Failed to fetch mover lists: {}", e);
                return AcquireOutcome::Failed(e.to_string());
            }
        };
        if gainers.is_empty() && losers.is_empty() {
            info!("No movers found; skipping persist.");
            return AcquireOutcome::NoMovers(today);
        }

        let record = MoverRecord {
            scraped_at: now.to_rfc3339(),
            gainers: self.enrich(gainers).await,
            losers: self.enrich(losers).await,
        };

        if !record.has_numeric_signal() {
            info!("No valid numeric data found after enrichment; skipping persist.");
            return AcquireOutcome::NoNumericData(today);
        }

        let (gainer_count, loser_count) = (record.gainers.len(), record.losers.len());
        if !store.insert_new(date_key.clone(), record) {
            info!("Entry for {} already exists; not overwriting.", date_key);
            return AcquireOutcome::AlreadyRecorded(today);
        }
        if let Err(e) = store.save() {
            error!("Failed to save movers to {}: {}", movers_path.display(), e);
            return AcquireOutcome::Failed(e.to_string());
        }

        info!(
            "Persisted {} gainers and {} losers for {}",
            gainer_count, loser_count, date_key
        );
        AcquireOutcome::Persisted {
            date: today,
            gainers: gainer_count,
            losers: loser_count,
        }
    }

    async fn scrape(&self) -> crate::errors::Result<(Vec<RawMover>, Vec<RawMover>)> {
        let mut gainers = self
            .source
            .fetch_top_movers(MoverKind::Gainers, self.top_n)
            .await?;
        let mut losers = self
            .source
            .fetch_top_movers(MoverKind::Losers, self.top_n)
            .await?;
        gainers.truncate(self.top_n);
        losers.truncate(self.top_n);
        Ok((gainers, losers))
    }

    /// 补充开盘/收盘/涨跌点数；失败时保留条目，价格字段为空
    async fn enrich(&self, pool: Vec<RawMover>) -> Vec<MoverItem> {
        let mut items = Vec::with_capacity(pool.len());
        for raw in pool {
            let symbol = crate::util::clean_symbol(&raw.symbol);
            if symbol.is_empty() {
                items.push(MoverItem::unenriched(raw));
                continue;
            }
            match self.source.fetch_symbol_detail(&symbol).await {
                Ok(detail) => items.push(MoverItem::enriched(raw, detail)),
                Err(e) => {
                    warn!("Failed to fetch symbol detail for {}: {}", symbol, e);
                    items.push(MoverItem::unenriched(raw));
                }
            }
        }
        items
    }
}
