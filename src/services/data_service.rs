use crate::calendar::MarketOracle;
use crate::config::Config;
use crate::scrapers::base::{MoverSource, PriceHistorySource};
use crate::services::acquisition::{AcquireOutcome, MoverAcquisition};
use crate::services::report;
use crate::services::tracker::SubsequentTracker;
use crate::store::{MoverStore, TrackerStore};
use log::info;
use std::sync::Arc;

/// Outcome of the daily job.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub acquisition: AcquireOutcome,
    pub appended: usize,
    pub report_rows: usize,
}

/// 存储概况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatus {
    pub event_dates: usize,
    pub tracked_series: usize,
    pub complete_series: usize,
    pub pending_series: usize,
    pub malformed_entries: usize,
}

/// 数据服务：串联抓取、跟踪和报表三个步骤
pub struct DataService {
    config: Config,
    acquisition: MoverAcquisition,
    tracker: SubsequentTracker,
}

impl DataService {
    pub fn new(
        config: Config,
        oracle: Arc<MarketOracle>,
        movers: Arc<dyn MoverSource + Send + Sync>,
        history: Arc<dyn PriceHistorySource + Send + Sync>,
    ) -> Self {
        let acquisition =
            MoverAcquisition::new(oracle.clone(), movers, config.top_n, config.cutoff_hour);
        let tracker = SubsequentTracker::new(oracle, history, config.cutoff_hour);
        Self {
            config,
            acquisition,
            tracker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Acquire today's movers; a newly persisted record triggers one tracker
    /// pass and a report regenerate.
    pub async fn acquire_today(&self) -> AcquireOutcome {
        let outcome = self
            .acquisition
            .acquire_today(&self.config.movers_path())
            .await;
        if outcome.is_persisted() {
            self.advance_all().await;
            self.regenerate();
        }
        outcome
    }

    pub async fn advance_all(&self) -> usize {
        self.tracker
            .advance_all(
                &self.config.movers_path(),
                &self.config.tracker_path(),
                self.config.max_days,
            )
            .await
    }

    pub fn regenerate(&self) -> usize {
        report::regenerate(
            &self.config.movers_path(),
            &self.config.tracker_path(),
            &self.config.report_path(),
        )
    }

    /// 每日任务：抓取（不触发后续步骤）、跟踪一轮、重建报表
    pub async fn run_daily(&self) -> RunSummary {
        let acquisition = self
            .acquisition
            .acquire_today(&self.config.movers_path())
            .await;
        info!("Acquisition: {:?}", acquisition);

        let appended = self.advance_all().await;
        info!("fetch_subsequent appended {} new subsequent day(s)", appended);

        let report_rows = self.regenerate();
        RunSummary {
            acquisition,
            appended,
            report_rows,
        }
    }

    pub fn status(&self) -> StoreStatus {
        let movers = MoverStore::load(&self.config.movers_path());
        let tracker = TrackerStore::load(&self.config.tracker_path());

        let complete_series = tracker
            .entries()
            .filter(|(_, days)| days.len() >= self.config.max_days)
            .count();
        let tracked = tracker.entries().count();

        StoreStatus {
            event_dates: movers.len(),
            tracked_series: tracked,
            complete_series,
            pending_series: tracked - complete_series,
            malformed_entries: movers.malformed_len() + tracker.malformed_len(),
        }
    }
}
