//! Flattens the mover and tracker stores into the spreadsheet report and
//! folds the tracked returns into per-cohort statistics.

use crate::config::MAX_TRACKED_DAYS;
use crate::errors::Result;
use crate::models::market::MoverKind;
use crate::models::tracking::{series_key, DayObservation};
use crate::store::{MoverStore, TrackerStore};
use crate::util::{self, fmt_pct, fmt_points, fmt_price};
use log::{error, info, warn};
use std::path::Path;

const IDENTITY_COLUMNS: [&str; 6] = [
    "ticker",
    "event_date",
    "mover_type",
    "direction",
    "Points Change",
    "Event Day %Change",
];

/// 表头：6 个标识列 + 11 组 (%, Open, Close)
pub fn header() -> Vec<String> {
    let mut header: Vec<String> = IDENTITY_COLUMNS.iter().map(|s| s.to_string()).collect();
    for day in 1..=MAX_TRACKED_DAYS {
        header.push(format!("Day {} %", day));
        header.push(format!("Day {} Open", day));
        header.push(format!("Day {} Close", day));
    }
    header
}

pub const COLUMN_COUNT: usize = IDENTITY_COLUMNS.len() + 3 * MAX_TRACKED_DAYS;

fn pct_column(offset: usize) -> usize {
    IDENTITY_COLUMNS.len() + 3 * offset
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    /// 空头方向取相反数
    pub fn apply(&self, pct_long: f64) -> f64 {
        match self {
            Direction::Long => pct_long,
            Direction::Short => -pct_long,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cohort {
    GainerLong,
    GainerShort,
    LoserLong,
    LoserShort,
}

impl Cohort {
    /// Fixed order of the summary block.
    pub const ALL: [Cohort; 4] = [
        Cohort::GainerLong,
        Cohort::GainerShort,
        Cohort::LoserLong,
        Cohort::LoserShort,
    ];

    pub fn of(kind: MoverKind, direction: Direction) -> Self {
        match (kind, direction) {
            (MoverKind::Gainers, Direction::Long) => Cohort::GainerLong,
            (MoverKind::Gainers, Direction::Short) => Cohort::GainerShort,
            (MoverKind::Losers, Direction::Long) => Cohort::LoserLong,
            (MoverKind::Losers, Direction::Short) => Cohort::LoserShort,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Cohort::GainerLong => "Gainer Long",
            Cohort::GainerShort => "Gainer Short",
            Cohort::LoserLong => "Loser Long",
            Cohort::LoserShort => "Loser Short",
        }
    }

    fn index(&self) -> usize {
        match self {
            Cohort::GainerLong => 0,
            Cohort::GainerShort => 1,
            Cohort::LoserLong => 2,
            Cohort::LoserShort => 3,
        }
    }
}

/// Per-cohort, per-offset lists of directional returns for one pass.
#[derive(Debug, Clone, Default)]
pub struct CohortBuckets {
    returns: [[Vec<f64>; MAX_TRACKED_DAYS]; 4],
}

impl CohortBuckets {
    pub fn push(&mut self, cohort: Cohort, offset: usize, value: f64) {
        if let Some(bucket) = self.returns[cohort.index()].get_mut(offset) {
            bucket.push(value);
        }
    }

    pub fn get(&self, cohort: Cohort, offset: usize) -> &[f64] {
        self.returns[cohort.index()]
            .get(offset)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortStats {
    pub total_return: f64,
    pub win_rate: f64,
    pub average: f64,
}

impl CohortStats {
    /// Compounded return, share of positive returns and simple mean, all in
    /// percent and rounded to 2 decimals. `None` for an empty list.
    pub fn compute(returns: &[f64]) -> Option<Self> {
        if returns.is_empty() {
            return None;
        }
        let n = returns.len() as f64;
        let product: f64 = returns.iter().map(|r| 1.0 + r / 100.0).product();
        let wins = returns.iter().filter(|&&r| r > 0.0).count() as f64;
        let sum: f64 = returns.iter().sum();

        Some(Self {
            total_return: util::round_to((product - 1.0) * 100.0, 2),
            win_rate: util::round_to(100.0 * wins / n, 2),
            average: util::round_to(sum / n, 2),
        })
    }
}

fn blank_row() -> Vec<String> {
    vec![String::new(); COLUMN_COUNT]
}

fn summary_rows(buckets: &CohortBuckets) -> Vec<Vec<String>> {
    let mut rows = vec![blank_row()];

    for cohort in Cohort::ALL {
        let mut total = blank_row();
        total[0] = format!("Total {} Return (%)", cohort.label());
        let mut win = blank_row();
        win[0] = format!("Win Rate {} (%)", cohort.label());
        let mut avg = blank_row();
        avg[0] = format!("Avg Daily Return {} (%)", cohort.label());

        for offset in 0..MAX_TRACKED_DAYS {
            let Some(stats) = CohortStats::compute(buckets.get(cohort, offset)) else {
                continue;
            };
            let col = pct_column(offset);
            total[col] = fmt_pct(Some(stats.total_return));
            win[col] = fmt_pct(Some(stats.win_rate));
            avg[col] = fmt_pct(Some(stats.average));
        }

        rows.extend([total, win, avg]);
    }

    rows
}

/// Builds every data row plus the summary block (header excluded).
/// Pure function of the two stores.
pub fn build_rows(movers: &MoverStore, tracker: &TrackerStore) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut buckets = CohortBuckets::default();

    for (event_date, record) in movers.entries() {
        for (kind, item) in record.items() {
            let ticker = item.ticker();
            let key = series_key(&ticker, event_date);
            if tracker.is_malformed(&key) {
                warn!("Ignoring malformed tracked series {}", key);
            }
            let days: &[DayObservation] = tracker.get(&key).map(Vec::as_slice).unwrap_or_default();

            let mut base = blank_row();
            base[0] = ticker;
            base[1] = event_date.clone();
            base[2] = kind.label().to_string();
            base[4] = fmt_points(item.points_change());
            base[5] = fmt_pct(item.event_pct_change());

            let returns: Vec<Option<f64>> = days
                .iter()
                .take(MAX_TRACKED_DAYS)
                .map(DayObservation::long_return)
                .collect();

            for (offset, day) in days.iter().take(MAX_TRACKED_DAYS).enumerate() {
                let col = pct_column(offset);
                base[col + 1] = fmt_price(Some(day.open));
                base[col + 2] = fmt_price(Some(day.close));
            }

            for direction in [Direction::Long, Direction::Short] {
                let cohort = Cohort::of(kind, direction);
                let mut row = base.clone();
                row[3] = direction.label().to_string();
                for (offset, ret) in returns.iter().enumerate() {
                    // 开盘价为 0 的交易日不计入任何统计
                    if let Some(pct) = ret {
                        let value = direction.apply(*pct);
                        row[pct_column(offset)] = fmt_pct(Some(value));
                        buckets.push(cohort, offset, value);
                    }
                }
                rows.push(row);
            }
        }
    }

    rows.extend(summary_rows(&buckets));
    rows
}

fn render_csv(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header())?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::errors::MoversError::DataError(e.to_string()))
}

/// 全量重建报表并原子写入；返回写入的行数（不含表头），失败返回 0
pub fn regenerate(movers_path: &Path, tracker_path: &Path, report_path: &Path) -> usize {
    let rows = if movers_path.exists() {
        let movers = MoverStore::load(movers_path);
        if movers.is_unreadable() {
            error!("Mover store {} is unreadable; keeping previous report", movers_path.display());
            return 0;
        }
        let tracker = TrackerStore::load(tracker_path);
        if tracker.is_unreadable() {
            error!("Tracker store {} is unreadable; keeping previous report", tracker_path.display());
            return 0;
        }
        build_rows(&movers, &tracker)
    } else {
        warn!("Mover store not found at {}; writing header only", movers_path.display());
        Vec::new()
    };

    let written = render_csv(&rows).and_then(|bytes| util::write_atomic(report_path, &bytes));
    match written {
        Ok(()) => {
            info!("Wrote {} rows to {}", rows.len(), report_path.display());
            rows.len()
        }
        Err(e) => {
            error!("Failed to write CSV {}: {}", report_path.display(), e);
            0
        }
    }
}
