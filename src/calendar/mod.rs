//! Market time oracle: the one place that knows what "now" is, which days
//! trade, and whether a day's session counts as final.

pub mod nyse;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use chrono_tz::Tz;
use log::warn;
use std::sync::{Arc, Mutex};

pub use nyse::{is_weekend, NyseCalendar, TradingCalendar};

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 可手动拨动的时钟，用于测试和 `--now` 模拟运行
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Reference timezone, or the explicit UTC fallback when the zone name
/// cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceZone {
    Named(Tz),
    UtcFallback,
}

impl ReferenceZone {
    pub fn resolve(name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => ReferenceZone::Named(tz),
            Err(e) => {
                warn!(
                    "Unknown timezone '{}' ({}); falling back to naive UTC clock",
                    name, e
                );
                ReferenceZone::UtcFallback
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ReferenceZone::UtcFallback)
    }

    pub fn localize(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            ReferenceZone::Named(tz) => {
                let local = utc.with_timezone(tz);
                let offset = local.offset().fix();
                local.with_timezone(&offset)
            }
            ReferenceZone::UtcFallback => utc.with_timezone(&Utc.fix()),
        }
    }
}

pub struct MarketOracle {
    clock: Arc<dyn Clock>,
    calendar: Arc<dyn TradingCalendar + Send + Sync>,
    zone: ReferenceZone,
}

impl MarketOracle {
    pub fn new(
        clock: Arc<dyn Clock>,
        calendar: Arc<dyn TradingCalendar + Send + Sync>,
        zone: ReferenceZone,
    ) -> Self {
        Self { clock, calendar, zone }
    }

    /// Current moment in the reference timezone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.zone.localize(self.clock.now_utc())
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// 日历查询失败时退化为“非周六周日”
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        match self.calendar.is_trading_day(date) {
            Ok(trading) => trading,
            Err(e) => {
                warn!("Calendar lookup failed for {}: {}; using weekday heuristic", date, e);
                !is_weekend(date)
            }
        }
    }

    /// True once reference-zone wall time reaches `cutoff_hour:00` on `date`.
    pub fn is_session_complete(&self, date: NaiveDate, cutoff_hour: u32) -> bool {
        match date.and_hms_opt(cutoff_hour, 0, 0) {
            Some(cutoff) => self.now().naive_local() >= cutoff,
            None => {
                warn!("Invalid cutoff hour {}; treating {} as incomplete", cutoff_hour, date);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::TimeZone;

    /// 始终查询失败的日历
    pub struct FailingCalendar;

    impl TradingCalendar for FailingCalendar {
        fn is_trading_day(&self, _date: NaiveDate) -> crate::errors::Result<bool> {
            Err(crate::errors::MoversError::CalendarError("offline".to_string()))
        }
    }

    pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    pub fn ny_oracle(clock: Arc<FixedClock>) -> MarketOracle {
        MarketOracle::new(
            clock,
            Arc::new(NyseCalendar::new(&[])),
            ReferenceZone::resolve("America/New_York"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn now_is_in_reference_zone() {
        // 2026-03-03 00:30 UTC 是纽约 3 月 2 日 19:30 (EST)
        let clock = Arc::new(FixedClock::new(utc(2026, 3, 3, 0, 30)));
        let oracle = ny_oracle(clock);
        assert_eq!(oracle.today(), date(2026, 3, 2));
        assert_eq!(oracle.now().offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn session_completes_at_cutoff() {
        let clock = Arc::new(FixedClock::new(utc(2026, 3, 3, 0, 59)));
        let oracle = ny_oracle(clock.clone());
        assert!(!oracle.is_session_complete(date(2026, 3, 2), 20));

        clock.set(utc(2026, 3, 3, 1, 0));
        assert!(oracle.is_session_complete(date(2026, 3, 2), 20));
        // 之后的日期尚未完成
        assert!(!oracle.is_session_complete(date(2026, 3, 3), 20));
    }

    #[test]
    fn dst_shifts_the_cutoff() {
        // 7 月为 EDT (UTC-4)，20:00 ET = 00:00 UTC
        let clock = Arc::new(FixedClock::new(utc(2026, 7, 8, 0, 0)));
        let oracle = ny_oracle(clock);
        assert!(oracle.is_session_complete(date(2026, 7, 7), 20));
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        let zone = ReferenceZone::resolve("Mars/Olympus_Mons");
        assert!(zone.is_fallback());

        let clock = Arc::new(FixedClock::new(utc(2026, 3, 3, 0, 30)));
        let oracle = MarketOracle::new(clock, Arc::new(NyseCalendar::new(&[])), zone);
        assert_eq!(oracle.today(), date(2026, 3, 3));
        assert_eq!(oracle.now().offset().local_minus_utc(), 0);
    }

    #[test]
    fn calendar_failure_degrades_to_weekdays() {
        let clock = Arc::new(FixedClock::new(utc(2026, 3, 3, 0, 30)));
        let oracle = MarketOracle::new(
            clock,
            Arc::new(FailingCalendar),
            ReferenceZone::resolve("America/New_York"),
        );
        // Thanksgiving 也被视为交易日
        assert!(oracle.is_trading_day(date(2026, 11, 26)));
        assert!(!oracle.is_trading_day(date(2026, 11, 28)));
    }
}
