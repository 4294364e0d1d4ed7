use crate::util;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 保存价格时保留的小数位
const PRICE_DECIMALS: i32 = 4;

/// One subsequent trading day of a tracked event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayObservation {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct_long: Option<f64>,
}

impl DayObservation {
    /// Prices are rounded before the return is computed, so the stored
    /// `pct_long` always equals a recomputation from the stored prices.
    pub fn new(date: NaiveDate, open: f64, close: f64) -> Self {
        let open = util::round_to(open, PRICE_DECIMALS);
        let close = util::round_to(close, PRICE_DECIMALS);
        Self {
            date,
            open,
            close,
            pct_long: util::pct_long(open, close),
        }
    }

    /// 读取多头收益；缺失时按开盘/收盘重新计算（开盘为 0 时为 None）
    pub fn long_return(&self) -> Option<f64> {
        self.pct_long.or_else(|| util::pct_long(self.open, self.close))
    }
}

/// Tracker key `TICKER|EVENT_DATE`.
pub fn series_key(ticker: &str, event_date: &str) -> String {
    format!("{}|{}", ticker, event_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn zero_open_omits_pct_long() {
        let obs = DayObservation::new(day(3), 0.0, 4.2);
        assert_eq!(obs.pct_long, None);
        assert_eq!(obs.long_return(), None);

        let json = serde_json::to_value(obs).unwrap();
        assert!(json.get("pct_long").is_none());
        assert_eq!(json["date"], "2026-03-03");
    }

    #[test]
    fn stored_return_matches_recomputation() {
        let obs = DayObservation::new(day(4), 13.456789, 14.012345);
        let recomputed = util::pct_long(obs.open, obs.close);
        assert_eq!(obs.pct_long, recomputed);
        assert_eq!(obs.open, 13.4568);
    }

    #[test]
    fn missing_field_is_recomputed_on_read() {
        let obs: DayObservation =
            serde_json::from_str(r#"{"date":"2026-03-05","open":10.0,"close":9.0}"#).unwrap();
        assert_eq!(obs.pct_long, None);
        assert_eq!(obs.long_return(), Some(-10.0));
    }

    #[test]
    fn key_joins_ticker_and_date() {
        assert_eq!(series_key("ACME", "2026-03-02"), "ACME|2026-03-02");
    }
}
