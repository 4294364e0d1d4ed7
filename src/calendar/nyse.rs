use crate::errors::{MoversError, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;

/// Answers whether the reference market trades on a given date.
pub trait TradingCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> Result<bool>;
}

/// Years covered by the embedded holiday table.
const FIRST_YEAR: i32 = 2023;
const LAST_YEAR: i32 = 2027;

// NYSE 全天休市日（含顺延的观察日）
const HOLIDAYS: &[(i32, u32, u32)] = &[
    (2023, 1, 2),
    (2023, 1, 16),
    (2023, 2, 20),
    (2023, 4, 7),
    (2023, 5, 29),
    (2023, 6, 19),
    (2023, 7, 4),
    (2023, 9, 4),
    (2023, 11, 23),
    (2023, 12, 25),
    (2024, 1, 1),
    (2024, 1, 15),
    (2024, 2, 19),
    (2024, 3, 29),
    (2024, 5, 27),
    (2024, 6, 19),
    (2024, 7, 4),
    (2024, 9, 2),
    (2024, 11, 28),
    (2024, 12, 25),
    (2025, 1, 1),
    (2025, 1, 9),
    (2025, 1, 20),
    (2025, 2, 17),
    (2025, 4, 18),
    (2025, 5, 26),
    (2025, 6, 19),
    (2025, 7, 4),
    (2025, 9, 1),
    (2025, 11, 27),
    (2025, 12, 25),
    (2026, 1, 1),
    (2026, 1, 19),
    (2026, 2, 16),
    (2026, 4, 3),
    (2026, 5, 25),
    (2026, 6, 19),
    (2026, 7, 3),
    (2026, 9, 7),
    (2026, 11, 26),
    (2026, 12, 25),
    (2027, 1, 1),
    (2027, 1, 18),
    (2027, 2, 15),
    (2027, 3, 26),
    (2027, 5, 31),
    (2027, 6, 18),
    (2027, 7, 5),
    (2027, 9, 6),
    (2027, 11, 25),
    (2027, 12, 24),
];

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// NYSE calendar backed by an embedded holiday table plus configured extras.
/// Dates outside the table's years are an error, not a guess.
pub struct NyseCalendar {
    holidays: HashSet<NaiveDate>,
}

impl NyseCalendar {
    pub fn new(extra_holidays: &[NaiveDate]) -> Self {
        let mut holidays: HashSet<NaiveDate> = HOLIDAYS
            .iter()
            .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
            .collect();
        holidays.extend(extra_holidays.iter().copied());
        Self { holidays }
    }
}

impl TradingCalendar for NyseCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> Result<bool> {
        if !(FIRST_YEAR..=LAST_YEAR).contains(&date.year()) {
            return Err(MoversError::CalendarError(format!(
                "no NYSE schedule for {} (covered {}-{})",
                date, FIRST_YEAR, LAST_YEAR
            )));
        }
        Ok(!is_weekend(date) && !self.holidays.contains(&date))
    }
}
