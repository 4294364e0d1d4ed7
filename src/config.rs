use chrono::NaiveDate;
use log::warn;
use std::path::PathBuf;

/// 报表固定的后续交易日列数
pub const MAX_TRACKED_DAYS: usize = 11;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub movers_file: String,
    pub tracker_file: String,
    pub report_file: String,
    pub top_n: usize,
    pub max_days: usize,
    pub cutoff_hour: u32,
    pub timezone: String,
    pub extra_holidays: Vec<NaiveDate>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            data_dir: "data".to_string(),
            movers_file: "movers.json".to_string(),
            tracker_file: "subsequent_cache.json".to_string(),
            report_file: "movers_spreadsheet.csv".to_string(),
            top_n: 5,
            max_days: MAX_TRACKED_DAYS,
            cutoff_hour: 20,
            timezone: "America/New_York".to_string(),
            extra_holidays: Vec::new(),
        }
    }

    /// Overlays `MOVERS_*` environment variables on top of the defaults.
    /// Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(dir) = std::env::var("MOVERS_DATA_DIR") {
            if !dir.trim().is_empty() {
                config = config.with_data_dir(dir.trim());
            }
        }
        if let Some(n) = env_parse::<usize>("MOVERS_TOP_N") {
            config = config.with_top_n(n);
        }
        if let Some(n) = env_parse::<usize>("MOVERS_MAX_DAYS") {
            config = config.with_max_days(n);
        }
        if let Some(h) = env_parse::<u32>("MOVERS_CUTOFF_HOUR") {
            config = config.with_cutoff_hour(h);
        }
        if let Ok(tz) = std::env::var("MOVERS_TIMEZONE") {
            if !tz.trim().is_empty() {
                config = config.with_timezone(tz.trim());
            }
        }
        if let Ok(list) = std::env::var("MOVERS_HOLIDAYS") {
            config = config.with_extra_holidays(parse_holiday_list(&list));
        }

        config
    }

    pub fn with_data_dir(mut self, dir: &str) -> Self {
        self.data_dir = dir.to_string();
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        if top_n == 0 {
            warn!("top_n must be positive, keeping {}", self.top_n);
            return self;
        }
        self.top_n = top_n;
        self
    }

    pub fn with_max_days(mut self, max_days: usize) -> Self {
        if max_days == 0 || max_days > MAX_TRACKED_DAYS {
            warn!(
                "max_days must be within 1..={}, keeping {}",
                MAX_TRACKED_DAYS, self.max_days
            );
            return self;
        }
        self.max_days = max_days;
        self
    }

    pub fn with_cutoff_hour(mut self, hour: u32) -> Self {
        if hour > 23 {
            warn!("cutoff hour {} out of range, keeping {}", hour, self.cutoff_hour);
            return self;
        }
        self.cutoff_hour = hour;
        self
    }

    pub fn with_timezone(mut self, tz: &str) -> Self {
        self.timezone = tz.to_string();
        self
    }

    pub fn with_extra_holidays(mut self, holidays: Vec<NaiveDate>) -> Self {
        self.extra_holidays = holidays;
        self
    }

    pub fn movers_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.movers_file)
    }

    pub fn tracker_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.tracker_file)
    }

    pub fn report_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.report_file)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}={}", key, raw);
            None
        }
    }
}

/// 解析逗号分隔的 YYYY-MM-DD 假日列表
pub fn parse_holiday_list(list: &str) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match NaiveDate::parse_from_str(part, "%Y-%m-%d") {
            Ok(d) => out.push(d),
            Err(e) => warn!("Ignoring invalid holiday '{}': {}", part, e),
        }
    }
    out
}
