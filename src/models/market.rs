use chrono::NaiveDate;

/// 涨幅榜 / 跌幅榜
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoverKind {
    Gainers,
    Losers,
}

impl MoverKind {
    pub fn label(&self) -> &'static str {
        match self {
            MoverKind::Gainers => "gainer",
            MoverKind::Losers => "loser",
        }
    }
}

/// One ranked row as scraped, before enrichment. Text fields keep the
/// source's rendering (e.g. `+24.91%`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMover {
    pub symbol: String,
    pub name: String,
    pub price: String,
    pub change: String,
    pub pct_change: String,
}

/// 单只股票详情，任一字段都可能缺失
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SymbolDetail {
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub change_pts: Option<f64>,
}

/// 日线数据，日期为参考时区下的交易日
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub close: Option<f64>,
}
