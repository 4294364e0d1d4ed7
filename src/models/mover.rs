use crate::models::market::{MoverKind, RawMover, SymbolDetail};
use crate::util;
use serde::{Deserialize, Serialize};

/// 榜单中的一只股票（已补充开盘/收盘数据）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverItem {
    pub symbol: String,
    pub name: String,
    pub price: String,
    pub change: String,
    pub pct_change: String,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub change_pts: Option<f64>,
}

impl MoverItem {
    /// An item whose enrichment failed keeps its scraped text and null prices.
    pub fn unenriched(raw: RawMover) -> Self {
        Self::enriched(raw, SymbolDetail::default())
    }

    pub fn enriched(raw: RawMover, detail: SymbolDetail) -> Self {
        Self {
            symbol: raw.symbol,
            name: raw.name,
            price: raw.price,
            change: raw.change,
            pct_change: raw.pct_change,
            open: detail.open,
            close: detail.close,
            change_pts: detail.change_pts,
        }
    }

    /// 下游统一使用的代码（join key）
    pub fn ticker(&self) -> String {
        util::clean_symbol(&self.symbol)
    }

    pub fn has_numeric_signal(&self) -> bool {
        self.close.is_some() || !self.pct_change.trim().is_empty()
    }

    pub fn event_pct_change(&self) -> Option<f64> {
        util::parse_number(&self.pct_change)
    }

    /// Event-day point change: the enriched value, else the first number in
    /// the scraped change text.
    pub fn points_change(&self) -> Option<f64> {
        self.change_pts
            .or_else(|| util::first_signed_number(&self.change))
    }
}

/// 某个交易日的涨跌榜记录，写入后不再修改
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoverRecord {
    pub scraped_at: String,
    #[serde(default)]
    pub gainers: Vec<MoverItem>,
    #[serde(default)]
    pub losers: Vec<MoverItem>,
}

impl MoverRecord {
    /// Gainers first, then losers, each in rank order.
    pub fn items(&self) -> impl Iterator<Item = (MoverKind, &MoverItem)> {
        self.gainers
            .iter()
            .map(|i| (MoverKind::Gainers, i))
            .chain(self.losers.iter().map(|i| (MoverKind::Losers, i)))
    }

    pub fn has_numeric_signal(&self) -> bool {
        self.items().any(|(_, item)| item.has_numeric_signal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(symbol: &str, pct: &str) -> RawMover {
        RawMover {
            symbol: symbol.to_string(),
            name: "Acme".to_string(),
            price: "12.00".to_string(),
            change: "+2.00".to_string(),
            pct_change: pct.to_string(),
        }
    }

    #[test]
    fn points_prefer_enriched_value() {
        let item = MoverItem::enriched(
            raw("acme", "+20%"),
            SymbolDetail { open: Some(10.0), close: Some(12.5), change_pts: Some(2.5) },
        );
        assert_eq!(item.points_change(), Some(2.5));
        assert_eq!(item.ticker(), "ACME");

        let item = MoverItem::unenriched(raw("acme", "+20%"));
        assert_eq!(item.points_change(), Some(2.0));
        assert_eq!(item.event_pct_change(), Some(20.0));
    }

    #[test]
    fn numeric_signal_needs_close_or_pct() {
        let item = MoverItem::unenriched(raw("X", ""));
        assert!(!item.has_numeric_signal());

        let item = MoverItem::unenriched(raw("X", "-4.1%"));
        assert!(item.has_numeric_signal());

        let item = MoverItem::enriched(
            raw("X", ""),
            SymbolDetail { close: Some(1.0), ..Default::default() },
        );
        assert!(item.has_numeric_signal());
    }

    #[test]
    fn record_decodes_with_missing_fields() {
        let json = r#"{"scraped_at":"2026-03-02T20:05:00-05:00","gainers":[{"symbol":"ABC"}]}"#;
        let record: MoverRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.gainers.len(), 1);
        assert!(record.losers.is_empty());
        assert_eq!(record.gainers[0].open, None);

        let kinds: Vec<_> = record.items().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![MoverKind::Gainers]);
    }
}
