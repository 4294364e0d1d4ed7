use crate::calendar::ReferenceZone;
use crate::errors::{MoversError, Result};
use crate::models::market::{MoverKind, PriceBar, RawMover, SymbolDetail};
use crate::scrapers::base::{MoverSource, PriceHistorySource};
use crate::util;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Yahoo Finance 数据源：涨跌榜、个股详情、日线历史
pub struct YahooClient {
    client: Client,
    zone: ReferenceZone,
    last_request: Mutex<Option<Instant>>,
}

impl YahooClient {
    pub fn new(zone: ReferenceZone) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(MoversError::RequestError)?;

        Ok(Self {
            client,
            zone,
            last_request: Mutex::new(None),
        })
    }

    /// 等待请求频率限制
    async fn wait_for_rate_limit(&self) {
        const MIN_INTERVAL: Duration = Duration::from_millis(500);

        let now = Instant::now();
        let should_wait = {
            let mut last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
            let should_wait = match *last {
                Some(instant) if instant.elapsed() < MIN_INTERVAL => {
                    Some(MIN_INTERVAL - instant.elapsed())
                }
                _ => None,
            };
            *last = Some(now);
            should_wait
        };

        if let Some(wait_time) = should_wait {
            debug!("Waiting {:?} for rate limit", wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        self.wait_for_rate_limit().await;
        info!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl MoverSource for YahooClient {
    async fn fetch_top_movers(&self, kind: MoverKind, top_n: usize) -> Result<Vec<RawMover>> {
        let screener = match kind {
            MoverKind::Gainers => "day_gainers",
            MoverKind::Losers => "day_losers",
        };
        let url = format!("{}/v1/finance/screener/predefined/saved", BASE_URL);
        let json = self
            .get_json(
                &url,
                &[("scrIds", screener.to_string()), ("count", top_n.to_string())],
            )
            .await?;

        let movers = parse_screener(&json, top_n)?;
        info!("Top {} {}:", top_n, screener);
        for (i, m) in movers.iter().enumerate() {
            info!(
                "{}: {} | {} | {} | {} | {}",
                i + 1,
                m.symbol,
                m.name,
                m.price,
                m.change,
                m.pct_change
            );
        }
        Ok(movers)
    }

    async fn fetch_symbol_detail(&self, symbol: &str) -> Result<SymbolDetail> {
        let url = format!("{}/v8/finance/chart/{}", BASE_URL, symbol);
        let json = self
            .get_json(
                &url,
                &[("range", "1d".to_string()), ("interval", "1d".to_string())],
            )
            .await?;
        parse_chart_detail(&json)
    }
}

#[async_trait]
impl PriceHistorySource for YahooClient {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let period = |d: NaiveDate| -> Result<String> {
            let midnight = d
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| MoversError::DataError(format!("invalid date {}", d)))?;
            Ok(Utc.from_utc_datetime(&midnight).timestamp().to_string())
        };

        let url = format!("{}/v8/finance/chart/{}", BASE_URL, ticker);
        let json = self
            .get_json(
                &url,
                &[
                    ("period1", period(start)?),
                    ("period2", period(end)?),
                    ("interval", "1d".to_string()),
                    ("events", "history".to_string()),
                ],
            )
            .await?;

        let bars = parse_chart_history(&json, self.zone)?;
        debug!("Fetched {} daily bars for {}", bars.len(), ticker);
        Ok(bars)
    }
}

/// Yahoo 的数值字段可能是数字，也可能是 `{"raw": .., "fmt": ..}`
fn json_number(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    v.as_f64()
        .or_else(|| v.get("raw").and_then(Value::as_f64))
        .filter(|n| n.is_finite())
}

fn json_text(v: Option<&Value>) -> String {
    v.and_then(Value::as_str).unwrap_or_default().to_string()
}

fn chart_result(json: &Value) -> Result<&Value> {
    let chart = json
        .get("chart")
        .ok_or_else(|| MoversError::SourceError("missing chart object".to_string()))?;
    if let Some(err) = chart.get("error").filter(|e| !e.is_null()) {
        return Err(MoversError::SourceError(format!("chart error: {}", err)));
    }
    chart
        .get("result")
        .and_then(|r| r.get(0))
        .ok_or_else(|| MoversError::SourceError("empty chart result".to_string()))
}

pub fn parse_screener(json: &Value, top_n: usize) -> Result<Vec<RawMover>> {
    let quotes = json
        .pointer("/finance/result/0/quotes")
        .and_then(Value::as_array)
        .ok_or_else(|| MoversError::SourceError("screener response has no quotes".to_string()))?;

    let movers = quotes
        .iter()
        .take(top_n)
        .filter_map(|q| {
            let symbol = json_text(q.get("symbol"));
            if symbol.is_empty() {
                return None;
            }
            let name = q
                .get("shortName")
                .or_else(|| q.get("longName"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(RawMover {
                symbol,
                name,
                price: util::fmt_price(json_number(q.get("regularMarketPrice"))),
                change: util::fmt_points(json_number(q.get("regularMarketChange"))),
                pct_change: util::fmt_pct(json_number(q.get("regularMarketChangePercent"))),
            })
        })
        .collect();

    Ok(movers)
}

pub fn parse_chart_detail(json: &Value) -> Result<SymbolDetail> {
    let result = chart_result(json)?;
    let meta = result.get("meta");

    let open = result
        .pointer("/indicators/quote/0/open")
        .and_then(Value::as_array)
        .and_then(|opens| opens.iter().rev().find_map(|o| json_number(Some(o))));

    // 与页面上的 "Previous Close" 一致，缺失时退回最新价
    let close = meta
        .and_then(|m| {
            json_number(m.get("previousClose")).or_else(|| json_number(m.get("chartPreviousClose")))
        })
        .or_else(|| meta.and_then(|m| json_number(m.get("regularMarketPrice"))));

    let change_pts = match (open, close) {
        (Some(o), Some(c)) => Some(util::round_to(c - o, 6)),
        _ => None,
    };

    Ok(SymbolDetail { open, close, change_pts })
}

pub fn parse_chart_history(json: &Value, zone: ReferenceZone) -> Result<Vec<PriceBar>> {
    let result = chart_result(json)?;

    let timestamps = match result.get("timestamp").and_then(Value::as_array) {
        Some(ts) => ts,
        // 区间内没有交易日时 Yahoo 不返回 timestamp
        None => return Ok(Vec::new()),
    };
    let quote = result.pointer("/indicators/quote/0");
    let column = |name: &str| -> Vec<Value> {
        quote
            .and_then(|q| q.get(name))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };
    let opens = column("open");
    let closes = column("close");

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(secs) = ts.as_i64() else { continue };
        let Some(utc) = Utc.timestamp_opt(secs, 0).single() else { continue };
        bars.push(PriceBar {
            date: zone.localize(utc).date_naive(),
            open: json_number(opens.get(i)),
            close: json_number(closes.get(i)),
        });
    }
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn screener_rows_are_rendered_like_the_site() {
        let json = json!({"finance": {"result": [{"quotes": [
            {"symbol": "ACME", "shortName": "Acme Corp", "regularMarketPrice": 12.5,
             "regularMarketChange": 2.5, "regularMarketChangePercent": {"raw": 25.0, "fmt": "25.00%"}},
            {"symbol": "BETA", "longName": "Beta Inc", "regularMarketPrice": 3.0,
             "regularMarketChange": -0.5, "regularMarketChangePercent": -14.2857},
            {"symbol": "GAMMA"}
        ]}]}});

        let movers = parse_screener(&json, 2).unwrap();
        assert_eq!(movers.len(), 2);
        assert_eq!(movers[0].symbol, "ACME");
        assert_eq!(movers[0].price, "12.50");
        assert_eq!(movers[0].change, "+2.50");
        assert_eq!(movers[0].pct_change, "+25.00%");
        assert_eq!(movers[1].name, "Beta Inc");
        assert_eq!(movers[1].pct_change, "-14.29%");
    }

    #[test]
    fn screener_without_quotes_is_an_error() {
        assert!(parse_screener(&json!({"finance": {"result": []}}), 5).is_err());
    }

    #[test]
    fn detail_uses_previous_close() {
        let json = json!({"chart": {"error": null, "result": [{
            "meta": {"regularMarketPrice": 11.0, "previousClose": 10.5},
            "indicators": {"quote": [{"open": [null, 10.0]}]}
        }]}});
        let detail = parse_chart_detail(&json).unwrap();
        assert_eq!(detail.open, Some(10.0));
        assert_eq!(detail.close, Some(10.5));
        assert_eq!(detail.change_pts, Some(0.5));
    }

    #[test]
    fn detail_missing_open_has_no_points() {
        let json = json!({"chart": {"result": [{
            "meta": {"regularMarketPrice": 11.0},
            "indicators": {"quote": [{}]}
        }]}});
        let detail = parse_chart_detail(&json).unwrap();
        assert_eq!(detail.open, None);
        assert_eq!(detail.close, Some(11.0));
        assert_eq!(detail.change_pts, None);
    }

    #[test]
    fn chart_error_is_reported() {
        let json = json!({"chart": {"result": null, "error": {"code": "Not Found"}}});
        assert!(parse_chart_detail(&json).is_err());
    }

    #[test]
    fn history_is_dated_in_reference_zone() {
        // 2026-03-03 14:30 UTC = 09:30 EST, 2026-03-04 14:30 UTC
        let json = json!({"chart": {"result": [{
            "timestamp": [1772548200i64, 1772634600i64],
            "indicators": {"quote": [{"open": [10.0, null], "close": [11.0, 12.0]}]}
        }]}});
        let zone = ReferenceZone::resolve("America/New_York");
        let bars = parse_chart_history(&json, zone).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert_eq!(bars[0].open, Some(10.0));
        assert_eq!(bars[1].open, None);
        assert_eq!(bars[1].close, Some(12.0));
    }

    #[test]
    fn history_without_timestamps_is_empty() {
        let json = json!({"chart": {"result": [{"meta": {}}]}});
        let zone = ReferenceZone::resolve("America/New_York");
        assert!(parse_chart_history(&json, zone).unwrap().is_empty());
    }
}
