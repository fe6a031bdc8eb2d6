//! 行情数据源
//!
//! MarketData 抽象上游（历史价格、公司概况、新闻）；YahooMarketData 经 reqwest 访问 Yahoo Finance 公开接口。
//! 上游不可达时由调用方（stock_data / plot provider）决定是否返回替代数据。

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// 日线历史
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<u64>,
    /// 元数据：longName、fiftyTwoWeekHigh 等
    pub meta: Value,
}

impl PriceHistory {
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub publisher: String,
    pub published: String,
    pub link: Option<String>,
}

/// 上游行情源
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn history(&self, ticker: &str, period: &str) -> Result<PriceHistory, String>;

    async fn news(&self, ticker: &str, limit: usize) -> Result<Vec<NewsItem>, String>;
}

/// 取历史并把空序列视为失败，调用方可以放心索引首尾元素
pub async fn fetch_history(
    market: &dyn MarketData,
    ticker: &str,
    period: &str,
) -> Result<PriceHistory, String> {
    let history = market.history(ticker, period).await?;
    if history.is_empty() || history.highs.len() != history.closes.len() {
        return Err("Empty data".to_string());
    }
    Ok(history)
}

/// 支持的区间
pub const PERIODS: [&str; 7] = ["1d", "5d", "1mo", "3mo", "6mo", "1y", "5y"];

/// 区间对应的大致交易日数；未知区间按 1mo
pub fn period_days(period: &str) -> usize {
    match period {
        "1d" => 1,
        "5d" => 5,
        "3mo" => 63,
        "6mo" => 126,
        "1y" => 252,
        "5y" => 1260,
        _ => 21,
    }
}

/// 确定性的替代价格序列：同一 ticker 与区间总是得到同一条曲线
pub fn substitute_closes(ticker: &str, period: &str) -> Vec<f64> {
    let seed = ticker.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let phase = (seed % 360) as f64 / 57.3;
    let days = period_days(period).max(2);
    (0..days)
        .map(|i| {
            let t = i as f64;
            let price = 100.0 + 8.0 * (t / 9.0 + phase).sin() + 3.0 * (t / 3.0).cos() + t * 0.05;
            (price * 100.0).round() / 100.0
        })
        .collect()
}

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const YAHOO_SEARCH_URL: &str = "https://query1.finance.yahoo.com/v1/finance/search";

/// Yahoo Finance 公开接口
pub struct YahooMarketData {
    client: reqwest::Client,
}

impl YahooMarketData {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("hive/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, String> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("upstream returned {status}"));
        }
        resp.json::<Value>().await.map_err(|e| e.to_string())
    }
}

fn number_series(v: &Value) -> Vec<Option<f64>> {
    v.as_array()
        .map(|arr| arr.iter().map(Value::as_f64).collect())
        .unwrap_or_default()
}

/// 解析 chart 接口返回；缺失值（null）的交易日整体跳过
pub(crate) fn parse_chart(ticker: &str, body: &Value) -> Result<PriceHistory, String> {
    let result = body
        .pointer("/chart/result/0")
        .ok_or_else(|| "Empty data".to_string())?;
    let quote = result
        .pointer("/indicators/quote/0")
        .ok_or_else(|| "Empty data".to_string())?;

    let closes = number_series(&quote["close"]);
    let highs = number_series(&quote["high"]);
    let lows = number_series(&quote["low"]);
    let volumes = number_series(&quote["volume"]);

    let mut history = PriceHistory {
        ticker: ticker.to_string(),
        closes: Vec::new(),
        highs: Vec::new(),
        lows: Vec::new(),
        volumes: Vec::new(),
        meta: result.get("meta").cloned().unwrap_or(Value::Null),
    };
    for (i, close) in closes.iter().enumerate() {
        let (Some(c), Some(Some(h)), Some(Some(l))) = (close, highs.get(i), lows.get(i)) else {
            continue;
        };
        history.closes.push(*c);
        history.highs.push(*h);
        history.lows.push(*l);
        history
            .volumes
            .push(volumes.get(i).copied().flatten().unwrap_or(0.0) as u64);
    }
    if history.is_empty() {
        return Err("Empty data".to_string());
    }
    Ok(history)
}

#[async_trait]
impl MarketData for YahooMarketData {
    async fn history(&self, ticker: &str, period: &str) -> Result<PriceHistory, String> {
        let url = format!("{YAHOO_CHART_URL}/{ticker}");
        let body = self
            .get_json(&url, &[("range", period.to_string()), ("interval", "1d".to_string())])
            .await?;
        parse_chart(ticker, &body)
    }

    async fn news(&self, ticker: &str, limit: usize) -> Result<Vec<NewsItem>, String> {
        let body = self
            .get_json(
                YAHOO_SEARCH_URL,
                &[
                    ("q", ticker.to_string()),
                    ("newsCount", limit.to_string()),
                    ("quotesCount", "0".to_string()),
                ],
            )
            .await?;
        let items = body
            .get("news")
            .and_then(Value::as_array)
            .ok_or_else(|| "missing news field".to_string())?;
        Ok(items
            .iter()
            .take(limit)
            .map(|item| NewsItem {
                title: item["title"].as_str().unwrap_or("N/A").to_string(),
                publisher: item["publisher"].as_str().unwrap_or("N/A").to_string(),
                published: item["providerPublishTime"]
                    .as_i64()
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                link: item["link"].as_str().map(str::to_string),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chart_skips_null_days() {
        let body = json!({
            "chart": {"result": [{
                "meta": {"longName": "Apple Inc."},
                "indicators": {"quote": [{
                    "close": [100.0, null, 102.5],
                    "high": [101.0, 103.0, 104.0],
                    "low": [99.0, 100.0, 101.0],
                    "volume": [1000, 2000, null]
                }]}
            }]}
        });
        let h = parse_chart("AAPL", &body).unwrap();
        assert_eq!(h.closes, vec![100.0, 102.5]);
        assert_eq!(h.volumes, vec![1000, 0]);
        assert_eq!(h.meta["longName"], "Apple Inc.");
    }

    #[test]
    fn test_parse_chart_empty_is_error() {
        assert!(parse_chart("X", &json!({"chart": {"result": null}})).is_err());
    }

    #[test]
    fn test_substitute_closes_is_deterministic() {
        let a = substitute_closes("TSLA", "3mo");
        assert_eq!(a, substitute_closes("TSLA", "3mo"));
        assert_eq!(a.len(), period_days("3mo"));
        assert_ne!(a, substitute_closes("AAPL", "3mo"));
    }
}
