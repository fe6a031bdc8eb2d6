//! stock_data provider：当前价格、历史指标、公司概况
//!
//! 上游失败或返回空数据时不报错，返回带 `note` 标记且 simulated=true 的替代结果。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::market::{fetch_history, MarketData, PriceHistory};
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolResult};

pub const MOCK_NOTE: &str = "Mock data used due to API limits";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TickerArgs {
    /// Stock ticker symbol (e.g. 'AAPL', 'GOOGL')
    pub ticker: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HistoryArgs {
    /// Stock ticker symbol (e.g. 'AAPL', 'GOOGL')
    pub ticker: String,
    /// Time period ('1d', '5d', '1mo', '3mo', '6mo', '1y', '5y')
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "1mo".to_string()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// get_stock_price：最近一个交易日的价格与成交量
pub struct StockPriceTool {
    market: Arc<dyn MarketData>,
}

impl StockPriceTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &str {
        "get_stock_price"
    }

    fn description(&self) -> &str {
        "Get current stock price and daily trading information (price, high, low, volume)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<TickerArgs>()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: TickerArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };
        match fetch_history(self.market.as_ref(), &args.ticker, "5d").await {
            Ok(h) => {
                let last = h.closes.len() - 1;
                ToolResult::ok(json!({
                    "ticker": args.ticker,
                    "current_price": round2(h.closes[last]),
                    "day_high": round2(h.highs[last]),
                    "day_low": round2(h.lows[last]),
                    "volume": h.volumes[last],
                    "currency": h.meta.get("currency").cloned().unwrap_or(json!("N/A")),
                }))
            }
            Err(e) => {
                tracing::warn!(ticker = %args.ticker, "price lookup failed ({}), using substitute", e);
                ToolResult::ok(json!({
                    "ticker": args.ticker,
                    "current_price": 420.69,
                    "day_high": 425.00,
                    "day_low": 415.00,
                    "volume": 1_000_000,
                    "market_cap": 2_500_000_000_000u64,
                    "note": MOCK_NOTE,
                }))
                .simulated()
            }
        }
    }
}

/// 由日线历史计算区间指标
pub(crate) fn history_metrics(h: &PriceHistory, period: &str) -> Value {
    let first = h.closes[0];
    let last = h.closes[h.closes.len() - 1];
    let avg = h.closes.iter().sum::<f64>() / h.closes.len() as f64;
    let high = h.highs.iter().cloned().fold(f64::MIN, f64::max);
    let low = h.lows.iter().cloned().fold(f64::MAX, f64::min);
    json!({
        "ticker": h.ticker,
        "period": period,
        "start_price": round2(first),
        "end_price": round2(last),
        "price_change_pct": round2((last - first) / first * 100.0),
        "avg_price": round2(avg),
        "high": round2(high),
        "low": round2(low),
    })
}

/// get_historical_data：区间起止价、涨跌幅、均价、高低点
pub struct HistoricalDataTool {
    market: Arc<dyn MarketData>,
}

impl HistoricalDataTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Tool for HistoricalDataTool {
    fn name(&self) -> &str {
        "get_historical_data"
    }

    fn description(&self) -> &str {
        "Get historical price data and calculate metrics (start/end price, change %, average, high, low)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<HistoryArgs>()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: HistoryArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };
        match fetch_history(self.market.as_ref(), &args.ticker, &args.period).await {
            Ok(h) => ToolResult::ok(history_metrics(&h, &args.period)),
            Err(e) => {
                tracing::warn!(ticker = %args.ticker, "history lookup failed ({}), using substitute", e);
                ToolResult::ok(json!({
                    "ticker": args.ticker,
                    "period": args.period,
                    "start_price": 100.0,
                    "end_price": 110.0,
                    "price_change_pct": 10.0,
                    "avg_price": 105.0,
                    "high": 115.0,
                    "low": 95.0,
                    "note": MOCK_NOTE,
                }))
                .simulated()
            }
        }
    }
}

/// get_stock_info：公司名、交易所、52 周高低等概况
pub struct StockInfoTool {
    market: Arc<dyn MarketData>,
}

impl StockInfoTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Tool for StockInfoTool {
    fn name(&self) -> &str {
        "get_stock_info"
    }

    fn description(&self) -> &str {
        "Get detailed company information for a stock (name, exchange, 52-week range)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<TickerArgs>()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: TickerArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };
        let field = |meta: &Value, key: &str| meta.get(key).cloned().unwrap_or(json!("N/A"));
        match fetch_history(self.market.as_ref(), &args.ticker, "1y").await {
            Ok(h) => ToolResult::ok(json!({
                "ticker": args.ticker,
                "company_name": field(&h.meta, "longName"),
                "exchange": field(&h.meta, "fullExchangeName"),
                "instrument_type": field(&h.meta, "instrumentType"),
                "currency": field(&h.meta, "currency"),
                "52_week_high": round2(h.highs.iter().cloned().fold(f64::MIN, f64::max)),
                "52_week_low": round2(h.lows.iter().cloned().fold(f64::MAX, f64::min)),
            })),
            Err(e) => {
                tracing::warn!(ticker = %args.ticker, "info lookup failed ({}), using substitute", e);
                ToolResult::ok(json!({
                    "ticker": args.ticker,
                    "company_name": format!("{} Corp (Mock)", args.ticker),
                    "sector": "Technology",
                    "industry": "Software",
                    "market_cap": 2_000_000_000_000u64,
                    "pe_ratio": 35.5,
                    "beta": 1.2,
                    "52_week_high": 450.0,
                    "52_week_low": 300.0,
                    "note": MOCK_NOTE,
                }))
                .simulated()
            }
        }
    }
}
