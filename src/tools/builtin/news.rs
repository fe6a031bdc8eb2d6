//! news provider：最近新闻标题
//!
//! 新闻没有替代数据：上游失败直接返回 ToolResult::failure，由 Worker 写进叙述。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::market::MarketData;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewsArgs {
    /// Stock ticker symbol (e.g. 'AAPL', 'GOOGL')
    pub ticker: String,
    /// Maximum number of articles to retrieve
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// get_stock_news
pub struct StockNewsTool {
    market: Arc<dyn MarketData>,
}

impl StockNewsTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Tool for StockNewsTool {
    fn name(&self) -> &str {
        "get_stock_news"
    }

    fn description(&self) -> &str {
        "Get recent news articles (title, publisher, date) for a stock ticker."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<NewsArgs>()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: NewsArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };
        match self.market.news(&args.ticker, args.limit).await {
            Ok(articles) => ToolResult::ok(json!({
                "ticker": args.ticker,
                "articles": articles,
            })),
            Err(e) => {
                tracing::warn!(ticker = %args.ticker, "news lookup failed: {}", e);
                ToolResult::failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::market::{NewsItem, PriceHistory};
    use crate::tools::builtin::test_support::FixedMarket;

    struct Headlines;

    #[async_trait]
    impl MarketData for Headlines {
        async fn history(&self, _ticker: &str, _period: &str) -> Result<PriceHistory, String> {
            Err("unused".into())
        }

        async fn news(&self, ticker: &str, limit: usize) -> Result<Vec<NewsItem>, String> {
            Ok((0..limit.min(3))
                .map(|i| NewsItem {
                    title: format!("{ticker} headline {i}"),
                    publisher: "Wire".into(),
                    published: "2024-05-01".into(),
                    link: None,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_news_respects_limit() {
        let tool = StockNewsTool::new(Arc::new(Headlines));
        let r = tool.execute(json!({"ticker": "NVDA", "limit": 2})).await;
        assert!(r.success);
        let articles = r.payload["articles"].as_array().unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0]["title"], "NVDA headline 0");
    }

    #[tokio::test]
    async fn test_news_failure_has_no_substitute() {
        let tool = StockNewsTool::new(Arc::new(FixedMarket(None)));
        let r = tool.execute(json!({"ticker": "NVDA"})).await;
        assert!(!r.success);
        assert!(!r.simulated);
        assert!(r.error.unwrap().contains("429"));
    }
}
