//! 内置 provider：stock_data、plot、news、report
//!
//! 每个 provider 是一个 LocalProvider；既可进程内直接使用，也可由 hive-provider 在 stdio 上暴露。

pub mod chart;
pub mod market;
pub mod news;
pub mod report;
pub mod stock_data;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::tools::{LocalProvider, ToolProvider, ToolRegistry};

pub use chart::{ComparisonChartTool, StockChartTool};
pub use market::{MarketData, NewsItem, PriceHistory, YahooMarketData};
pub use news::StockNewsTool;
pub use report::SaveReportTool;
pub use stock_data::{HistoricalDataTool, StockInfoTool, StockPriceTool, MOCK_NOTE};

/// 内置 provider 名称，hive-provider 的命令行参数
pub const PROVIDER_NAMES: [&str; 4] = ["stock_data", "plot", "news", "report"];

pub fn stock_data_provider(market: Arc<dyn MarketData>) -> LocalProvider {
    let mut registry = ToolRegistry::new();
    registry.register(StockPriceTool::new(market.clone()));
    registry.register(HistoricalDataTool::new(market.clone()));
    registry.register(StockInfoTool::new(market));
    LocalProvider::new("stock_data", registry)
}

pub fn plot_provider(market: Arc<dyn MarketData>, output_dir: impl Into<PathBuf>) -> LocalProvider {
    let charts = output_dir.into().join("charts");
    let mut registry = ToolRegistry::new();
    registry.register(StockChartTool::new(market.clone(), charts.clone()));
    registry.register(ComparisonChartTool::new(market, charts));
    LocalProvider::new("plot", registry)
}

pub fn news_provider(market: Arc<dyn MarketData>) -> LocalProvider {
    let mut registry = ToolRegistry::new();
    registry.register(StockNewsTool::new(market));
    LocalProvider::new("news", registry)
}

pub fn report_provider(output_dir: impl Into<PathBuf>) -> LocalProvider {
    let mut registry = ToolRegistry::new();
    registry.register(SaveReportTool::new(output_dir.into().join("reports")));
    LocalProvider::new("report", registry)
}

/// 按名称构造单个内置 provider；未知名称返回 None
pub fn provider_by_name(name: &str, cfg: &AppConfig) -> Option<LocalProvider> {
    let market: Arc<dyn MarketData> = Arc::new(YahooMarketData::new(cfg.tools.market_timeout_secs));
    let output_dir = cfg.app.output_dir.clone();
    match name {
        "stock_data" => Some(stock_data_provider(market)),
        "plot" => Some(plot_provider(market, output_dir)),
        "news" => Some(news_provider(market)),
        "report" => Some(report_provider(output_dir)),
        _ => None,
    }
}

/// 全部内置 provider（未配置外部 provider 进程时进程内使用）
pub fn builtin_providers(cfg: &AppConfig) -> Vec<Arc<dyn ToolProvider>> {
    let market: Arc<dyn MarketData> = Arc::new(YahooMarketData::new(cfg.tools.market_timeout_secs));
    let output_dir = cfg.app.output_dir.clone();
    let stock_data: Arc<dyn ToolProvider> = Arc::new(stock_data_provider(market.clone()));
    let plot: Arc<dyn ToolProvider> = Arc::new(plot_provider(market.clone(), output_dir.clone()));
    let news: Arc<dyn ToolProvider> = Arc::new(news_provider(market));
    let report: Arc<dyn ToolProvider> = Arc::new(report_provider(output_dir));
    vec![stock_data, plot, news, report]
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;

    use super::market::{MarketData, NewsItem, PriceHistory};

    /// 固定行情：None 表示上游不可达
    pub(crate) struct FixedMarket(pub Option<PriceHistory>);

    #[async_trait]
    impl MarketData for FixedMarket {
        async fn history(&self, _ticker: &str, _period: &str) -> Result<PriceHistory, String> {
            self.0
                .clone()
                .ok_or_else(|| "HTTP 429 Too Many Requests".to_string())
        }

        async fn news(&self, _ticker: &str, _limit: usize) -> Result<Vec<NewsItem>, String> {
            Err("HTTP 429 Too Many Requests".to_string())
        }
    }
}
