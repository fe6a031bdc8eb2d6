//! plot provider：单只股票走势图与多只股票归一化对比图
//!
//! 图表渲染为 SVG 写入 `<output_dir>/charts/`。上游失败时改用确定性的替代曲线，
//! 标题带 MOCK 标记，结果 simulated=true。

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::market::{fetch_history, substitute_closes, MarketData};
use super::stock_data::MOCK_NOTE;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolResult};

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 500.0;
const MARGIN: f64 = 60.0;
const PALETTE: [&str; 6] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b"];

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChartArgs {
    /// Stock ticker symbol (e.g. 'AAPL')
    pub ticker: String,
    /// Time period ('1d', '5d', '1mo', '3mo', '6mo', '1y', '5y')
    #[serde(default = "default_period")]
    pub period: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ComparisonArgs {
    /// Comma-separated ticker symbols (e.g. 'AAPL,GOOGL,MSFT')
    pub tickers: String,
    /// Time period ('1d', '5d', '1mo', '3mo', '6mo', '1y', '5y')
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "3mo".to_string()
}

/// 一条折线
struct Series {
    label: String,
    values: Vec<f64>,
}

/// 把若干折线渲染成 SVG；zero_line 为 true 时画出 y=0 参考线
fn render_svg(title: &str, y_label: &str, series: &[Series], zero_line: bool) -> String {
    let all = series.iter().flat_map(|s| s.values.iter().copied());
    let (mut lo, mut hi) = all.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if zero_line {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        hi = lo + 1.0;
    }
    let plot_w = WIDTH - 2.0 * MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;
    let y = |v: f64| MARGIN + plot_h * (1.0 - (v - lo) / (hi - lo));

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" font-size="20" font-weight="bold">{}</text>"#,
        WIDTH / 2.0,
        escape(title)
    );
    let _ = writeln!(
        svg,
        r#"<text x="15" y="{}" font-size="12" transform="rotate(-90 15 {})">{}</text>"#,
        HEIGHT / 2.0,
        HEIGHT / 2.0,
        escape(y_label)
    );

    // 网格与刻度
    for i in 0..=4 {
        let v = lo + (hi - lo) * i as f64 / 4.0;
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN}" y1="{py:.1}" x2="{x2}" y2="{py:.1}" stroke="#ddd"/><text x="{tx}" y="{py:.1}" font-size="10" text-anchor="end">{v:.2}</text>"##,
            py = y(v),
            x2 = WIDTH - MARGIN,
            tx = MARGIN - 5.0,
        );
    }
    if zero_line {
        let _ = writeln!(
            svg,
            r#"<line x1="{MARGIN}" y1="{py:.1}" x2="{x2}" y2="{py:.1}" stroke="black" stroke-dasharray="6 4"/>"#,
            py = y(0.0),
            x2 = WIDTH - MARGIN,
        );
    }

    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let step = plot_w / (s.values.len().max(2) - 1) as f64;
        let points: Vec<String> = s
            .values
            .iter()
            .enumerate()
            .map(|(j, v)| format!("{:.1},{:.1}", MARGIN + step * j as f64, y(*v)))
            .collect();
        let _ = writeln!(
            svg,
            r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{}"/>"#,
            points.join(" ")
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="12" fill="{color}">{}</text>"#,
            WIDTH - MARGIN + 5.0,
            MARGIN + 15.0 * i as f64,
            escape(&s.label)
        );
    }
    svg.push_str("</svg>\n");
    svg
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// 相对首日的百分比变化
fn normalize(closes: &[f64]) -> Vec<f64> {
    match closes.first() {
        Some(&first) if first != 0.0 => closes.iter().map(|c| (c / first - 1.0) * 100.0).collect(),
        _ => vec![0.0; closes.len()],
    }
}

async fn write_chart(dir: &Path, file_name: &str, svg: &str) -> Result<PathBuf, String> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, svg)
        .await
        .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    Ok(path)
}

fn saved(path: PathBuf, prefix: &str, simulated: bool) -> ToolResult {
    let location = path.display().to_string();
    let suffix = if simulated { " (Mock Data)" } else { "" };
    let mut payload = json!({
        "filename": location,
        "message": format!("{prefix} saved to {location}{suffix}"),
    });
    if simulated {
        payload["note"] = json!(MOCK_NOTE);
    }
    let result = ToolResult::ok(payload).with_location(location);
    if simulated {
        result.simulated()
    } else {
        result
    }
}

/// create_chart：收盘价走势图
pub struct StockChartTool {
    market: Arc<dyn MarketData>,
    dir: PathBuf,
}

impl StockChartTool {
    pub fn new(market: Arc<dyn MarketData>, dir: impl Into<PathBuf>) -> Self {
        Self {
            market,
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl Tool for StockChartTool {
    fn name(&self) -> &str {
        "create_chart"
    }

    fn description(&self) -> &str {
        "Create a price chart for a stock ticker and save it as an image file."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ChartArgs>()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: ChartArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };
        let ticker = args.ticker.trim().to_uppercase();
        let (closes, simulated) = match fetch_history(self.market.as_ref(), &ticker, &args.period).await {
            Ok(h) => (h.closes, false),
            Err(e) => {
                tracing::warn!(ticker = %ticker, "chart data unavailable ({}), using substitute", e);
                (substitute_closes(&ticker, &args.period), true)
            }
        };
        let title = if simulated {
            format!("{ticker} - {} (MOCK DATA)", args.period)
        } else {
            format!("{ticker} - {}", args.period)
        };
        let svg = render_svg(
            &title,
            "Price (USD)",
            &[Series {
                label: ticker.clone(),
                values: closes,
            }],
            false,
        );
        match write_chart(&self.dir, &format!("{ticker}_{}.svg", args.period), &svg).await {
            Ok(path) => saved(path, "Chart", simulated),
            Err(e) => ToolResult::failure(e),
        }
    }
}

/// create_comparison：多只股票相对首日涨跌幅对比
pub struct ComparisonChartTool {
    market: Arc<dyn MarketData>,
    dir: PathBuf,
}

impl ComparisonChartTool {
    pub fn new(market: Arc<dyn MarketData>, dir: impl Into<PathBuf>) -> Self {
        Self {
            market,
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl Tool for ComparisonChartTool {
    fn name(&self) -> &str {
        "create_comparison"
    }

    fn description(&self) -> &str {
        "Create a normalized comparison chart (% change) for multiple comma-separated tickers."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ComparisonArgs>()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: ComparisonArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };
        let tickers: Vec<String> = args
            .tickers
            .split(',')
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        if tickers.is_empty() {
            return ToolResult::failure("no tickers given");
        }

        // 任一 ticker 取数失败则整张图改用替代数据
        let mut live = Vec::with_capacity(tickers.len());
        for ticker in &tickers {
            match fetch_history(self.market.as_ref(), ticker, &args.period).await {
                Ok(h) => live.push(Series {
                    label: ticker.clone(),
                    values: normalize(&h.closes),
                }),
                Err(e) => {
                    tracing::warn!(ticker = %ticker, "comparison data unavailable ({}), using substitute", e);
                    live.clear();
                    break;
                }
            }
        }
        let simulated = live.is_empty();
        let series = if simulated {
            tickers
                .iter()
                .map(|t| Series {
                    label: format!("{t} (Mock)"),
                    values: normalize(&substitute_closes(t, &args.period)),
                })
                .collect()
        } else {
            live
        };

        let title = if simulated {
            format!("Comparison - {} (MOCK)", args.period)
        } else {
            format!("Comparison - {}", args.period)
        };
        let svg = render_svg(&title, "Change (%)", &series, true);
        let file_name = format!("comparison_{}_{}.svg", tickers.join("_"), args.period);
        match write_chart(&self.dir, &file_name, &svg).await {
            Ok(path) => saved(path, "Comparison chart", simulated),
            Err(e) => ToolResult::failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::market::PriceHistory;
    use crate::tools::builtin::test_support::FixedMarket;

    fn history() -> PriceHistory {
        PriceHistory {
            ticker: "AAPL".into(),
            closes: vec![100.0, 110.0, 105.0],
            highs: vec![101.0, 111.0, 106.0],
            lows: vec![99.0, 109.0, 104.0],
            volumes: vec![1, 2, 3],
            meta: Value::Null,
        }
    }

    #[tokio::test]
    async fn test_chart_written_with_location() {
        let dir = tempfile::tempdir().unwrap();
        let tool = StockChartTool::new(Arc::new(FixedMarket(Some(history()))), dir.path());
        let r = tool.execute(json!({"ticker": "aapl", "period": "1mo"})).await;
        assert!(r.success && !r.simulated);
        let location = r.location.clone().unwrap();
        assert!(location.ends_with("AAPL_1mo.svg"));
        let svg = std::fs::read_to_string(&location).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("AAPL - 1mo"));
        assert!(r.payload["message"].as_str().unwrap().starts_with("Chart saved to"));
    }

    #[tokio::test]
    async fn test_chart_fallback_is_marked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = StockChartTool::new(Arc::new(FixedMarket(None)), dir.path());
        let r = tool.execute(json!({"ticker": "TSLA"})).await;
        assert!(r.success);
        assert!(r.simulated);
        let svg = std::fs::read_to_string(r.location.unwrap()).unwrap();
        assert!(svg.contains("(MOCK DATA)"));
        assert_eq!(r.payload["note"], MOCK_NOTE);
    }

    #[tokio::test]
    async fn test_comparison_file_name_and_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ComparisonChartTool::new(Arc::new(FixedMarket(Some(history()))), dir.path());
        let r = tool
            .execute(json!({"tickers": "aapl, msft", "period": "6mo"}))
            .await;
        assert!(r.success && !r.simulated);
        assert!(r.location.unwrap().ends_with("comparison_AAPL_MSFT_6mo.svg"));
        let pct = normalize(&[100.0, 110.0, 105.0]);
        assert_eq!(pct[0], 0.0);
        assert!((pct[1] - 10.0).abs() < 1e-9);
        assert!((pct[2] - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_comparison_without_tickers_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ComparisonChartTool::new(Arc::new(FixedMarket(None)), dir.path());
        let r = tool.execute(json!({"tickers": " , "})).await;
        assert!(!r.success);
    }
}
