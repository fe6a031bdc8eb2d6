//! report provider：把分析报告保存为 Markdown 文件

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReportArgs {
    /// Report title
    #[serde(alias = "report_title")]
    pub title: String,
    /// Report content in markdown format
    #[serde(alias = "report_content")]
    pub content: String,
}

/// 文件名安全的标题：保留字母数字、空格、`-`、`_`，空格转下划线，最多 50 个字符
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect()
}

/// save_report
pub struct SaveReportTool {
    dir: PathBuf,
}

impl SaveReportTool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Tool for SaveReportTool {
    fn name(&self) -> &str {
        "save_report"
    }

    fn description(&self) -> &str {
        "Save a financial analysis report (title + markdown content) to a file."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ReportArgs>()
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: ReportArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return e,
        };
        let now = Local::now();
        let file_name = format!("{}_{}.md", safe_title(&args.title), now.format("%Y%m%d_%H%M%S"));
        let body = format!(
            "# {}\n\n**Generated:** {}\n\n---\n\n{}\n",
            args.title,
            now.format("%Y-%m-%d %H:%M:%S"),
            args.content
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            return ToolResult::failure(format!("cannot create {}: {e}", self.dir.display()));
        }
        let path = self.dir.join(file_name);
        if let Err(e) = tokio::fs::write(&path, body).await {
            return ToolResult::failure(format!("cannot write {}: {e}", path.display()));
        }
        let location = path.display().to_string();
        tracing::info!(report = %location, "report saved");
        ToolResult::ok(json!({
            "filename": location,
            "message": format!("Report saved to {location}"),
        }))
        .with_location(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("AAPL vs MSFT: Q3/2024"), "AAPL_vs_MSFT__Q3_2024");
        assert_eq!(safe_title(&"x".repeat(80)).len(), 50);
    }

    #[tokio::test]
    async fn test_report_saved_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SaveReportTool::new(dir.path());
        let r = tool
            .execute(json!({"report_title": "Apple Outlook", "report_content": "Strong buy."}))
            .await;
        assert!(r.success);
        let location = r.location.clone().unwrap();
        assert!(location.contains("Apple_Outlook_"));
        assert!(location.ends_with(".md"));
        let text = std::fs::read_to_string(&location).unwrap();
        assert!(text.starts_with("# Apple Outlook\n\n**Generated:** "));
        assert!(text.ends_with("---\n\nStrong buy.\n"));
        assert_eq!(r.payload["message"], format!("Report saved to {location}"));
    }

    #[tokio::test]
    async fn test_report_requires_content() {
        let dir = tempfile::tempdir().unwrap();
        let r = SaveReportTool::new(dir.path())
            .execute(json!({"title": "Only a title"}))
            .await;
        assert!(!r.success);
    }
}
