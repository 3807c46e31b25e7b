//! 报告组装
//!
//! 把精简后的日志（以及可选的工单上下文）拼成三种输出：
//! - 纯文本：直接作为大模型的分析输入
//! - Markdown：给人看的报告
//! - JSON：给下游工具消费

use chrono::{DateTime, Local};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::{LogSummary, ReducedLog};

/// 分析输入中最多带入的评论条数
pub const MAX_COMMENTS: usize = 10;

const NOT_AVAILABLE: &str = "N/A";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

fn unknown_author() -> String {
    "Unknown".to_string()
}

/// 工单评论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketComment {
    #[serde(default = "unknown_author")]
    pub author: String,
    #[serde(default)]
    pub body: String,
}

/// 工单上下文（从本地 JSON 导出文件读取）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketContext {
    #[serde(default = "not_available")]
    pub key: String,
    #[serde(default = "not_available")]
    pub summary: String,
    #[serde(default = "not_available")]
    pub status: String,
    #[serde(default = "not_available")]
    pub priority: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comments: Vec<TicketComment>,
}

impl Default for TicketContext {
    fn default() -> Self {
        Self {
            key: not_available(),
            summary: not_available(),
            status: not_available(),
            priority: not_available(),
            description: String::new(),
            comments: Vec::new(),
        }
    }
}

impl TicketContext {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ticket file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ticket JSON: {}", path.display()))
    }
}

/**
 * 构建大模型分析输入
 *
 * 结构：工单头部 → 描述 → 最多 10 条评论 → `LOG FILES:`，每个文件附带
 * 保留行数、估算 Token 数和命中次数。没有工单上下文时只输出日志部分。
 */
pub fn build_analysis_input(ticket: Option<&TicketContext>, logs: &[ReducedLog]) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(ticket) = ticket {
        lines.push(format!("TICKET: {}", ticket.key));
        lines.push(format!("SUMMARY: {}", ticket.summary));
        lines.push(format!("STATUS: {}", ticket.status));
        lines.push(format!("PRIORITY: {}", ticket.priority));
        lines.push(String::new());

        if !ticket.description.is_empty() {
            lines.push("DESCRIPTION:".to_string());
            lines.push(ticket.description.clone());
            lines.push(String::new());
        }

        if !ticket.comments.is_empty() {
            lines.push("COMMENTS:".to_string());
            for comment in ticket.comments.iter().take(MAX_COMMENTS) {
                lines.push(format!("- {}: {}", comment.author, comment.body));
            }
            lines.push(String::new());
        }
    }

    if !logs.is_empty() {
        lines.push("LOG FILES:".to_string());
        for log in logs {
            lines.push(format!("\n--- {} ---", log.filename));
            lines.push(format!(
                "(Showing {} of {} lines, ~{} tokens)",
                log.filtered_lines, log.original_lines, log.estimated_tokens
            ));
            if log.matched_lines > 0 {
                lines.push(format!("(Matched {} keyword occurrences)", log.matched_lines));
            }
            lines.push(String::new());
            lines.push(log.content.clone());
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// 报告输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl OutputFormat {
    /// 根据输出文件扩展名推断格式
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => OutputFormat::Markdown,
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(AppError::validation_error(format!(
                "Unknown output format `{}` (expected text, markdown or json)",
                other
            ))),
        }
    }
}

/// 一次精简运行的完整报告
#[derive(Debug, Clone)]
pub struct Report<'a> {
    pub ticket: Option<&'a TicketContext>,
    pub logs: &'a [ReducedLog],
    pub summary: LogSummary,
    pub generated_at: DateTime<Local>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMetadata {
    generated_at: String,
    file_count: usize,
    total_lines: usize,
    total_size: usize,
    total_tokens: usize,
    optimized_files: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: JsonMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket: Option<&'a TicketContext>,
    logs: &'a [ReducedLog],
}

impl<'a> Report<'a> {
    pub fn new(
        ticket: Option<&'a TicketContext>,
        logs: &'a [ReducedLog],
        summary: LogSummary,
    ) -> Self {
        Self {
            ticket,
            logs,
            summary,
            generated_at: Local::now(),
        }
    }

    fn timestamp(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn total_tokens(&self) -> usize {
        self.logs.iter().map(|l| l.estimated_tokens).sum()
    }

    pub fn render(&self, format: OutputFormat) -> crate::error::Result<String> {
        match format {
            OutputFormat::Text => Ok(build_analysis_input(self.ticket, self.logs)),
            OutputFormat::Markdown => Ok(self.render_markdown()),
            OutputFormat::Json => self.render_json(),
        }
    }

    pub fn render_markdown(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        match self.ticket {
            Some(ticket) => lines.push(format!("# Log Reduction Report: {}", ticket.key)),
            None => lines.push("# Log Reduction Report".to_string()),
        }
        lines.push(format!("\n*Generated: {}*\n", self.timestamp()));

        if let Some(ticket) = self.ticket {
            lines.push("## Ticket Information\n".to_string());
            lines.push(format!("- **Key:** {}", ticket.key));
            lines.push(format!("- **Summary:** {}", ticket.summary));
            lines.push(format!("- **Status:** {}", ticket.status));
            lines.push(format!("- **Priority:** {}", ticket.priority));
            lines.push(String::new());
        }

        lines.push("## Logs Analyzed\n".to_string());
        lines.push(format!("- **Files Processed:** {}", self.summary.count));
        lines.push(format!("- **Total Lines:** {}", self.summary.total_lines));
        lines.push(format!("- **Estimated Tokens:** ~{}", self.total_tokens()));
        if !self.summary.files.is_empty() {
            lines.push("\n**Files:**".to_string());
            for filename in &self.summary.files {
                lines.push(format!("  - {}", filename));
            }
        }
        lines.push(String::new());

        if !self.logs.is_empty() {
            lines.push("## Log Excerpts\n".to_string());
            for log in self.logs {
                lines.push(format!("### {}\n", log.filename));
                lines.push(format!(
                    "_Showing {} of {} lines, ~{} tokens, strategy: {}_\n",
                    log.filtered_lines, log.original_lines, log.estimated_tokens, log.strategy
                ));
                lines.push(fence_for(&log.content));
                lines.push(log.content.clone());
                lines.push(fence_for(&log.content));
                lines.push(String::new());
            }
        }

        lines.join("\n")
    }

    pub fn render_json(&self) -> crate::error::Result<String> {
        let report = JsonReport {
            metadata: JsonMetadata {
                generated_at: self.generated_at.to_rfc3339(),
                file_count: self.logs.len(),
                total_lines: self.summary.total_lines,
                total_size: self.summary.total_size,
                total_tokens: self.total_tokens(),
                optimized_files: self.logs.iter().filter(|l| l.optimized).count(),
            },
            ticket: self.ticket,
            logs: self.logs,
        };

        serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::validation_error(format!("Failed to serialize report: {}", e)))
    }
}

/// 日志内容自身含有 ``` 时加长围栏
fn fence_for(content: &str) -> String {
    let mut longest = 0usize;
    let mut run = 0usize;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

/// 写入报告文件，父目录不存在时自动创建
pub fn save_report(content: &str, path: &Path) -> crate::error::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), bytes = content.len(), "Report saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReductionStrategy;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn reduced(name: &str, matched: usize) -> ReducedLog {
        ReducedLog {
            filename: name.to_string(),
            original_lines: 120,
            filtered_lines: 11,
            matched_lines: matched,
            content: "ERROR boom\n  at frame".to_string(),
            estimated_tokens: 5,
            optimized: false,
            strategy: ReductionStrategy::None,
        }
    }

    fn ticket() -> TicketContext {
        TicketContext {
            key: "OPS-42".into(),
            summary: "Checkout fails".into(),
            status: "Open".into(),
            priority: "High".into(),
            description: "500 on /checkout".into(),
            comments: (0..12)
                .map(|i| TicketComment {
                    author: format!("dev{}", i),
                    body: format!("note {}", i),
                })
                .collect(),
        }
    }

    #[test]
    fn test_analysis_input_layout() {
        let ticket = ticket();
        let logs = vec![reduced("app.log", 3), reduced("worker.log", 0)];
        let text = build_analysis_input(Some(&ticket), &logs);

        assert!(text.starts_with("TICKET: OPS-42\nSUMMARY: Checkout fails\nSTATUS: Open\nPRIORITY: High\n\n"));
        assert!(text.contains("DESCRIPTION:\n500 on /checkout\n"));
        assert!(text.contains("- dev9: note 9"));
        assert!(!text.contains("dev10"));
        assert!(text.contains("LOG FILES:\n\n--- app.log ---\n(Showing 11 of 120 lines, ~5 tokens)\n(Matched 3 keyword occurrences)\n\nERROR boom"));
        assert!(text.contains("--- worker.log ---\n(Showing 11 of 120 lines, ~5 tokens)\n\n"));
    }

    #[test]
    fn test_analysis_input_without_ticket() {
        let text = build_analysis_input(None, &[reduced("a.log", 0)]);
        assert!(text.starts_with("LOG FILES:"));
        assert_eq!(build_analysis_input(None, &[]), "");
    }

    #[test]
    fn test_ticket_defaults_from_sparse_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ticket.json");
        std::fs::write(&path, r#"{"key": "OPS-1", "comments": [{"body": "hi"}]}"#).unwrap();

        let ticket = TicketContext::from_json_file(&path).unwrap();
        assert_eq!(ticket.key, "OPS-1");
        assert_eq!(ticket.summary, "N/A");
        assert_eq!(ticket.priority, "N/A");
        assert_eq!(ticket.comments[0].author, "Unknown");
    }

    #[test]
    fn test_markdown_report() {
        let ticket = ticket();
        let logs = vec![reduced("app.log", 1)];
        let docs = vec![crate::models::LogDocument::new("app.log", "x".into())];
        let mut report = Report::new(Some(&ticket), &logs, LogSummary::from_documents(&docs));
        report.generated_at = Local.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();

        let md = report.render_markdown();
        assert!(md.starts_with("# Log Reduction Report: OPS-42"));
        assert!(md.contains("*Generated: 2024-05-01 08:30:00*"));
        assert!(md.contains("- **Files Processed:** 1"));
        assert!(md.contains("### app.log"));
        assert!(md.contains("```\nERROR boom\n  at frame\n```"));
    }

    #[test]
    fn test_json_report_metadata() {
        let logs = vec![reduced("a.log", 0), reduced("b.log", 2)];
        let report = Report::new(None, &logs, LogSummary::default());
        let json: serde_json::Value = serde_json::from_str(&report.render_json().unwrap()).unwrap();

        assert_eq!(json["metadata"]["fileCount"], 2);
        assert_eq!(json["metadata"]["totalTokens"], 10);
        assert!(json["metadata"]["generatedAt"].is_string());
        assert!(json.get("ticket").is_none());
        assert_eq!(json["logs"][1]["matchedLines"], 2);
        assert_eq!(json["logs"][0]["strategy"], "none");
    }

    #[test]
    fn test_fence_grows_with_content() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("has ``` inside"), "````");
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("out/report.md")), OutputFormat::Markdown);
        assert_eq!(OutputFormat::from_path(Path::new("report.JSON")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("report.txt")), OutputFormat::Text);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_save_report_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/report.txt");
        save_report("hello", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }
}
