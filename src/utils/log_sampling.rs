//! 大日志采样与格式识别
//!
//! 与关键词过滤无关的轻量工具：首尾采样、按起止正则截取片段、粗略判断日志格式。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, Result};

pub const DEFAULT_SAMPLE_HEAD_LINES: usize = 200;
pub const DEFAULT_SAMPLE_TAIL_LINES: usize = 200;

/// 格式识别只看开头这么多行
const FORMAT_PROBE_LINES: usize = 10;
const JSON_LINE_RATIO: f64 = 0.8;

/**
 * 首尾采样
 *
 * 行数不超过 `head_lines + tail_lines` 时原样返回；否则保留前 `head_lines`
 * 行和后 `tail_lines` 行，中间插入省略标记。
 *
 * # 返回值
 * `(采样后的文本, 是否发生截断)`
 */
pub fn sample_large_log(content: &str, head_lines: usize, tail_lines: usize) -> (String, bool) {
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len();

    if total <= head_lines + tail_lines {
        return (content.to_string(), false);
    }

    let omitted = total - head_lines - tail_lines;
    let marker = format!("\n... [TRUNCATED: {} lines omitted] ...\n", omitted);

    let mut parts: Vec<&str> = Vec::with_capacity(head_lines + tail_lines + 1);
    parts.extend_from_slice(&lines[..head_lines]);
    parts.push(&marker);
    parts.extend_from_slice(&lines[total - tail_lines..]);

    (parts.join("\n"), true)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AppError::invalid_pattern(pattern, e))
}

/**
 * 按起止正则截取片段
 *
 * - `start`：第一处命中行作为起点（含）；无命中时从第一行开始
 * - `end`：从起点开始向后第一处命中行作为终点（含）；无命中时到末尾
 * - `max_lines`：截取后再按行数截断，`None` 或 0 表示不限
 */
pub fn extract_log_section(
    content: &str,
    start: Option<&str>,
    end: Option<&str>,
    max_lines: Option<usize>,
) -> Result<String> {
    let mut lines: Vec<&str> = content.split('\n').collect();

    let start_re = start.map(compile).transpose()?;
    let end_re = end.map(compile).transpose()?;

    if start_re.is_some() || end_re.is_some() {
        let start_idx = start_re
            .as_ref()
            .and_then(|re| lines.iter().position(|line| re.is_match(line)))
            .unwrap_or(0);

        let end_idx = end_re
            .as_ref()
            .and_then(|re| {
                lines[start_idx..]
                    .iter()
                    .position(|line| re.is_match(line))
                    .map(|offset| start_idx + offset + 1)
            })
            .unwrap_or(lines.len());

        lines = lines[start_idx..end_idx].to_vec();
    }

    if let Some(max) = max_lines.filter(|&m| m > 0) {
        lines.truncate(max);
    }

    Ok(lines.join("\n"))
}

/// 粗粒度日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    ErrorLog,
    Structured,
    PlainText,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::ErrorLog => "error_log",
            LogFormat::Structured => "structured",
            LogFormat::PlainText => "plain_text",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 根据开头若干行判断日志格式
pub fn detect_log_format(content: &str) -> LogFormat {
    let probe: Vec<&str> = content
        .trim()
        .split('\n')
        .take(FORMAT_PROBE_LINES)
        .collect();

    let json_lines = probe
        .iter()
        .filter(|line| serde_json::from_str::<serde_json::Value>(line).is_ok())
        .count();

    if json_lines as f64 >= probe.len() as f64 * JSON_LINE_RATIO {
        return LogFormat::Json;
    }

    if probe
        .iter()
        .any(|line| line.contains("ERROR") || line.contains("Exception"))
    {
        return LogFormat::ErrorLog;
    }

    if probe
        .iter()
        .any(|line| line.contains("INFO") || line.contains("DEBUG") || line.contains("WARN"))
    {
        return LogFormat::Structured;
    }

    LogFormat::PlainText
}
