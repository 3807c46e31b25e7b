//! 错误段提取
//!
//! 把日志切成以错误标记行开头的连续块（含堆栈）。预算器在超出 Token
//! 预算时优先保留这些块。
//!
//! 规则：
//! - 命中 `error|exception|fatal|critical`（大小写不敏感）的行总是开启新段，
//!   已打开的段先关闭
//! - 打开的段吸收后续所有非空行（堆栈帧 `at ...`、`File "..."`、编号帧，
//!   以及任何其它非空行）
//! - 第一个空行关闭当前段（空行本身不计入）
//! - 文件末尾仍打开的段在最后一行关闭

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ErrorSection;

static ERROR_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(error|exception|fatal|critical)").expect("error marker regex is valid")
});

/// 判断一行是否为错误标记行
pub fn is_error_marker(line: &str) -> bool {
    ERROR_MARKER.is_match(line)
}

struct OpenSection<'a> {
    start_line: usize,
    lines: Vec<&'a str>,
}

impl<'a> OpenSection<'a> {
    fn close(self, end_line: usize) -> ErrorSection {
        ErrorSection {
            start_line: self.start_line,
            end_line,
            line_count: self.lines.len(),
            content: self.lines.join("\n"),
        }
    }
}

/// 按出现顺序提取所有错误段；没有错误标记时返回空列表
pub fn extract_error_sections(content: &str) -> Vec<ErrorSection> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut sections = Vec::new();
    let mut current: Option<OpenSection<'_>> = None;

    for (idx, line) in lines.iter().copied().enumerate() {
        if is_error_marker(line) {
            if let Some(open) = current.take() {
                // 上一段结束于本行之前
                sections.push(open.close(idx));
            }
            current = Some(OpenSection {
                start_line: idx + 1,
                lines: vec![line],
            });
        } else if line.trim().is_empty() {
            if let Some(open) = current.take() {
                sections.push(open.close(idx));
            }
        } else if let Some(open) = current.as_mut() {
            open.lines.push(line);
        }
    }

    if let Some(open) = current.take() {
        sections.push(open.close(lines.len()));
    }

    sections
}
