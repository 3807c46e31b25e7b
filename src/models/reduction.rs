//! 精简流程的数据结构
//!
//! 过滤器（Matcher）、错误段提取器与 Token 预算器的输入输出类型。
//! 所有结构都是一次调用内产生的临时值，可序列化后交给报告层渲染。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// 单条匹配记录的上限（仅元数据，不影响保留哪些行）
pub const MAX_MATCH_RECORDS: usize = 20;

/**
 * 单条匹配记录
 *
 * 每个命中行最多一条：按配置顺序第一个命中的模式胜出。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// 行号（从 1 开始）
    pub line_number: usize,
    /// 命中行原文
    #[serde(rename = "line")]
    pub line_text: String,
    /// 命中模式的源文本
    #[serde(rename = "pattern")]
    pub pattern_source: String,
}

/**
 * 过滤结果
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    /// 保留下来的行，按原始顺序以 `\n` 连接
    pub content: String,
    /// 命中行数（不受 20 条记录上限影响）
    pub matched_lines: usize,
    /// 输入总行数
    pub total_lines: usize,
    /// 实际保留的行数
    pub filtered_lines: usize,
    /// 输出是否少于输入
    pub truncated: bool,
    /// 前 20 条匹配记录
    pub matches: Vec<MatchRecord>,
}

/**
 * 错误段
 *
 * 以错误标记行开头、到空行或文件末尾结束的连续行块。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSection {
    /// 起始行号（从 1 开始）
    pub start_line: usize,
    /// 结束位置：空行关闭时为空行之前的行号，遇到新错误行关闭时为新错误行之前的行号，
    /// 文件末尾关闭时为总行数
    pub end_line: usize,
    /// 段内容
    pub content: String,
    /// 段内行数
    pub line_count: usize,
}

/// 预算器请求的精简策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStrategy {
    /// 先尝试提取错误段，再退化为首尾截断
    #[default]
    Smart,
    /// 直接首尾截断
    HeadTail,
    /// 只保留开头部分
    Head,
}

impl fmt::Display for BudgetStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetStrategy::Smart => write!(f, "smart"),
            BudgetStrategy::HeadTail => write!(f, "head_tail"),
            BudgetStrategy::Head => write!(f, "head"),
        }
    }
}

impl FromStr for BudgetStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "smart" => Ok(BudgetStrategy::Smart),
            "head_tail" => Ok(BudgetStrategy::HeadTail),
            "head" => Ok(BudgetStrategy::Head),
            other => Err(AppError::validation_error(format!(
                "Unknown strategy `{}` (expected smart, head_tail or head)",
                other
            ))),
        }
    }
}

/// 预算器实际采用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionStrategy {
    None,
    ErrorExtraction,
    HeadTail,
    HeadOnly,
}

impl ReductionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionStrategy::None => "none",
            ReductionStrategy::ErrorExtraction => "error_extraction",
            ReductionStrategy::HeadTail => "head_tail",
            ReductionStrategy::HeadOnly => "head_only",
        }
    }
}

impl fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/**
 * Token 预算优化结果
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeResult {
    pub content: String,
    pub original_tokens: usize,
    /// 始终由返回的 content 重新估算
    pub final_tokens: usize,
    pub optimized: bool,
    pub strategy: ReductionStrategy,
    /// 错误段提取时的段数
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sections_extracted: Option<usize>,
    /// 截断时保留的行数
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lines_kept: Option<usize>,
    /// 首尾截断时省略的行数
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lines_removed: Option<usize>,
}

impl OptimizeResult {
    /// 未超预算时原样返回
    pub fn unchanged(content: String, tokens: usize) -> Self {
        Self {
            content,
            original_tokens: tokens,
            final_tokens: tokens,
            optimized: false,
            strategy: ReductionStrategy::None,
            sections_extracted: None,
            lines_kept: None,
            lines_removed: None,
        }
    }
}
