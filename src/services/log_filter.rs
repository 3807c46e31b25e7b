//! # 日志关键词过滤器
//!
//! 逐行扫描日志，命中任意模式的行连同前后上下文窗口一起保留：
//! - 上下文窗口取并集，重叠窗口合并，不重复输出
//! - 输出行严格保持原始顺序
//! - 没有配置模式时原样透传（可选硬截断）
//! - 配置了模式但一个都没命中时返回前 100 行样本，保证非空输入不会得到空输出
//!
//! `FilterConfig` 构建后不可变，可在同一次分析中跨文件、跨线程共享。

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{FilterResult, MatchRecord, MAX_MATCH_RECORDS};
use crate::services::pattern_matcher::{CompiledPattern, PatternSet};

/// 默认上下文行数
pub const DEFAULT_CONTEXT_LINES: usize = 5;

/// 无命中时返回的样本行数
pub const NO_MATCH_SAMPLE_LINES: usize = 100;

/// 常见错误/异常模式（大小写不敏感）
pub const DEFAULT_PATTERNS: &[&str] = &[
    r"(?i)error",
    r"(?i)exception",
    r"(?i)fail(ed|ure)?",
    r"(?i)timeout",
    r"(?i)null\s*pointer",
    r"(?i)stack\s*trace",
    r"(?i)fatal",
    r"(?i)critical",
];

/**
 * 过滤配置
 *
 * 一次分析运行只创建一次，之后只读共享。
 */
#[derive(Debug, Clone)]
pub struct FilterConfig {
    patterns: PatternSet,
    context_before: usize,
    context_after: usize,
    case_sensitive: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            patterns: PatternSet::default(),
            context_before: DEFAULT_CONTEXT_LINES,
            context_after: DEFAULT_CONTEXT_LINES,
            case_sensitive: false,
        }
    }
}

impl FilterConfig {
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::default()
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn context_before(&self) -> usize {
        self.context_before
    }

    pub fn context_after(&self) -> usize {
        self.context_after
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

/// `FilterConfig` 构建器
#[derive(Debug, Clone)]
pub struct FilterConfigBuilder {
    keywords: Vec<String>,
    patterns: Vec<String>,
    context_before: usize,
    context_after: usize,
    case_sensitive: bool,
}

impl Default for FilterConfigBuilder {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            patterns: Vec::new(),
            context_before: DEFAULT_CONTEXT_LINES,
            context_after: DEFAULT_CONTEXT_LINES,
            case_sensitive: false,
        }
    }
}

impl FilterConfigBuilder {
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// 追加内置的错误词表
    pub fn with_default_patterns(self) -> Self {
        self.patterns(DEFAULT_PATTERNS.iter().copied())
    }

    /// 同时设置前后上下文
    pub fn context_lines(mut self, lines: usize) -> Self {
        self.context_before = lines;
        self.context_after = lines;
        self
    }

    pub fn context_before(mut self, lines: usize) -> Self {
        self.context_before = lines;
        self
    }

    pub fn context_after(mut self, lines: usize) -> Self {
        self.context_after = lines;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// 编译所有模式：先正则、后关键词，与求值顺序一致
    ///
    /// # 错误
    /// 任一正则非法立即失败，返回 `AppError::InvalidPattern`
    pub fn build(self) -> Result<FilterConfig> {
        let mut compiled = Vec::with_capacity(self.patterns.len() + self.keywords.len());

        for pattern in &self.patterns {
            compiled.push(CompiledPattern::regex(pattern, self.case_sensitive)?);
        }
        for keyword in &self.keywords {
            compiled.push(CompiledPattern::keyword(keyword, self.case_sensitive)?);
        }

        debug!(
            patterns = self.patterns.len(),
            keywords = self.keywords.len(),
            context_before = self.context_before,
            context_after = self.context_after,
            "Filter config compiled"
        );

        Ok(FilterConfig {
            patterns: PatternSet::new(compiled),
            context_before: self.context_before,
            context_after: self.context_after,
            case_sensitive: self.case_sensitive,
        })
    }
}

/// 高亮输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightFormat {
    /// ANSI 粗体红色
    Terminal,
    /// Markdown 粗体
    Markdown,
}

/**
 * 日志过滤器
 *
 * 持有共享的只读配置；每次调用独立分配工作状态。
 */
#[derive(Debug, Clone)]
pub struct LogFilter {
    config: Arc<FilterConfig>,
}

impl LogFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn from_shared(config: Arc<FilterConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /**
     * 按关键词/模式过滤日志
     *
     * # 参数
     * * `content` - 完整日志文本
     * * `max_lines` - 保留行数上限；`None` 或 `Some(0)` 表示不限制
     */
    pub fn filter(&self, content: &str, max_lines: Option<usize>) -> FilterResult {
        let max_lines = max_lines.filter(|&n| n > 0);
        // 与按 '\n' 切分一致：空串得到一个空行，末尾换行产生一个空的最后一行
        let lines: Vec<&str> = content.split('\n').collect();
        let total_lines = lines.len();

        if self.config.patterns.is_empty() {
            return Self::passthrough(content, &lines, max_lines);
        }

        let mut kept: BTreeSet<usize> = BTreeSet::new();
        let mut matches: Vec<MatchRecord> = Vec::new();
        let mut matched_lines = 0usize;

        for (idx, line) in lines.iter().enumerate() {
            let Some(pattern) = self.config.patterns.first_match(line) else {
                continue;
            };

            let start = idx.saturating_sub(self.config.context_before);
            let end = (idx + self.config.context_after + 1).min(total_lines);
            kept.extend(start..end);

            matched_lines += 1;
            if matches.len() < MAX_MATCH_RECORDS {
                matches.push(MatchRecord {
                    line_number: idx + 1,
                    line_text: (*line).to_string(),
                    pattern_source: pattern.source().to_string(),
                });
            }
        }

        if kept.is_empty() {
            warn!(
                total_lines,
                "No matches found for specified keywords/patterns, returning head sample"
            );
            let sample_size = NO_MATCH_SAMPLE_LINES.min(total_lines);
            return FilterResult {
                content: lines[..sample_size].join("\n"),
                matched_lines: 0,
                total_lines,
                filtered_lines: sample_size,
                truncated: sample_size < total_lines,
                matches: Vec::new(),
            };
        }

        let kept_count = kept.len();
        let (selected, truncated): (Vec<&str>, bool) = match max_lines {
            Some(limit) if kept_count > limit => {
                (kept.iter().take(limit).map(|&i| lines[i]).collect(), true)
            }
            _ => (
                kept.iter().map(|&i| lines[i]).collect(),
                kept_count < total_lines,
            ),
        };

        debug!(
            total_lines,
            matched_lines,
            kept = selected.len(),
            truncated,
            "Log filtered"
        );

        FilterResult {
            content: selected.join("\n"),
            matched_lines,
            total_lines,
            filtered_lines: selected.len(),
            truncated,
            matches,
        }
    }

    fn passthrough(content: &str, lines: &[&str], max_lines: Option<usize>) -> FilterResult {
        let total_lines = lines.len();

        match max_lines {
            Some(limit) if total_lines > limit => FilterResult {
                content: lines[..limit].join("\n"),
                matched_lines: 0,
                total_lines,
                filtered_lines: limit,
                truncated: true,
                matches: Vec::new(),
            },
            _ => FilterResult {
                content: content.to_string(),
                matched_lines: 0,
                total_lines,
                filtered_lines: total_lines,
                truncated: false,
                matches: Vec::new(),
            },
        }
    }

    /**
     * 高亮所有模式的命中片段
     *
     * 在原文上收集所有模式的命中区间，合并重叠区间后统一包裹，
     * 避免后一个模式匹配到前一个模式插入的标记。
     */
    pub fn highlight(&self, content: &str, format: HighlightFormat) -> String {
        let mut ranges: Vec<(usize, usize)> = self
            .config
            .patterns
            .iter()
            .flat_map(|p| p.find_ranges(content))
            .collect();

        if ranges.is_empty() {
            return content.to_string();
        }

        ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        let (open, close) = match format {
            HighlightFormat::Terminal => ("\x1b[1;31m", "\x1b[0m"),
            HighlightFormat::Markdown => ("**", "**"),
        };

        let mut out = String::with_capacity(content.len() + merged.len() * 12);
        let mut cursor = 0;
        for (start, end) in merged {
            out.push_str(&content[cursor..start]);
            out.push_str(open);
            out.push_str(&content[start..end]);
            out.push_str(close);
            cursor = end;
        }
        out.push_str(&content[cursor..]);
        out
    }
}
