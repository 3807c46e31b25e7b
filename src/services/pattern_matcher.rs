use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::{Regex, RegexBuilder};
use std::fmt;

use crate::error::{AppError, Result};

/**
 * 编译后的单个匹配模式
 *
 * 在配置阶段编译一次，逐行匹配时不再重复编译。
 * - 纯 ASCII 关键词走 Aho-Corasick（子串匹配，ASCII 大小写折叠；
 *   不折叠 U+212A 这类会映射到 ASCII 的 Unicode 字符）
 * - 含非 ASCII 字符的关键词以及空关键词转义后走正则（Unicode 大小写折叠）
 * - 用户提供的正则原样编译
 */
#[derive(Clone)]
pub enum CompiledPattern {
    Keyword(KeywordPattern),
    Regex(RegexPattern),
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledPattern::Keyword(k) => f
                .debug_struct("Keyword")
                .field("keyword", &k.keyword)
                .finish(),
            CompiledPattern::Regex(r) => f
                .debug_struct("Regex")
                .field("pattern", &r.source)
                .finish(),
        }
    }
}

impl CompiledPattern {
    /**
     * 从关键词构建（自动转义）
     *
     * # 参数
     * * `keyword` - 字面关键词
     * * `case_sensitive` - 是否大小写敏感
     */
    pub fn keyword(keyword: &str, case_sensitive: bool) -> Result<Self> {
        // 空关键词等价于空正则，匹配每一行
        if !keyword.is_empty() && keyword.is_ascii() {
            KeywordPattern::new(keyword, case_sensitive).map(CompiledPattern::Keyword)
        } else {
            let escaped = regex::escape(keyword);
            RegexPattern::new(&escaped, case_sensitive).map(CompiledPattern::Regex)
        }
    }

    /**
     * 从原始正则构建
     *
     * # 错误
     * 正则语法错误时返回 `AppError::InvalidPattern`，携带出错的模式文本
     */
    pub fn regex(pattern: &str, case_sensitive: bool) -> Result<Self> {
        RegexPattern::new(pattern, case_sensitive).map(CompiledPattern::Regex)
    }

    /// 该行是否命中
    pub fn is_match(&self, line: &str) -> bool {
        match self {
            CompiledPattern::Keyword(k) => k.ac.is_match(line),
            CompiledPattern::Regex(r) => r.regex.is_match(line),
        }
    }

    /// 第一个命中位置的字节偏移
    pub fn find(&self, line: &str) -> Option<usize> {
        match self {
            CompiledPattern::Keyword(k) => k.ac.find(line).map(|m| m.start()),
            CompiledPattern::Regex(r) => r.regex.find(line).map(|m| m.start()),
        }
    }

    /// 所有不重叠命中区间 `[start, end)`
    pub fn find_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            CompiledPattern::Keyword(k) => k
                .ac
                .find_iter(text)
                .map(|m| (m.start(), m.end()))
                .collect(),
            CompiledPattern::Regex(r) => r
                .regex
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }

    /// 模式源文本；关键词返回其转义形式
    pub fn source(&self) -> &str {
        match self {
            CompiledPattern::Keyword(k) => &k.source,
            CompiledPattern::Regex(r) => &r.source,
        }
    }
}

/**
 * 关键词模式 - Aho-Corasick 自动机
 */
#[derive(Clone)]
pub struct KeywordPattern {
    ac: AhoCorasick,
    keyword: String,
    source: String,
}

impl KeywordPattern {
    fn new(keyword: &str, case_sensitive: bool) -> Result<Self> {
        let mut builder = AhoCorasickBuilder::new();
        builder.match_kind(MatchKind::LeftmostFirst);

        if !case_sensitive {
            builder.ascii_case_insensitive(true);
        }

        let ac = builder
            .build([keyword])
            .map_err(|e| AppError::invalid_pattern(keyword, e))?;

        Ok(Self {
            ac,
            keyword: keyword.to_string(),
            source: regex::escape(keyword),
        })
    }
}

/**
 * 正则模式
 */
#[derive(Clone)]
pub struct RegexPattern {
    regex: Regex,
    source: String,
}

impl RegexPattern {
    fn new(pattern: &str, case_sensitive: bool) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| AppError::invalid_pattern(pattern, e))?;

        Ok(Self {
            regex,
            source: pattern.to_string(),
        })
    }
}

/**
 * 有序模式集合
 *
 * 按配置顺序求值，第一个命中的模式胜出。
 */
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    pub fn new(patterns: Vec<CompiledPattern>) -> Self {
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledPattern> {
        self.patterns.iter()
    }

    /// 该行第一个命中的模式
    pub fn first_match(&self, line: &str) -> Option<&CompiledPattern> {
        self.patterns.iter().find(|p| p.is_match(line))
    }

    /// 任一模式命中
    pub fn matches_any(&self, line: &str) -> bool {
        self.first_match(line).is_some()
    }
}
