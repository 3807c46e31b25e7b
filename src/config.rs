//! 分析器配置
//!
//! 可从 TOML 或 JSON 文件加载，所有字段都有默认值；命令行参数在此基础上覆盖。

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::archive::{LogProcessor, DEFAULT_MAX_SIZE_MB};
use crate::models::BudgetStrategy;
use crate::pipeline::ReduceOptions;
use crate::services::{FilterConfig, DEFAULT_CONTEXT_LINES, DEFAULT_MAX_TOKENS};

pub const DEFAULT_MAX_LINES: usize = 500;

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}

fn default_max_lines() -> usize {
    DEFAULT_MAX_LINES
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_max_file_size_mb() -> u64 {
    DEFAULT_MAX_SIZE_MB
}

/// 日志精简配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// 字面关键词（自动转义）
    pub keywords: Vec<String>,

    /// 原始正则
    pub patterns: Vec<String>,

    /// 追加内置的错误/失败类正则
    pub use_default_patterns: bool,

    #[validate(range(max = 1000))]
    #[serde(default = "default_context_lines")]
    pub context_lines_before: usize,

    #[validate(range(max = 1000))]
    #[serde(default = "default_context_lines")]
    pub context_lines_after: usize,

    pub case_sensitive: bool,

    /// 过滤阶段行数上限，0 表示不限
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    #[validate(range(min = 1, max = 10_000_000))]
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    pub strategy: BudgetStrategy,

    #[validate(range(min = 1, max = 1024))]
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            patterns: Vec::new(),
            use_default_patterns: false,
            context_lines_before: DEFAULT_CONTEXT_LINES,
            context_lines_after: DEFAULT_CONTEXT_LINES,
            case_sensitive: false,
            max_lines: DEFAULT_MAX_LINES,
            max_tokens: DEFAULT_MAX_TOKENS,
            strategy: BudgetStrategy::default(),
            max_file_size_mb: DEFAULT_MAX_SIZE_MB,
        }
    }
}

impl AnalyzerConfig {
    /// 从 TOML 文件加载配置
    ///
    /// # Errors
    /// 文件不存在、格式错误或取值越界时返回错误
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        tracing::info!("Loaded analyzer configuration from: {}", path.display());
        config.validated()
    }

    /// 从 JSON 文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?;

        tracing::info!("Loaded analyzer configuration from: {}", path.display());
        config.validated()
    }

    /// 按扩展名选择解析器（`.toml` / `.json`）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_file(path),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => eyre::bail!(
                "Unsupported config file extension (expected .toml or .json): {}",
                path.display()
            ),
        }
    }

    /// 校验取值范围
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .wrap_err("Analyzer configuration is out of range")?;
        Ok(self)
    }

    /// 编译过滤配置；模式非法时返回 `InvalidPattern`
    pub fn filter_config(&self) -> crate::error::Result<FilterConfig> {
        let mut builder = FilterConfig::builder()
            .keywords(self.keywords.iter().cloned())
            .patterns(self.patterns.iter().cloned())
            .context_before(self.context_lines_before)
            .context_after(self.context_lines_after)
            .case_sensitive(self.case_sensitive);

        if self.use_default_patterns {
            builder = builder.with_default_patterns();
        }

        builder.build()
    }

    pub fn reduce_options(&self) -> ReduceOptions {
        ReduceOptions {
            max_lines: Some(self.max_lines).filter(|&n| n > 0),
            max_tokens: self.max_tokens,
            strategy: self.strategy,
        }
    }

    pub fn processor(&self) -> LogProcessor {
        LogProcessor::new(self.max_file_size_mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.context_lines_before, 5);
        assert_eq!(config.context_lines_after, 5);
        assert_eq!(config.max_lines, 500);
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.strategy, BudgetStrategy::Smart);
        assert_eq!(config.max_file_size_mb, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("distill.toml");
        std::fs::write(
            &path,
            "keywords = [\"timeout\", \"refused\"]\nmax_tokens = 2000\nstrategy = \"head_tail\"\n",
        )
        .unwrap();

        let config = AnalyzerConfig::from_file(&path).unwrap();
        assert_eq!(config.keywords, vec!["timeout", "refused"]);
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.strategy, BudgetStrategy::HeadTail);
        assert_eq!(config.context_lines_before, 5);
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("distill.json");
        std::fs::write(&path, r#"{"patterns": ["fail(ed)?"], "case_sensitive": true}"#).unwrap();

        let config = AnalyzerConfig::from_file(&path).unwrap();
        assert_eq!(config.patterns, vec!["fail(ed)?"]);
        assert!(config.case_sensitive);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "max_tokens = 0\n").unwrap();

        let err = AnalyzerConfig::from_toml_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("out of range"));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert!(AnalyzerConfig::from_file("config.yaml").is_err());
    }

    #[test]
    fn test_missing_file_mentions_path() {
        let err = AnalyzerConfig::from_toml_file("/nonexistent/distill.toml").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/distill.toml"));
    }

    #[test]
    fn test_filter_config_compiles_patterns() {
        let config = AnalyzerConfig {
            keywords: vec!["error".into()],
            patterns: vec!["warn(ing)?".into()],
            use_default_patterns: true,
            ..Default::default()
        };
        let filter = config.filter_config().unwrap();
        assert_eq!(
            filter.patterns().len(),
            2 + crate::services::DEFAULT_PATTERNS.len()
        );
    }

    #[test]
    fn test_invalid_regex_surfaces_pattern_error() {
        let config = AnalyzerConfig {
            patterns: vec!["(".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.filter_config(),
            Err(crate::error::AppError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_empty_keyword_keeps_every_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("distill.toml");
        std::fs::write(&path, "keywords = [\"\"]\ncontext_lines_before = 0\ncontext_lines_after = 0\n")
            .unwrap();

        let config = AnalyzerConfig::from_file(&path).unwrap();
        let filter = crate::services::LogFilter::new(config.filter_config().unwrap());
        let result = filter.filter("a\n\nb", None);
        assert_eq!(result.matched_lines, 3);
        assert_eq!(result.content, "a\n\nb");
    }

    #[test]
    fn test_zero_max_lines_means_unlimited() {
        let config = AnalyzerConfig {
            max_lines: 0,
            ..Default::default()
        };
        assert_eq!(config.reduce_options().max_lines, None);
    }
}
