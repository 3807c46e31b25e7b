//! # Token 预算优化器
//!
//! 在内容仍超出 Token 预算时，按激进程度递增依次尝试：
//! 1. **错误段提取**：只保留错误/异常块（含堆栈），用分隔符连接
//! 2. **首尾截断**：保留头部和尾部各一半目标行数，中间插入省略标记
//! 3. **仅头部**：文件太小无法拆分（或首尾截断反而变大）时只保留头部
//!
//! Token 数用固定的字符数 / 4 估算，不是真实分词器。估算器通过
//! [`TokenEstimator`] 注入，替换为更严格的实现不影响控制流。

use std::sync::Arc;

use tracing::debug;

use crate::models::{BudgetStrategy, OptimizeResult, ReductionStrategy};
use crate::services::error_sections::extract_error_sections;

/// 每个 Token 对应的字符数（估算用）
pub const CHARS_PER_TOKEN: usize = 4;

/// 默认 Token 预算
pub const DEFAULT_MAX_TOKENS: usize = 4000;

/// 无法计算每行字符数时的目标行数
pub const FALLBACK_TARGET_LINES: usize = 100;

/// 错误段之间的分隔符
pub const ERROR_SECTION_SEPARATOR: &str = "\n\n--- Error Section ---\n\n";

/// Token 估算器
pub trait TokenEstimator: Send + Sync {
    /// 估算文本的 Token 数
    fn estimate(&self, text: &str) -> usize;

    /// 反推目标行数时使用的每 Token 字符数
    fn chars_per_token(&self) -> usize {
        CHARS_PER_TOKEN
    }
}

/// 字符数 / 4 的启发式估算（按 Unicode 字符计）
#[derive(Debug, Clone, Copy, Default)]
pub struct CharHeuristic;

impl TokenEstimator for CharHeuristic {
    fn estimate(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// 默认估算：字符数整除 4
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// 首尾截断的省略标记
fn truncation_marker(omitted: usize) -> String {
    format!("\n\n... [TRUNCATED: {} lines] ...\n\n", omitted)
}

/**
 * Token 预算优化器
 *
 * 无状态（估算器只读），可跨线程共享。
 */
#[derive(Clone)]
pub struct TokenBudgeter {
    estimator: Arc<dyn TokenEstimator>,
}

impl std::fmt::Debug for TokenBudgeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudgeter")
            .field("chars_per_token", &self.estimator.chars_per_token())
            .finish()
    }
}

impl Default for TokenBudgeter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBudgeter {
    pub fn new() -> Self {
        Self {
            estimator: Arc::new(CharHeuristic),
        }
    }

    pub fn with_estimator(estimator: impl TokenEstimator + 'static) -> Self {
        Self {
            estimator: Arc::new(estimator),
        }
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    /**
     * 将内容压缩到 Token 预算以内
     *
     * # 参数
     * * `content` - 待优化文本（通常是过滤器输出）
     * * `max_tokens` - Token 预算
     * * `strategy` - 请求的策略
     *
     * 每个分支的 `final_tokens` 都由实际返回的内容重新估算。
     */
    pub fn optimize(
        &self,
        content: &str,
        max_tokens: usize,
        strategy: BudgetStrategy,
    ) -> OptimizeResult {
        let original_tokens = self.estimate(content);

        if original_tokens <= max_tokens {
            return OptimizeResult::unchanged(content.to_string(), original_tokens);
        }

        if strategy == BudgetStrategy::Smart {
            if let Some(result) = self.try_error_extraction(content, max_tokens, original_tokens) {
                return result;
            }
        }

        let lines: Vec<&str> = content.split('\n').collect();
        let target_lines = self.target_lines(content, lines.len(), max_tokens);

        if strategy != BudgetStrategy::Head {
            if let Some(result) = self.try_head_tail(&lines, target_lines, original_tokens) {
                return result;
            }
        }

        self.head_only(&lines, target_lines, original_tokens)
    }

    fn try_error_extraction(
        &self,
        content: &str,
        max_tokens: usize,
        original_tokens: usize,
    ) -> Option<OptimizeResult> {
        let sections = extract_error_sections(content);
        if sections.is_empty() {
            return None;
        }

        let joined = sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join(ERROR_SECTION_SEPARATOR);
        let error_tokens = self.estimate(&joined);

        if error_tokens > max_tokens {
            debug!(
                sections = sections.len(),
                error_tokens, max_tokens, "Error sections exceed budget, falling back"
            );
            return None;
        }

        debug!(
            sections = sections.len(),
            original_tokens, error_tokens, "Reduced to error sections"
        );

        Some(OptimizeResult {
            content: joined,
            original_tokens,
            final_tokens: error_tokens,
            optimized: true,
            strategy: ReductionStrategy::ErrorExtraction,
            sections_extracted: Some(sections.len()),
            lines_kept: None,
            lines_removed: None,
        })
    }

    /// 目标行数 = 预算字符数 / 平均每行字符数
    fn target_lines(&self, content: &str, total_lines: usize, max_tokens: usize) -> usize {
        let total_chars = content.chars().count();
        let chars_per_line = if total_lines > 0 {
            total_chars as f64 / total_lines as f64
        } else {
            0.0
        };

        if chars_per_line > 0.0 {
            let target_chars = max_tokens.saturating_mul(self.estimator.chars_per_token());
            (target_chars as f64 / chars_per_line) as usize
        } else {
            FALLBACK_TARGET_LINES
        }
    }

    fn try_head_tail(
        &self,
        lines: &[&str],
        target_lines: usize,
        original_tokens: usize,
    ) -> Option<OptimizeResult> {
        let half = target_lines / 2;
        let total = lines.len();

        if total <= half * 2 {
            return None;
        }

        let omitted = total - half * 2;
        let mut truncated = lines[..half].join("\n");
        truncated.push_str(&truncation_marker(omitted));
        truncated.push_str(&lines[total - half..].join("\n"));

        let final_tokens = self.estimate(&truncated);
        if final_tokens > original_tokens {
            debug!(
                final_tokens,
                original_tokens, "Head/tail output larger than input, using head only"
            );
            return None;
        }

        debug!(
            kept = half * 2,
            omitted, original_tokens, final_tokens, "Applied head/tail truncation"
        );

        Some(OptimizeResult {
            content: truncated,
            original_tokens,
            final_tokens,
            optimized: true,
            strategy: ReductionStrategy::HeadTail,
            sections_extracted: None,
            lines_kept: Some(half * 2),
            lines_removed: Some(omitted),
        })
    }

    fn head_only(&self, lines: &[&str], target_lines: usize, original_tokens: usize) -> OptimizeResult {
        let keep = target_lines.min(lines.len());
        let truncated = lines[..keep].join("\n");
        let final_tokens = self.estimate(&truncated);

        debug!(keep, original_tokens, final_tokens, "Applied head-only truncation");

        OptimizeResult {
            content: truncated,
            original_tokens,
            final_tokens,
            optimized: true,
            strategy: ReductionStrategy::HeadOnly,
            sections_extracted: None,
            lines_kept: Some(keep),
            lines_removed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(lines: usize) -> String {
        (0..lines)
            .map(|i| format!("2024-01-01 10:00:{:02} INFO heartbeat ok seq={:06}", i % 60, i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_estimate_tokens_is_chars_div_four() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("日志日志"), 1);
    }

    #[test]
    fn test_within_budget_unchanged() {
        let budgeter = TokenBudgeter::new();
        let result = budgeter.optimize("short log", 100, BudgetStrategy::Smart);

        assert!(!result.optimized);
        assert_eq!(result.strategy, ReductionStrategy::None);
        assert_eq!(result.content, "short log");
        assert_eq!(result.original_tokens, result.final_tokens);
    }

    #[test]
    fn test_error_extraction_when_sections_fit() {
        let content = format!(
            "{}\nERROR failed to connect\n  at db.connect\n\n{}\nFATAL out of memory\n\n{}",
            noise(200),
            noise(200),
            noise(200)
        );
        let budgeter = TokenBudgeter::new();
        let result = budgeter.optimize(&content, 100, BudgetStrategy::Smart);

        assert_eq!(result.strategy, ReductionStrategy::ErrorExtraction);
        assert_eq!(result.sections_extracted, Some(2));
        assert_eq!(
            result.content,
            "ERROR failed to connect\n  at db.connect\n\n--- Error Section ---\n\nFATAL out of memory"
        );
        assert_eq!(result.final_tokens, estimate_tokens(&result.content));
    }

    #[test]
    fn test_head_tail_strategy_skips_error_extraction() {
        let content = format!("ERROR boom\n\n{}", noise(1000));
        let budgeter = TokenBudgeter::new();
        let result = budgeter.optimize(&content, 500, BudgetStrategy::HeadTail);
        assert_eq!(result.strategy, ReductionStrategy::HeadTail);
    }

    #[test]
    fn test_head_tail_marker_and_counts() {
        let content = noise(1000);
        let budgeter = TokenBudgeter::new();
        let result = budgeter.optimize(&content, 2000, BudgetStrategy::Smart);

        assert_eq!(result.strategy, ReductionStrategy::HeadTail);
        let kept = result.lines_kept.unwrap();
        let removed = result.lines_removed.unwrap();
        assert_eq!(kept + removed, 1000);
        assert!(result
            .content
            .contains(&format!("... [TRUNCATED: {} lines] ...", removed)));
        assert!(result.content.starts_with("2024-01-01 10:00:00 INFO heartbeat ok seq=000000"));
        assert!(result.content.ends_with("seq=000999"));
        assert!(result.final_tokens <= result.original_tokens);
        assert_eq!(result.final_tokens, estimate_tokens(&result.content));
    }

    #[test]
    fn test_head_strategy_keeps_prefix() {
        let content = noise(1000);
        let budgeter = TokenBudgeter::new();
        let result = budgeter.optimize(&content, 1000, BudgetStrategy::Head);

        assert_eq!(result.strategy, ReductionStrategy::HeadOnly);
        assert!(content.starts_with(&result.content));
        assert!(!result.content.contains("TRUNCATED"));
        assert!(result.final_tokens <= 1000);
    }

    #[test]
    fn test_zero_budget_keeps_only_marker() {
        let content = noise(50);
        let budgeter = TokenBudgeter::new();
        let result = budgeter.optimize(&content, 0, BudgetStrategy::Smart);

        assert!(result.optimized);
        assert_eq!(result.strategy, ReductionStrategy::HeadTail);
        assert_eq!(result.lines_kept, Some(0));
        assert_eq!(result.content.trim(), "... [TRUNCATED: 50 lines] ...");
        assert!(result.final_tokens <= result.original_tokens);
    }

    #[test]
    fn test_blank_middle_falls_back_to_head_only() {
        // 中间全是空行：省略标记比被删掉的内容更长
        let mut lines = vec!["x".repeat(200)];
        lines.extend(std::iter::repeat(String::new()).take(5));
        lines.push("y".repeat(200));
        let content = lines.join("\n");
        let budgeter = TokenBudgeter::new();
        let result = budgeter.optimize(&content, 40, BudgetStrategy::HeadTail);

        assert_eq!(result.strategy, ReductionStrategy::HeadOnly);
        assert_eq!(result.lines_kept, Some(2));
        assert!(result.final_tokens <= result.original_tokens);
        assert_eq!(result.final_tokens, estimate_tokens(&result.content));
    }

    #[test]
    fn test_custom_estimator_is_used() {
        struct WordCount;
        impl TokenEstimator for WordCount {
            fn estimate(&self, text: &str) -> usize {
                text.split_whitespace().count()
            }
        }

        let budgeter = TokenBudgeter::with_estimator(WordCount);
        let result = budgeter.optimize("one two three", 3, BudgetStrategy::Smart);
        assert!(!result.optimized);
        assert_eq!(result.original_tokens, 3);
    }
}
