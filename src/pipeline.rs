//! 精简流水线
//!
//! 单个文档：过滤 → Token 预算优化 → [`ReducedLog`]。
//! 多个文档用 rayon 并行处理，输出顺序与输入一致。

use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info, info_span};

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::models::{BudgetStrategy, LogDocument, LogSummary, ReducedLog};
use crate::services::{LogFilter, TokenBudgeter};

/// 每个文档共用的精简参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceOptions {
    /// 过滤阶段保留行数上限；`None` 表示不限
    pub max_lines: Option<usize>,
    pub max_tokens: usize,
    pub strategy: BudgetStrategy,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            max_lines: Some(500),
            max_tokens: crate::services::DEFAULT_MAX_TOKENS,
            strategy: BudgetStrategy::Smart,
        }
    }
}

/**
 * 精简单个日志文档
 *
 * `filtered_lines`/`matched_lines` 来自过滤阶段；`content`、`estimated_tokens`、
 * `optimized`、`strategy` 来自预算阶段。
 */
pub fn reduce_document(
    filter: &LogFilter,
    budgeter: &TokenBudgeter,
    document: &LogDocument,
    options: &ReduceOptions,
) -> ReducedLog {
    let span = info_span!("reduce", file = %document.filename);
    let _guard = span.enter();

    let filtered = filter.filter(&document.content, options.max_lines);
    let optimized = budgeter.optimize(&filtered.content, options.max_tokens, options.strategy);

    debug!(
        original_lines = document.line_count,
        filtered_lines = filtered.filtered_lines,
        matched_lines = filtered.matched_lines,
        final_tokens = optimized.final_tokens,
        strategy = %optimized.strategy,
        "Document reduced"
    );

    ReducedLog {
        filename: document.filename.clone(),
        original_lines: document.line_count,
        filtered_lines: filtered.filtered_lines,
        matched_lines: filtered.matched_lines,
        content: optimized.content,
        estimated_tokens: optimized.final_tokens,
        optimized: optimized.optimized,
        strategy: optimized.strategy,
    }
}

/// 并行精简一批文档，结果顺序与输入一致
pub fn reduce_documents(
    filter: &LogFilter,
    budgeter: &TokenBudgeter,
    documents: &[LogDocument],
    options: &ReduceOptions,
) -> Vec<ReducedLog> {
    let reduced: Vec<ReducedLog> = documents
        .par_iter()
        .map(|doc| reduce_document(filter, budgeter, doc, options))
        .collect();

    info!(
        documents = reduced.len(),
        total_tokens = reduced.iter().map(|r| r.estimated_tokens).sum::<usize>(),
        optimized = reduced.iter().filter(|r| r.optimized).count(),
        "Reduction finished"
    );

    reduced
}

/// 一次完整运行的结果
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub summary: LogSummary,
    pub reduced: Vec<ReducedLog>,
}

/**
 * 读取附件并精简：文件、压缩包或目录均可
 *
 * # 错误
 * 模式非法返回 `InvalidPattern`；路径不存在返回 `NotFound`
 */
pub fn analyze_paths<P: AsRef<Path>>(config: &AnalyzerConfig, paths: &[P]) -> Result<AnalysisRun> {
    let filter = LogFilter::new(config.filter_config()?);
    let documents = config.processor().process_paths(paths)?;

    if documents.is_empty() {
        tracing::warn!("No processable log files found");
    }

    let reduced = reduce_documents(
        &filter,
        &TokenBudgeter::new(),
        &documents,
        &config.reduce_options(),
    );

    Ok(AnalysisRun {
        summary: LogSummary::from_documents(&documents),
        reduced,
    })
}

/// 精简目录下的全部附件
pub fn analyze_directory(config: &AnalyzerConfig, dir: &Path) -> Result<AnalysisRun> {
    if !dir.is_dir() {
        return Err(crate::error::AppError::not_found(format!(
            "Attachment directory not found: {}",
            dir.display()
        )));
    }
    analyze_paths(config, &[dir])
}
