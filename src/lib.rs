//! 日志精简器
//!
//! 把体积巨大的工单日志附件压缩成适合大模型上下文的摘要：
//! - `services::log_filter`：按关键词/正则保留命中行及上下文
//! - `services::error_sections`：提取错误段（错误行 + 堆栈）
//! - `services::token_budget`：在 Token 预算内选择保留策略
//! - `archive`：读取文本附件与 zip 压缩包
//! - `pipeline` / `report`：批量精简并组装输出

pub mod archive;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod services;
pub mod utils;

pub use config::AnalyzerConfig;
pub use error::{AppError, Result};
pub use models::{
    BudgetStrategy, ErrorSection, FilterResult, LogDocument, LogSummary, MatchRecord,
    OptimizeResult, ReducedLog, ReductionStrategy,
};
pub use pipeline::{
    analyze_directory, analyze_paths, reduce_document, reduce_documents, AnalysisRun,
    ReduceOptions,
};
pub use services::{extract_error_sections, FilterConfig, LogFilter, TokenBudgeter};
