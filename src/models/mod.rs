pub mod document;
pub mod reduction;

// 重新导出核心类型
pub use document::{LogDocument, LogSummary, ReducedLog};
pub use reduction::{
    BudgetStrategy, ErrorSection, FilterResult, MatchRecord, OptimizeResult, ReductionStrategy,
    MAX_MATCH_RECORDS,
};
