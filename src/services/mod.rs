pub mod error_sections;
pub mod log_filter;
pub mod pattern_matcher;
pub mod token_budget;

pub use error_sections::{extract_error_sections, is_error_marker};
pub use log_filter::{
    FilterConfig, FilterConfigBuilder, HighlightFormat, LogFilter, DEFAULT_CONTEXT_LINES,
    DEFAULT_PATTERNS,
};
pub use pattern_matcher::{CompiledPattern, PatternSet};
pub use token_budget::{
    estimate_tokens, CharHeuristic, TokenBudgeter, TokenEstimator, DEFAULT_MAX_TOKENS,
};
