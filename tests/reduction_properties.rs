//! 过滤与预算优化的性质测试
//!
//! - 保留行数不超过总行数
//! - 输出行保持原始顺序
//! - 优化结果不会变大，`final_tokens` 与返回内容一致
//! - 对优化结果再次优化不会变大

use log_distill::models::BudgetStrategy;
use log_distill::services::{estimate_tokens, FilterConfig, LogFilter, TokenBudgeter};
use proptest::prelude::*;

fn log_word() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("INFO heartbeat ok"),
        Just("DEBUG cache hit"),
        Just("WARN slow response"),
        Just("ERROR connection refused"),
        Just("Exception in thread main"),
        Just("  at com.example.Worker.run(Worker.java:42)"),
        Just(""),
    ]
}

/// 每行带唯一序号前缀，便于从输出反推原始行号
fn numbered_log() -> impl Strategy<Value = String> {
    prop::collection::vec(log_word(), 0..300).prop_map(|words| {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| format!("L{:05} {}", i, w))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn free_text() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9 :=.\\-]{0,120}", 0..400).prop_map(|lines| lines.join("\n"))
}

fn strategy() -> impl Strategy<Value = BudgetStrategy> {
    prop_oneof![
        Just(BudgetStrategy::Smart),
        Just(BudgetStrategy::HeadTail),
        Just(BudgetStrategy::Head),
    ]
}

fn line_number(line: &str) -> usize {
    line[1..6].parse().expect("numbered line prefix")
}

#[cfg(test)]
mod filter_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_filtered_never_exceeds_total(
            content in numbered_log(),
            before in 0usize..8,
            after in 0usize..8,
            max_lines in prop::option::of(1usize..200),
        ) {
            let filter = LogFilter::new(
                FilterConfig::builder()
                    .keyword("error")
                    .pattern("slow|refused")
                    .context_before(before)
                    .context_after(after)
                    .build()
                    .unwrap(),
            );
            let result = filter.filter(&content, max_lines);

            prop_assert!(result.filtered_lines <= result.total_lines);
            prop_assert!(result.matches.len() <= 20);
            prop_assert!(result.matches.len() <= result.matched_lines);
            if let Some(limit) = max_lines {
                if result.matched_lines > 0 {
                    prop_assert!(result.filtered_lines <= limit);
                }
            }
        }

        #[test]
        fn prop_output_preserves_line_order(
            content in numbered_log(),
            context in 0usize..6,
        ) {
            prop_assume!(!content.is_empty());
            let filter = LogFilter::new(
                FilterConfig::builder()
                    .keyword("exception")
                    .keyword("warn")
                    .context_lines(context)
                    .build()
                    .unwrap(),
            );
            let result = filter.filter(&content, None);

            let numbers: Vec<usize> = result.content.split('\n').map(line_number).collect();
            prop_assert_eq!(numbers.len(), result.filtered_lines);
            prop_assert!(numbers.windows(2).all(|w| w[0] < w[1]), "out of order: {:?}", numbers);
        }

        #[test]
        fn prop_passthrough_is_identity(content in free_text()) {
            let result = LogFilter::new(FilterConfig::default()).filter(&content, None);
            prop_assert_eq!(result.content, content);
            prop_assert!(!result.truncated);
        }
    }
}

#[cfg(test)]
mod budget_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_optimize_never_grows_and_reports_exact_tokens(
            content in prop_oneof![numbered_log(), free_text()],
            max_tokens in 0usize..3000,
            strategy in strategy(),
        ) {
            let result = TokenBudgeter::new().optimize(&content, max_tokens, strategy);

            prop_assert_eq!(result.original_tokens, estimate_tokens(&content));
            prop_assert_eq!(result.final_tokens, estimate_tokens(&result.content));
            if result.optimized {
                prop_assert!(result.final_tokens <= result.original_tokens);
            } else {
                prop_assert_eq!(&result.content, &content);
            }
        }

        #[test]
        fn prop_reoptimizing_never_grows(
            content in prop_oneof![numbered_log(), free_text()],
            max_tokens in 1usize..2000,
            strategy in strategy(),
        ) {
            let budgeter = TokenBudgeter::new();
            let first = budgeter.optimize(&content, max_tokens, strategy);
            let second = budgeter.optimize(&first.content, max_tokens, strategy);

            prop_assert!(!second.optimized || second.final_tokens <= first.final_tokens);
        }
    }
}
