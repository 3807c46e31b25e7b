use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/**
 * 应用错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * 核心精简流程（过滤/预算）只有配置类错误；IO、归档、编码错误来自外围的附件处理层。
 */
#[derive(Error, Debug, Diagnostic)]
pub enum AppError {
    #[error("Invalid pattern `{pattern}`: {reason}")]
    #[diagnostic(
        code(log_distill::invalid_pattern),
        help("Check your regex pattern syntax; plain keywords are escaped automatically")
    )]
    InvalidPattern { pattern: String, reason: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(log_distill::io_error))]
    Io(#[from] std::io::Error),

    #[error("Archive error: {message}")]
    #[diagnostic(
        code(log_distill::archive_error),
        help("Ensure the archive file is not corrupted and is a supported format")
    )]
    Archive {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(log_distill::config_error),
        help("Check the config file format (TOML or JSON) and field names")
    )]
    Config(String),

    #[error("Validation error: {0}")]
    #[diagnostic(
        code(log_distill::validation_error),
        help("Check that your input meets the required format and constraints")
    )]
    Validation(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(log_distill::not_found))]
    NotFound(String),
}

impl AppError {
    /**
     * 创建模式错误
     */
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        AppError::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    /**
     * 创建归档错误
     */
    pub fn archive_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        AppError::Archive {
            message: message.into(),
            path,
        }
    }

    /**
     * 创建验证错误
     */
    pub fn validation_error(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /**
     * 创建未找到错误
     */
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /**
     * 为错误添加上下文信息
     */
    pub fn with_context(self, context: impl Into<String>) -> Self {
        let context = context.into();
        match self {
            AppError::Archive { message, path } => AppError::Archive {
                message: format!("{}: {}", context, message),
                path,
            },
            AppError::Config(message) => AppError::Config(format!("{}: {}", context, message)),
            other => other,
        }
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, AppError>;

/// 将 eyre::Error（配置加载链路）转换为 AppError
pub fn eyre_to_app_error(error: eyre::Error) -> AppError {
    AppError::Config(format!("{:#}", error))
}
