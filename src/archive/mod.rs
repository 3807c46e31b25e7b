//! 附件处理
//!
//! 把工单附件（单个文本日志或 zip 压缩包）转成解码后的 [`LogDocument`] 列表，
//! 供后续过滤与预算使用。
//!
//! [`LogDocument`]: crate::models::LogDocument

pub mod processor;
pub mod zip_handler;

pub use processor::{LogProcessor, DEFAULT_MAX_SIZE_MB};

use std::path::Path;

/// 作为文本日志处理的扩展名
pub const TEXT_LOG_EXTENSIONS: &[&str] = &["txt", "log", "out", "err", "trace"];

/// 作为压缩包处理的扩展名
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

fn extension_in(path: &Path, set: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| set.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// 是否为受支持的文本日志
pub fn is_text_log(path: &Path) -> bool {
    extension_in(path, TEXT_LOG_EXTENSIONS)
}

/// 是否为受支持的压缩包
pub fn is_archive(path: &Path) -> bool {
    extension_in(path, ARCHIVE_EXTENSIONS)
}
