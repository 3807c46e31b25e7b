//! 附件处理器
//!
//! 负责：
//! - 按扩展名分派（文本日志 / zip 压缩包 / 其它跳过）
//! - 大小上限检查
//! - 递归遍历目录
//!
//! 单个文件失败只记录日志并返回空列表，不中断整个批次。

use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::archive::{is_archive, is_text_log, zip_handler};
use crate::error::{AppError, Result};
use crate::models::LogDocument;
use crate::utils::decode_log_content;

/// 默认单文件大小上限（MB）
pub const DEFAULT_MAX_SIZE_MB: u64 = 50;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct LogProcessor {
    max_size_bytes: u64,
}

impl Default for LogProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE_MB)
    }
}

impl LogProcessor {
    pub fn new(max_size_mb: u64) -> Self {
        Self {
            max_size_bytes: max_size_mb.saturating_mul(BYTES_PER_MB),
        }
    }

    /**
     * 处理单个附件
     *
     * # 参数
     * * `path` - 附件在磁盘上的路径
     * * `filename` - 展示用文件名；`None` 时取路径最后一段
     *
     * # 返回值
     * 解出的日志文档。不支持的类型、超限文件、读取失败都返回空列表。
     */
    pub fn process_attachment(&self, path: &Path, filename: Option<&str>) -> Vec<LogDocument> {
        let filename = filename.map(str::to_string).unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });

        match self.try_process_attachment(path, &filename) {
            Ok(documents) => documents,
            Err(e) => {
                warn!(file = %filename, error = %e, "Failed to process attachment");
                Vec::new()
            }
        }
    }

    fn try_process_attachment(&self, path: &Path, filename: &str) -> Result<Vec<LogDocument>> {
        let size = std::fs::metadata(path)?.len();
        if size > self.max_size_bytes {
            warn!(
                file = %filename,
                size_mb = %format!("{:.1}", size as f64 / BYTES_PER_MB as f64),
                "Attachment too large, skipped"
            );
            return Ok(Vec::new());
        }

        let name = Path::new(filename);
        if is_text_log(name) {
            let bytes = std::fs::read(path)?;
            let decoded = decode_log_content(&bytes);
            debug!(
                file = %filename,
                encoding = decoded.encoding.name(),
                bytes = bytes.len(),
                "Text log loaded"
            );
            if decoded.encoding.is_fallback() {
                warn!(
                    file = %filename,
                    encoding = decoded.encoding.name(),
                    "Log is not valid UTF-8, decoded with fallback encoding"
                );
            }
            Ok(vec![LogDocument::new(filename, decoded.text)])
        } else if is_archive(name) {
            zip_handler::read_zip_logs(path, filename, self.max_size_bytes)
                .map_err(|e| e.with_context(filename))
        } else {
            debug!(file = %filename, "Unsupported file type, skipped");
            Ok(Vec::new())
        }
    }

    /**
     * 递归处理目录下的所有普通文件
     *
     * 文件按名称排序遍历，结果顺序稳定。文档名为相对于 `dir` 的路径（`/` 分隔）。
     */
    pub fn process_directory(&self, dir: &Path) -> Result<Vec<LogDocument>> {
        if !dir.is_dir() {
            return Err(AppError::not_found(format!(
                "Directory not found: {}",
                dir.display()
            )));
        }

        let mut documents = Vec::new();
        let mut visited = 0usize;

        for entry in WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            visited += 1;

            let relative = entry
                .path()
                .strip_prefix(dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            documents.extend(self.process_attachment(entry.path(), Some(&relative)));
        }

        info!(
            dir = %dir.display(),
            files = visited,
            documents = documents.len(),
            "Directory processed"
        );
        Ok(documents)
    }

    /// 处理一组路径（文件或目录）；不存在的路径返回 `NotFound`
    pub fn process_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<LogDocument>> {
        let mut documents = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                documents.extend(self.process_directory(path)?);
            } else if path.is_file() {
                documents.extend(self.process_attachment(path, None));
            } else {
                return Err(AppError::not_found(format!(
                    "Path not found: {}",
                    path.display()
                )));
            }
        }
        Ok(documents)
    }
}
