use serde::{Deserialize, Serialize};

use super::reduction::ReductionStrategy;

/// 从附件中解出的单个日志文档
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LogDocument {
    /// 文件名；压缩包成员为 `归档名/成员路径`
    pub filename: String,
    /// 来源压缩包（仅 zip 成员）
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_archive: Option<String>,
    /// 解码后的文本
    pub content: String,
    /// 行数（换行符个数 + 1）
    pub line_count: usize,
    /// 解码后文本的字节数
    pub size: usize,
}

impl LogDocument {
    pub fn new(filename: impl Into<String>, content: String) -> Self {
        let line_count = content.matches('\n').count() + 1;
        let size = content.len();
        Self {
            filename: filename.into(),
            source_archive: None,
            content,
            line_count,
            size,
        }
    }

    pub fn with_source_archive(mut self, archive: impl Into<String>) -> Self {
        self.source_archive = Some(archive.into());
        self
    }
}

/// 单个日志文件经过过滤 + 预算优化后的结果
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReducedLog {
    pub filename: String,
    pub original_lines: usize,
    pub filtered_lines: usize,
    pub matched_lines: usize,
    pub content: String,
    pub estimated_tokens: usize,
    pub optimized: bool,
    pub strategy: ReductionStrategy,
}

/// 一批日志文档的汇总统计
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub count: usize,
    pub total_lines: usize,
    pub total_size: usize,
    pub files: Vec<String>,
}

impl LogSummary {
    pub fn from_documents(documents: &[LogDocument]) -> Self {
        Self {
            count: documents.len(),
            total_lines: documents.iter().map(|d| d.line_count).sum(),
            total_size: documents.iter().map(|d| d.size).sum(),
            files: documents.iter().map(|d| d.filename.clone()).collect(),
        }
    }
}
