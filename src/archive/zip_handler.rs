use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::archive::is_text_log;
use crate::error::{AppError, Result};
use crate::models::LogDocument;
use crate::utils::decode_log_content;

/**
 * 读取 zip 压缩包中的文本日志
 *
 * 全部在内存中完成，不向磁盘解压。跳过规则：
 * - 目录条目
 * - 非文本日志扩展名
 * - 解压后大小超过 `max_size_bytes`
 * - 名称含 `..` 的条目（路径遍历）
 *
 * 单个成员读取失败只记录日志并跳过；压缩包本身打不开时返回错误。
 *
 * # 参数
 * * `path` - 压缩包路径
 * * `archive_name` - 展示用的压缩包名，成员文件名为 `archive_name/member`
 * * `max_size_bytes` - 单个成员的大小上限
 */
pub fn read_zip_logs(
    path: &Path,
    archive_name: &str,
    max_size_bytes: u64,
) -> Result<Vec<LogDocument>> {
    let file = File::open(path).map_err(|e| {
        AppError::archive_error(
            format!("Failed to open ZIP file: {}", e),
            Some(path.to_path_buf()),
        )
    })?;

    let mut archive = ZipArchive::new(file).map_err(|e| {
        AppError::archive_error(
            format!("Failed to open ZIP archive: {}", e),
            Some(path.to_path_buf()),
        )
    })?;

    let mut documents = Vec::new();

    for i in 0..archive.len() {
        let mut member = match archive.by_index(i) {
            Ok(member) => member,
            Err(e) => {
                warn!(archive = archive_name, index = i, error = %e, "Failed to access ZIP entry");
                continue;
            }
        };

        if member.is_dir() {
            continue;
        }

        let member_name = member.name().to_string();

        if member_name.contains("..") {
            warn!(archive = archive_name, member = %member_name, "Unsafe path in archive, skipped");
            continue;
        }

        if !is_text_log(Path::new(&member_name)) {
            debug!(archive = archive_name, member = %member_name, "Not a text log, skipped");
            continue;
        }

        if member.size() > max_size_bytes {
            warn!(
                archive = archive_name,
                member = %member_name,
                size = member.size(),
                "Archive member too large, skipped"
            );
            continue;
        }

        let mut buffer = Vec::with_capacity(member.size() as usize);
        if let Err(e) = member.read_to_end(&mut buffer) {
            warn!(archive = archive_name, member = %member_name, error = %e, "Failed to extract member");
            continue;
        }

        let decoded = decode_log_content(&buffer);
        if decoded.had_errors {
            debug!(
                member = %member_name,
                encoding = decoded.encoding.name(),
                "Member decoded with substitutions"
            );
        }

        documents.push(
            LogDocument::new(format!("{}/{}", archive_name, member_name), decoded.text)
                .with_source_archive(archive_name),
        );
    }

    debug!(archive = archive_name, extracted = documents.len(), "ZIP archive processed");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(dir: &TempDir, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.path().join("bundle.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_reads_text_members_only() {
        let dir = TempDir::new().unwrap();
        let path = build_zip(
            &dir,
            &[
                ("logs/", b""),
                ("logs/app.log", b"INFO a\nERROR b"),
                ("logs/picture.png", b"\x89PNG"),
                ("notes.txt", b"hello"),
            ],
        );

        let docs = read_zip_logs(&path, "bundle.zip", u64::MAX).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].filename, "bundle.zip/logs/app.log");
        assert_eq!(docs[0].line_count, 2);
        assert_eq!(docs[0].source_archive.as_deref(), Some("bundle.zip"));
        assert_eq!(docs[1].filename, "bundle.zip/notes.txt");
    }

    #[test]
    fn test_oversized_member_skipped() {
        let dir = TempDir::new().unwrap();
        let big = vec![b'x'; 64];
        let path = build_zip(&dir, &[("big.log", &big), ("small.log", b"ok")]);

        let docs = read_zip_logs(&path, "bundle.zip", 16).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "ok");
    }

    #[test]
    fn test_traversal_member_skipped() {
        let dir = TempDir::new().unwrap();
        let path = build_zip(&dir, &[("../evil.log", b"pwned"), ("good.log", b"fine")]);

        let docs = read_zip_logs(&path, "bundle.zip", u64::MAX).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "bundle.zip/good.log");
    }

    #[test]
    fn test_corrupt_archive_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();

        let err = read_zip_logs(&path, "broken.zip", u64::MAX).unwrap_err();
        assert!(matches!(err, AppError::Archive { .. }));
    }
}
