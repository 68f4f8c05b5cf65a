//! 上传持久化
//!
//! 文件名清洗 + 去重 + 落盘。关键不变量：
//!
//! - 清洗后的文件名不可能逃出上传目录（路径穿越防御）
//! - 任何写入都不会覆盖已有文件：目标以 `create_new` 独占创建，
//!   撞名时换下一个 `_n` 后缀重试，并发同名上传也各得其所

use log::debug;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// 持久化错误
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 请求体 / multipart 流读取中断（客户端掉线等）
    #[error("Upload stream error: {0}")]
    Stream(String),

    /// 对端停止发送超过读超时（静默掉线）
    #[error("Upload read timed out")]
    TimedOut,

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// 保存成功的文件
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// 去重后的最终文件名
    pub final_name: String,
    /// 上传目录下的完整路径
    pub path: PathBuf,
}

/// 清洗客户端提供的文件名
///
/// 丢弃目录部分（`/` 和 `\` 都算），把 `[A-Za-z0-9._-]` 以外的字符
/// 替换成 `_`，再去掉首尾的 `.` / `_`（顺带消灭 `..`）。
/// 全部洗没了就退回 `unnamed`。
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// 在上传目录里独占创建一个不冲突的目标文件
///
/// `name.ext` 被占用时依次尝试 `name_1.ext`、`name_2.ext`…
/// 创建本身用 `create_new`（O_EXCL），存在性检查和创建是同一个
/// 原子操作，两个并发的同名上传不可能拿到同一个路径。
pub async fn create_unique(dir: &Path, filename: &str) -> std::io::Result<(File, StoredFile)> {
    let (stem, ext) = split_extension(filename);

    let mut counter: u32 = 0;
    loop {
        let candidate = if counter == 0 {
            filename.to_string()
        } else if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };

        let path = dir.join(&candidate);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => {
                if counter > 0 {
                    debug!("Duplicate name {}, stored as {}", filename, candidate);
                }
                return Ok((
                    file,
                    StoredFile {
                        final_name: candidate,
                        path,
                    },
                ));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn split_extension(filename: &str) -> (&str, &str) {
    // 只认最后一个点，且不把隐藏文件的前导点当扩展名
    match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx + 1..]),
        _ => (filename, ""),
    }
}

/// 把分享的文本保存为 `shared_text_<epoch>.txt`
///
/// 同一秒内的两次分享走和上传相同的 `_n` 后缀去重。
pub async fn save_shared_text(dir: &Path, text: &str) -> Result<StoredFile, StorageError> {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let filename = format!("shared_text_{}.txt", epoch);

    let (mut file, stored) = create_unique(dir, &filename).await?;
    if let Err(e) = write_all_and_flush(&mut file, text.as_bytes()).await {
        discard_partial(&stored.path).await;
        return Err(e.into());
    }
    Ok(stored)
}

async fn write_all_and_flush(file: &mut File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.flush().await
}

/// 清理写到一半的残留文件（客户端掉线 / 磁盘错误）
pub async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log::warn!("Failed to remove partial file {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_names() {
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("my report-v2.pdf"), "my_report-v2.pdf");
    }

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\windows\\system32"), "system32");
        assert_eq!(sanitize_filename("/etc/shadow"), "shadow");
    }

    #[test]
    fn test_sanitize_never_empty() {
        assert_eq!(sanitize_filename("...."), "unnamed");
        assert_eq!(sanitize_filename("///"), "unnamed");
        assert_eq!(sanitize_filename("日本語"), "unnamed");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("photo.jpg"), ("photo", "jpg"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", "gz"));
        assert_eq!(split_extension("Makefile"), ("Makefile", ""));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
    }

    #[tokio::test]
    async fn test_create_unique_appends_suffix() {
        let dir = tempfile::tempdir().unwrap();

        let (_, first) = create_unique(dir.path(), "photo.jpg").await.unwrap();
        let (_, second) = create_unique(dir.path(), "photo.jpg").await.unwrap();
        let (_, third) = create_unique(dir.path(), "photo.jpg").await.unwrap();

        assert_eq!(first.final_name, "photo.jpg");
        assert_eq!(second.final_name, "photo_1.jpg");
        assert_eq!(third.final_name, "photo_2.jpg");
    }

    #[tokio::test]
    async fn test_create_unique_without_extension() {
        let dir = tempfile::tempdir().unwrap();

        let (_, first) = create_unique(dir.path(), "notes").await.unwrap();
        let (_, second) = create_unique(dir.path(), "notes").await.unwrap();

        assert_eq!(first.final_name, "notes");
        assert_eq!(second.final_name, "notes_1");
    }

    #[tokio::test]
    async fn test_shared_text_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let stored = save_shared_text(dir.path(), "hello").await.unwrap();
        assert!(stored.final_name.starts_with("shared_text_"));
        assert!(stored.final_name.ends_with(".txt"));

        let content = tokio::fs::read_to_string(&stored.path).await.unwrap();
        assert_eq!(content, "hello");
    }
}
