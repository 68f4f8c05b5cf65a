//! HTTP(S) 传输端点
//!
//! 包含:
//! - 路由与请求处理 (`/`、`/healthz`、`/upload`、`/share`)
//! - 上传持久化（文件名清洗、去重、落盘）

pub mod endpoint;
pub mod storage;

pub use endpoint::TransferEndpoint;
pub use storage::{StorageError, StoredFile, sanitize_filename};
