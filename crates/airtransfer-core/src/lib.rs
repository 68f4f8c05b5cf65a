//! AirTransfer Core Library
//!
//! 零配置局域网文件接收服务的核心实现：手机扫码（或通过 PWA 分享）
//! 即可向本机上传文件，保存到指定目录并触发桌面通知。
//!
//! # 模块
//!
//! - **discovery**: 局域网 IP 探测和端口分配
//! - **config**: 端点配置（绑定地址、上传目录、TLS 模式）
//! - **tls**: TLS 证书提供者（显式证书 / 会话自签名 / 关闭）
//! - **transfer**: HTTP(S) 上传端点（`/upload`、`/share` 等路由）
//! - **notify**: 通知回调接口（可插拔，默认 no-op）
//!
//! # 使用示例
//!
//! ```ignore
//! use airtransfer_core::{discovery, EndpointConfig, TlsMode, TransferEndpoint, NoopNotifier};
//! use std::sync::Arc;
//!
//! // 1. 解析局域网地址和可用端口
//! let ip = discovery::get_ip_address();
//! let port = discovery::find_open_port("0.0.0.0".parse()?, 5000, 5099);
//!
//! // 2. 构造端点配置（进程生命周期内不可变）
//! let config = EndpointConfig::new(host, port, ip.to_string(), upload_dir, TlsMode::Adhoc);
//!
//! // 3. 启动服务（绑定失败视为致命错误）
//! let endpoint = TransferEndpoint::new(config, Arc::new(NoopNotifier));
//! endpoint.serve().await?;
//! ```

pub mod config;
pub mod discovery;
pub mod notify;
pub mod tls;
pub mod transfer;

// Config re-exports
pub use config::{EndpointConfig, TlsMode};

// Notify re-exports
pub use notify::{NoopNotifier, NotificationSink};

// TLS re-exports
pub use tls::CertificateProvider;

// Transfer re-exports
pub use transfer::{StorageError, TransferEndpoint};
