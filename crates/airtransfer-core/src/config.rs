//! 端点配置
//!
//! `EndpointConfig` 在启动时构造一次，进程生命周期内不可变。

use anyhow::{Context, Result, bail};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// 默认请求体上限：16 GiB，对局域网传输来说约等于不设限
pub const DEFAULT_MAX_BODY_BYTES: u64 = 16 * 1024 * 1024 * 1024;

/// 默认读超时：两次读之间超过这个间隔就放弃该连接
///
/// 按单次读计时而不是整个请求，大文件慢速上传不受影响，
/// 但静默死掉的对端（没有 FIN/RST）不会无限占着连接和半截文件。
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// 自动扫描端口区间
pub const DEFAULT_PORT_RANGE: (u16, u16) = (5000, 5099);

/// TLS 模式
///
/// 默认走 HTTPS：Android 的 PWA 安装和 share-target 都要求
/// secure context。只提供 cert/key 其中之一属于配置错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// 使用外部签发的证书（例如 mkcert）
    Explicit { cert: PathBuf, key: PathBuf },
    /// 为本次会话生成自签名证书
    Adhoc,
    /// 纯 HTTP，仅在显式要求时使用
    None,
}

impl TlsMode {
    /// 根据 cert/key 路径和 HTTP 开关解析 TLS 模式
    ///
    /// 配对不完整时直接报错（fail fast，不静默降级）。
    pub fn resolve(
        cert: Option<PathBuf>,
        key: Option<PathBuf>,
        use_http: bool,
    ) -> Result<Self> {
        match (cert, key) {
            (Some(cert), Some(key)) => {
                // 显式证书优先于 --http
                Ok(TlsMode::Explicit { cert, key })
            }
            (Some(_), None) => bail!("--cert requires a matching --key"),
            (None, Some(_)) => bail!("--key requires a matching --cert"),
            (None, None) => {
                if use_http {
                    Ok(TlsMode::None)
                } else {
                    Ok(TlsMode::Adhoc)
                }
            }
        }
    }

    pub fn is_https(&self) -> bool {
        !matches!(self, TlsMode::None)
    }
}

/// 端点配置（值对象）
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// 监听地址（默认 0.0.0.0，否则手机连不上）
    pub bind_host: IpAddr,
    /// 监听端口
    pub port: u16,
    /// 广播给客户端的 IP（二维码 / 剪贴板里用的）
    pub advertised_ip: String,
    /// 上传目录
    pub upload_dir: PathBuf,
    /// 请求体上限（字节）
    pub max_body_bytes: u64,
    /// 单次 body 读的超时
    pub read_timeout: Duration,
    /// TLS 模式
    pub tls: TlsMode,
}

impl EndpointConfig {
    pub fn new(
        bind_host: IpAddr,
        port: u16,
        advertised_ip: String,
        upload_dir: PathBuf,
        tls: TlsMode,
    ) -> Self {
        Self {
            bind_host,
            port,
            advertised_ip,
            upload_dir,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            read_timeout: DEFAULT_READ_TIMEOUT,
            tls,
        }
    }

    /// 确保上传目录存在且可用（配置错误在启动时暴露）
    pub fn ensure_upload_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir).with_context(|| {
            format!("Invalid upload directory: {}", self.upload_dir.display())
        })?;
        Ok(())
    }

    /// 广播用 URL
    pub fn url(&self) -> String {
        crate::discovery::build_url(self.tls.is_https(), &self.advertised_ip, self.port)
    }
}

/// 默认上传目录：用户的下载文件夹
pub fn default_upload_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_resolve_pair() {
        let mode = TlsMode::resolve(
            Some(PathBuf::from("c.pem")),
            Some(PathBuf::from("k.pem")),
            false,
        )
        .unwrap();
        assert!(matches!(mode, TlsMode::Explicit { .. }));
        assert!(mode.is_https());
    }

    #[test]
    fn test_tls_resolve_mismatch_is_fatal() {
        assert!(TlsMode::resolve(Some(PathBuf::from("c.pem")), None, false).is_err());
        assert!(TlsMode::resolve(None, Some(PathBuf::from("k.pem")), false).is_err());
    }

    #[test]
    fn test_tls_resolve_defaults_to_adhoc_https() {
        assert_eq!(TlsMode::resolve(None, None, false).unwrap(), TlsMode::Adhoc);
        assert_eq!(TlsMode::resolve(None, None, true).unwrap(), TlsMode::None);
    }

    #[test]
    fn test_url_scheme_follows_tls_mode() {
        let host: IpAddr = "0.0.0.0".parse().unwrap();
        let mut config = EndpointConfig::new(
            host,
            5000,
            "192.168.1.5".to_string(),
            PathBuf::from("/tmp"),
            TlsMode::Adhoc,
        );
        assert_eq!(config.url(), "https://192.168.1.5:5000");

        config.tls = TlsMode::None;
        assert_eq!(config.url(), "http://192.168.1.5:5000");
    }
}
