//! TLS 证书提供者
//!
//! 启动时把 `TlsMode` 解析成具体的 rustls 配置：
//!
//! - **Explicit**: 加载外部 PEM 证书对（路径错误 = 启动失败）
//! - **EphemeralSelfSigned**: 用 rcgen 为本次会话生成自签名证书，
//!   浏览器会提示不受信任，但足以满足 secure context 要求
//! - **None**: 纯 HTTP

use crate::config::TlsMode;
use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use log::{info, warn};
use std::path::PathBuf;

/// 证书提供者
#[derive(Debug, Clone)]
pub enum CertificateProvider {
    Explicit { cert: PathBuf, key: PathBuf },
    EphemeralSelfSigned { hostnames: Vec<String> },
    None,
}

impl CertificateProvider {
    /// 从 TLS 模式构造，自签名证书的 SAN 里带上广播 IP
    pub fn from_mode(mode: &TlsMode, advertised_ip: &str) -> Self {
        match mode {
            TlsMode::Explicit { cert, key } => CertificateProvider::Explicit {
                cert: cert.clone(),
                key: key.clone(),
            },
            TlsMode::Adhoc => CertificateProvider::EphemeralSelfSigned {
                hostnames: vec!["localhost".to_string(), advertised_ip.to_string()],
            },
            TlsMode::None => CertificateProvider::None,
        }
    }

    /// 解析为 rustls 配置，`None` 模式返回 `Ok(None)`
    pub async fn resolve(&self) -> Result<Option<RustlsConfig>> {
        match self {
            CertificateProvider::Explicit { cert, key } => {
                let config = RustlsConfig::from_pem_file(cert, key)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to load TLS material (cert: {}, key: {})",
                            cert.display(),
                            key.display()
                        )
                    })?;
                info!("Loaded TLS certificate from {}", cert.display());
                Ok(Some(config))
            }
            CertificateProvider::EphemeralSelfSigned { hostnames } => {
                let rcgen::CertifiedKey { cert, key_pair } =
                    rcgen::generate_simple_self_signed(hostnames.clone())
                        .context("Failed to generate self-signed certificate")?;
                let config = RustlsConfig::from_pem(
                    cert.pem().into_bytes(),
                    key_pair.serialize_pem().into_bytes(),
                )
                .await
                .context("Failed to build rustls config from generated certificate")?;
                warn!("Using a session self-signed certificate, browsers will warn");
                Ok(Some(config))
            }
            CertificateProvider::None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ephemeral_certificate_resolves() {
        let provider = CertificateProvider::EphemeralSelfSigned {
            hostnames: vec!["localhost".to_string(), "192.168.1.5".to_string()],
        };
        assert!(provider.resolve().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_none_mode_resolves_to_plain_http() {
        assert!(CertificateProvider::None.resolve().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_pem_files_fail_fast() {
        let provider = CertificateProvider::Explicit {
            cert: PathBuf::from("/nonexistent/cert.pem"),
            key: PathBuf::from("/nonexistent/key.pem"),
        };
        assert!(provider.resolve().await.is_err());
    }
}
