//! AirTransfer CLI
//!
//! 启动流程：解析参数 → 探测局域网地址 → 分配端口 → 广播 URL
//! （二维码 / 剪贴板 / 浏览器）→ 服务到进程退出。

mod advertise;

use airtransfer_core::config::{self, DEFAULT_PORT_RANGE};
use airtransfer_core::notify::DesktopNotifier;
use airtransfer_core::{EndpointConfig, TlsMode, TransferEndpoint, discovery};
use anyhow::Result;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "airtransfer", version, about = "局域网文件接收器 - 手机扫码即传")]
struct Cli {
    /// 监听地址（默认全部网卡，否则手机连不上）
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// 监听端口（默认在 5000-5099 内自动扫描）
    #[arg(long)]
    port: Option<u16>,

    /// 二维码里广播的 IP/主机名（默认自动探测）
    #[arg(long)]
    ip: Option<String>,

    /// 保存目录（默认: ~/Downloads）
    #[arg(long)]
    downloads: Option<PathBuf>,

    /// 强制 HTTPS（自签名证书，PWA/share-target 需要 secure context）
    #[arg(long, conflicts_with = "http")]
    https: bool,

    /// 纯 HTTP（本机调试用，亦可设 AIRTRANSFER_USE_HTTP=1）
    #[arg(long)]
    http: bool,

    /// TLS 证书 PEM 路径
    #[arg(long, env = "AIRTRANSFER_CERT")]
    cert: Option<PathBuf>,

    /// TLS 私钥 PEM 路径
    #[arg(long, env = "AIRTRANSFER_KEY")]
    key: Option<PathBuf>,

    /// 不在终端打印二维码
    #[arg(long)]
    no_qr: bool,

    /// 不把 URL 复制到剪贴板
    #[arg(long)]
    no_copy: bool,

    /// 关闭收到文件时的提示音
    #[arg(long)]
    no_sound: bool,

    /// 启动后在浏览器打开上传页
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 桥接 log crate（airtransfer-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,airtransfer_core=debug")),
        )
        .try_init();

    let args = Cli::parse();

    // 原生 env 开关格式宽容：true / 1 / yes
    let env_http = std::env::var("AIRTRANSFER_USE_HTTP")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);
    let use_http = (args.http || env_http) && !args.https;

    // cert/key 配对不完整在这里直接退出
    let tls = TlsMode::resolve(args.cert, args.key, use_http)?;

    let upload_dir = args.downloads.unwrap_or_else(config::default_upload_dir);

    let advertised_ip = match args.ip.as_deref().map(str::trim) {
        Some(ip) if !ip.is_empty() => ip.to_string(),
        _ => discovery::get_ip_address().to_string(),
    };
    let port = args.port.unwrap_or_else(|| {
        discovery::find_open_port(args.host, DEFAULT_PORT_RANGE.0, DEFAULT_PORT_RANGE.1)
    });

    let endpoint_config = EndpointConfig::new(args.host, port, advertised_ip, upload_dir, tls);
    endpoint_config.ensure_upload_dir()?;

    let url = endpoint_config.url();

    match &endpoint_config.tls {
        TlsMode::Adhoc => {
            println!(
                "\nNOTE: You're using a self-signed HTTPS certificate.\n\
                 Chrome/Android will show 'Your connection is not private'.\n\
                 - Quick fix: tap Advanced → Proceed (unsafe)\n\
                 - No-warning option: provide a trusted cert via --cert/--key\n\
                 - Plain HTTP (weaker, PWA features limited): run with --http\n"
            );
        }
        TlsMode::None => {
            println!("\n✅ Running in Simple Mode (HTTP). No warnings.\nURL: {}", url);
        }
        TlsMode::Explicit { cert, .. } => {
            println!("\n🔒 Serving with certificate {}.\nURL: {}", cert.display(), url);
        }
    }

    if !args.no_qr {
        advertise::print_qr(&url);
    }
    if !args.no_copy && advertise::copy_to_clipboard(&url) {
        println!("URL copied to clipboard!");
    }
    if args.open {
        advertise::open_in_browser(&url);
    }

    tracing::info!("📥 保存目录: {}", endpoint_config.upload_dir.display());
    tracing::info!("📡 服务地址: {}", url);

    let notifier = Arc::new(DesktopNotifier::new(!args.no_sound));
    TransferEndpoint::new(endpoint_config, notifier).serve().await
}
