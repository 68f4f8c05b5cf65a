//! 会话广播
//!
//! 核心绑定完成后，把最终 URL 递到用户手边：终端 ASCII 二维码、
//! 剪贴板、浏览器。全部 best-effort，失败不影响服务本身。

use log::{debug, warn};
use qrcode::QrCode;
use qrcode::render::unicode;
use std::io::Write;
use std::process::{Command, Stdio};

/// 在终端打印可扫描的 ASCII 二维码
pub fn print_qr(url: &str) {
    let code = match QrCode::new(url.as_bytes()) {
        Ok(code) => code,
        Err(e) => {
            warn!("Failed to render QR code: {}", e);
            return;
        }
    };

    // 反色渲染，深色终端里扫码成功率更高
    let image = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    println!("\n{}", "=".repeat(40));
    println!("Scan this QR code to upload files:\n{}", url);
    println!("{}\n", "=".repeat(40));
    println!("{}", image);
    println!("\n{}\n", "=".repeat(40));
}

/// 把 URL 写进系统剪贴板
///
/// macOS 用 pbcopy，Linux 依次尝试 wl-copy / xclip。
pub fn copy_to_clipboard(text: &str) -> bool {
    #[cfg(target_os = "macos")]
    let candidates: &[(&str, &[&str])] = &[("pbcopy", &[])];

    #[cfg(not(target_os = "macos"))]
    let candidates: &[(&str, &[&str])] =
        &[("wl-copy", &[]), ("xclip", &["-selection", "clipboard"])];

    for (program, args) in candidates {
        let child = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let Ok(mut child) = child else { continue };
        let wrote = child
            .stdin
            .take()
            .and_then(|mut stdin| stdin.write_all(text.as_bytes()).ok())
            .is_some();
        if wrote && child.wait().map(|s| s.success()).unwrap_or(false) {
            debug!("Copied URL via {}", program);
            return true;
        }
    }
    false
}

/// 在默认浏览器里打开 URL
pub fn open_in_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let program = "open";
    #[cfg(not(target_os = "macos"))]
    let program = "xdg-open";

    if let Err(e) = Command::new(program)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        warn!("Failed to open browser: {}", e);
    }
}
