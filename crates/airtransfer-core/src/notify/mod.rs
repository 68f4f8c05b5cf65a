//! 通知回调接口
//!
//! 端点在每个文件保存成功后调用 `notify`，用于桌面横幅 + 提示音。
//! 实现方必须 fire-and-forget：HTTP 响应不等通知送达，
//! 通知失败只记日志，绝不冒泡到上传方。

use log::{info, warn};
use tokio::process::Command;

/// 通知接收方
///
/// 注入到 `TransferEndpoint`，默认 `NoopNotifier` 以支持无头运行。
pub trait NotificationSink: Send + Sync {
    /// 发送一条通知，不允许阻塞调用方
    fn notify(&self, title: &str, body: &str);
}

/// 无操作实现（无头 / 测试场景）
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, _title: &str, _body: &str) {}
}

/// 桌面通知实现
///
/// 通过系统命令发横幅（macOS: osascript，Linux: notify-send）并播放
/// 提示音。所有调用都在独立任务里执行，错误记日志后吞掉。
pub struct DesktopNotifier {
    /// 是否随通知播放提示音
    pub sound: bool,
}

impl DesktopNotifier {
    pub fn new(sound: bool) -> Self {
        Self { sound }
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!("Notification: {} - {}", title, body);

        let title = title.to_string();
        let body = body.to_string();
        let sound = self.sound;

        tokio::spawn(async move {
            if let Err(e) = send_banner(&title, &body).await {
                warn!("Notification error: {}", e);
            }
            if sound {
                play_alert_sound();
            }
        });
    }
}

#[cfg(target_os = "macos")]
async fn send_banner(title: &str, body: &str) -> std::io::Result<()> {
    let script = format!(
        "display notification \"{}\" with title \"AirTransfer\" subtitle \"{}\"",
        body.replace('"', "'"),
        title.replace('"', "'"),
    );
    Command::new("osascript").arg("-e").arg(script).status().await?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
async fn send_banner(title: &str, body: &str) -> std::io::Result<()> {
    Command::new("notify-send")
        .arg("--app-name=AirTransfer")
        .arg(title)
        .arg(body)
        .status()
        .await?;
    Ok(())
}

/// 播放短提示音，找不到播放器就算了
fn play_alert_sound() {
    #[cfg(target_os = "macos")]
    let candidates: &[(&str, &[&str])] =
        &[("afplay", &["/System/Library/Sounds/Glass.aiff"])];

    #[cfg(not(target_os = "macos"))]
    let candidates: &[(&str, &[&str])] = &[
        ("paplay", &["/usr/share/sounds/freedesktop/stereo/complete.oga"]),
        ("canberra-gtk-play", &["-i", "complete"]),
    ];

    for (program, args) in candidates {
        match Command::new(program).args(*args).spawn() {
            Ok(_) => return,
            Err(_) => continue,
        }
    }
    warn!("No audio player available for the alert sound");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_notifier_is_silent() {
        // 只要不 panic 即可，无头模式的兜底
        NoopNotifier.notify("File Received", "photo.jpg");
    }
}
