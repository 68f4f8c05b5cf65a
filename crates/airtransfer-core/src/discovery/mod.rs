//! 局域网地址探测与端口分配
//!
//! 启动时各执行一次，得出要广播给手机端的 `(scheme, ip, port)`。
//!
//! # 策略
//!
//! - IP: 枚举网卡，优先返回私有网段地址（10/8、172.16/12、192.168/16），
//!   避免把 VPN / 公网地址放进二维码导致局域网设备连不上
//! - 端口: 在 `[start, end]` 区间内逐个试绑定，返回第一个可用端口
//!
//! 两者都不会失败：探测全部落空时退回 127.0.0.1 / start 端口，
//! 由真正的 listen 阶段给出明确的错误。

use get_if_addrs::{IfAddr, get_if_addrs};
use log::{debug, warn};
use std::net::{IpAddr, Ipv4Addr, TcpListener, UdpSocket};

/// 判断是否为 RFC 1918 私有地址
fn is_private_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    match octets[0] {
        10 => true,
        172 => (16..=31).contains(&octets[1]),
        192 => octets[1] == 168,
        _ => false,
    }
}

/// 解析本机在局域网内可达的 IPv4 地址
///
/// 永不失败：网卡枚举 → UDP 源地址探测 → 127.0.0.1 逐级回退。
pub fn get_ip_address() -> IpAddr {
    // 枚举网卡，跳过回环，取第一个私有网段地址
    match get_if_addrs() {
        Ok(interfaces) => {
            for iface in &interfaces {
                if iface.is_loopback() {
                    continue;
                }
                if let IfAddr::V4(v4) = &iface.addr
                    && is_private_v4(v4.ip)
                {
                    debug!("LAN address {} from interface {}", v4.ip, iface.name);
                    return IpAddr::V4(v4.ip);
                }
            }
        }
        Err(e) => {
            warn!("Interface enumeration failed: {}", e);
        }
    }

    // 回退：向公网地址"连接"一个 UDP socket（不发包），
    // 读取内核选择的源地址。无需联网、无需特权。
    if let Some(ip) = source_address_probe() {
        debug!("LAN address {} via UDP source probe", ip);
        return ip;
    }

    warn!("No LAN address found, falling back to loopback");
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn source_address_probe() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("1.1.1.1:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// 在 `[start_port, end_port]` 内找一个可绑定的 TCP 端口
///
/// 探测-释放-再绑定天然有竞态（别的进程可能抢走端口），对单用户
/// 本地工具可接受；真正 listen 时的 "address in use" 仍按启动错误处理。
pub fn find_open_port(host: IpAddr, start_port: u16, end_port: u16) -> u16 {
    for port in start_port..=end_port {
        match TcpListener::bind((host, port)) {
            Ok(_) => {
                debug!("Port {} is available", port);
                return port;
            }
            Err(_) => continue,
        }
    }
    warn!(
        "No free port in {}-{}, falling back to {}",
        start_port, end_port, start_port
    );
    start_port
}

/// 拼出要广播的 URL
pub fn build_url(use_https: bool, ip: &str, port: u16) -> String {
    let scheme = if use_https { "https" } else { "http" };
    format!("{}://{}:{}", scheme, ip, port)
}
