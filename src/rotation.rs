//! 多镜像主机的顺序探活选择。
//!
//! Audius 的发现节点、Piped/Cobalt 的公共实例都是"一组互为镜像的
//! 主机，随时可能有几个挂掉"。这里按优先级顺序做轻量健康检查，
//! 返回第一个响应成功的主机；全部失败时无条件退回第一个默认主机，
//! 由调用方容忍它可能不健康。这只是顺序取先，不是负载均衡：
//! 没有权重，也不在请求之间保留熔断状态。

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

/// 每个主机健康检查的超时。
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// 一组按优先级排列的候选主机。
pub struct HostPool {
    hosts: Vec<String>,
    health_path: String,
    probe_timeout: Duration,
}

impl HostPool {
    /// 创建一个主机池。
    ///
    /// # 参数
    /// * `hosts` - 按优先级排列的候选主机（含协议，不含尾随斜杠）。
    /// * `health_path` - 健康检查路径，例如 `"/health_check"`。
    pub fn new(hosts: Vec<String>, health_path: impl Into<String>) -> Self {
        Self {
            hosts,
            health_path: health_path.into(),
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// 覆盖默认的单主机探测超时（主要用于测试）。
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// 返回候选列表（测试和日志用）。
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// 依次探测各主机，返回第一个健康的；全部失败时返回默认主机。
    pub async fn first_healthy(&self, client: &Client) -> String {
        for host in &self.hosts {
            let url = format!("{host}{}", self.health_path);
            let probe = tokio::time::timeout(self.probe_timeout, client.get(&url).send()).await;
            match probe {
                Ok(Ok(response)) if response.status().is_success() => {
                    debug!("探活命中: {host}");
                    return host.clone();
                }
                _ => {
                    debug!("主机 {host} 探活失败，尝试下一个");
                    continue;
                }
            }
        }

        let fallback = self.hosts.first().cloned().unwrap_or_default();
        warn!("所有候选主机探活失败，退回默认主机 {fallback}");
        fallback
    }
}
