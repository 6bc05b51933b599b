//! 定义了与聚合搜索和流媒体解析相关的核心数据结构。
//!
//! 这些结构体是所有 Provider 在获取到各自平台的数据后，
//! 需要转换成的目标标准格式。

use serde::{Deserialize, Serialize};

/// 代表一个标准化的曲目条目。
///
/// 这是所有 Provider 的 `search_tracks` 方法需要返回的类型。
/// 序列化为 camelCase，以便 HTTP 边界直接输出。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    /// 来源平台的名称 (例如, "soundcloud", "audius")。
    pub source: String,
    /// 在其所在平台的唯一 ID（对聚合器来说是不透明的）。
    pub id: String,
    /// 曲目标题。缺失标题的记录是无效的，不会被返回。
    pub title: String,
    /// 艺术家名称，未知时为占位文本。
    pub artist: String,
    /// 封面图片 URL。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,
    /// 曲目时长（秒）。`None` 表示未知，与 0 含义不同。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    /// 可直接被客户端消费的流地址：内部代理路径
    /// (`/{provider}/stream/...`) 或少数情况下的外部直链。
    pub stream_url: String,
    /// 播放量（平台相关，可能缺失）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plays: Option<u64>,
    /// 流派/标签（平台相关，可能缺失）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// 专辑名（平台相关，可能缺失）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// 发行年份（平台相关，可能缺失）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

/// 当艺术家信息缺失时使用的占位文本。
pub const UNKNOWN_ARTIST: &str = "未知艺术家";

impl TrackRecord {
    /// 一条记录只有同时具备标题和可解析的流地址才算有效。
    ///
    /// 无效记录由各 Provider 在返回前静默丢弃，不会到达聚合器。
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.stream_url.trim().is_empty()
    }
}

/// 代表一次流媒体请求的目标，对应两种端点形式：
/// `/{provider}/stream/{id}` 与 `/{provider}/stream?url=<encoded-url>`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// 平台内部的曲目 ID，由提供商自行解析为上游媒体地址。
    Id(String),
    /// 已经（百分号编码过的）上游媒体 URL，只需解码后中继。
    Url(String),
}

/// 中继失败时各提供商声明的回退策略。
///
/// 这是平台之间有意保留的差异（有些上游对 Range 请求支持差，
/// 宁可重定向），不应被统一掉。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFallback {
    /// 中继失败时把客户端重定向到上游直链。
    Redirect,
    /// 中继失败时返回结构化错误。
    Error,
}

/// 提供商解析流媒体后给出的执行计划。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPlan {
    /// 以代理方式中继上游字节流；失败时按 `on_failure` 回退。
    Relay {
        /// 已完全解析好的上游媒体 URL。
        url: String,
        /// 中继失败时的回退策略。
        on_failure: RelayFallback,
    },
    /// 不代理，直接把客户端重定向到上游地址
    /// (例如 Dailymotion 的 HLS 清单，需要客户端播放器自行处理)。
    Redirect {
        /// 重定向目标。
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_title_or_stream_is_invalid() {
        let mut record = TrackRecord {
            source: "soundcloud".to_string(),
            id: "1".to_string(),
            title: "Lofi Beats".to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            stream_url: "/soundcloud/stream/1".to_string(),
            ..Default::default()
        };
        assert!(record.is_valid());

        record.title = "  ".to_string();
        assert!(!record.is_valid());

        record.title = "Lofi Beats".to_string();
        record.stream_url = String::new();
        assert!(!record.is_valid());
    }

    #[test]
    fn test_record_serializes_camel_case_and_omits_unknowns() {
        let record = TrackRecord {
            source: "audius".to_string(),
            id: "abc".to_string(),
            title: "Chill Lofi".to_string(),
            artist: "Someone".to_string(),
            stream_url: "/audius/stream/abc".to_string(),
            duration_seconds: Some(183),
            ..Default::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["streamUrl"], "/audius/stream/abc");
        assert_eq!(json["durationSeconds"], 183);
        // 未知时长和 0 秒不同：缺失字段必须整个省略
        assert!(json.get("plays").is_none());
        assert!(json.get("artwork").is_none());
    }
}
