//! SoundCloud v2 API 的响应模型。

use serde::Deserialize;

/// `/search/tracks` 的响应。
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    /// 命中的曲目列表。
    #[serde(default)]
    pub collection: Vec<ApiTrack>,
}

/// `/charts` 的响应。
#[derive(Debug, Deserialize)]
pub struct ChartsResponse {
    /// 榜单条目列表。
    #[serde(default)]
    pub collection: Vec<ChartItem>,
}

/// 榜单条目，内嵌一条曲目。
#[derive(Debug, Deserialize)]
pub struct ChartItem {
    /// 被打榜的曲目。
    pub track: Option<ApiTrack>,
}

/// 一条曲目的原始数据。
#[derive(Debug, Deserialize)]
pub struct ApiTrack {
    /// 数字 ID。
    pub id: u64,
    /// 标题。
    #[serde(default)]
    pub title: Option<String>,
    /// 时长（毫秒）。
    #[serde(default)]
    pub duration: Option<u64>,
    /// 播放量。
    #[serde(default)]
    pub playback_count: Option<u64>,
    /// 流派。
    #[serde(default)]
    pub genre: Option<String>,
    /// 封面（"large" 档）。
    #[serde(default)]
    pub artwork_url: Option<String>,
    /// 上传者。
    #[serde(default)]
    pub user: Option<ApiUser>,
    /// 流媒体转码信息（仅详情接口返回）。
    #[serde(default)]
    pub media: Option<ApiMedia>,
}

/// 上传者信息。
#[derive(Debug, Deserialize)]
pub struct ApiUser {
    /// 用户名，作为艺术家名使用。
    #[serde(default)]
    pub username: Option<String>,
    /// 头像，封面缺失时的替补。
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// 曲目的转码清单。
#[derive(Debug, Deserialize)]
pub struct ApiMedia {
    /// 可用的转码列表。
    #[serde(default)]
    pub transcodings: Vec<ApiTranscoding>,
}

/// 单个转码条目。
#[derive(Debug, Deserialize)]
pub struct ApiTranscoding {
    /// 获取实际流地址的中间 URL。
    pub url: String,
    /// 格式信息。
    pub format: ApiTranscodingFormat,
}

/// 转码格式。
#[derive(Debug, Deserialize)]
pub struct ApiTranscodingFormat {
    /// 协议："progressive" 或 "hls"。
    pub protocol: String,
}

/// 中间 URL 的响应，包含最终的流地址。
#[derive(Debug, Deserialize)]
pub struct StreamInfo {
    /// 最终可拉流的 URL。
    pub url: String,
}
