//! Audius Discovery API 的响应模型。

use serde::Deserialize;

/// Audius 的标准包裹：`{ "data": [...] }`。
#[derive(Debug, Deserialize)]
pub struct DataResponse {
    /// 曲目列表，出错时可能整个缺失。
    #[serde(default)]
    pub data: Option<Vec<ApiTrack>>,
}

/// 一条曲目的原始数据。
#[derive(Debug, Deserialize)]
pub struct ApiTrack {
    /// 平台 ID（字符串形式）。
    pub id: String,
    /// 标题。
    #[serde(default)]
    pub title: Option<String>,
    /// 时长（秒）。
    #[serde(default)]
    pub duration: Option<u64>,
    /// 播放量。
    #[serde(default)]
    pub play_count: Option<u64>,
    /// 流派。
    #[serde(default)]
    pub genre: Option<String>,
    /// 各尺寸封面。
    #[serde(default)]
    pub artwork: Option<ApiArtwork>,
    /// 上传者。
    #[serde(default)]
    pub user: Option<ApiUser>,
}

/// 封面图集合。
#[derive(Debug, Deserialize)]
pub struct ApiArtwork {
    /// 480x480 档。
    #[serde(rename = "480x480", default)]
    pub large: Option<String>,
    /// 150x150 档。
    #[serde(rename = "150x150", default)]
    pub small: Option<String>,
}

/// 上传者信息。
#[derive(Debug, Deserialize)]
pub struct ApiUser {
    /// 显示名，作为艺术家名使用。
    #[serde(default)]
    pub name: Option<String>,
}
