//! Dailymotion 平台适配器。
//!
//! 搜索走公开的 REST API；取流要查内部播放器的 metadata 端点，
//! 从 `qualities` 里挑 HLS 清单地址。HLS 无法按普通文件中继，
//! 所以取流方案始终是重定向，交给支持 HLS 的播放器处理。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AggregatorError, Result},
    model::track::{StreamPlan, StreamTarget, TrackRecord},
    providers::Provider,
};

const API_BASE: &str = "https://api.dailymotion.com";
const PLAYER_BASE: &str = "https://www.dailymotion.com";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const SEARCH_LIMIT: u32 = 15;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    list: Vec<ApiVideo>,
}

#[derive(Debug, Deserialize)]
struct ApiVideo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    views_total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PlayerMetadata {
    #[serde(default)]
    qualities: Option<HashMap<String, Vec<QualityEntry>>>,
}

#[derive(Debug, Deserialize)]
struct QualityEntry {
    #[serde(default)]
    url: Option<String>,
}

/// 从播放器 metadata 的 `qualities` 里挑出流地址：
/// `auto`（HLS 主清单）优先，否则取数字分辨率最高的一档。
fn pick_quality_url(qualities: &HashMap<String, Vec<QualityEntry>>) -> Option<String> {
    if let Some(url) = qualities
        .get("auto")
        .and_then(|entries| entries.first())
        .and_then(|e| e.url.clone())
    {
        return Some(url);
    }

    let mut resolutions: Vec<u32> = qualities
        .keys()
        .filter_map(|k| k.parse().ok())
        .collect();
    resolutions.sort_unstable_by(|a, b| b.cmp(a));

    resolutions.into_iter().find_map(|res| {
        qualities
            .get(&res.to_string())
            .and_then(|entries| entries.first())
            .and_then(|e| e.url.clone())
    })
}

/// Dailymotion 视频源。
pub struct Dailymotion {
    http_client: reqwest::Client,
    api_base: String,
    player_base: String,
}

impl Dailymotion {
    /// 创建一个新的 Dailymotion 实例。
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            api_base: API_BASE.to_string(),
            player_base: PLAYER_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_bases(http_client: reqwest::Client, base: String) -> Self {
        Self {
            http_client,
            api_base: base.clone(),
            player_base: base,
        }
    }
}

fn to_record(video: ApiVideo) -> TrackRecord {
    TrackRecord {
        source: "dailymotion".to_string(),
        id: video.id.clone(),
        title: video.title.unwrap_or_default(),
        artist: video.owner.unwrap_or_else(|| "Dailymotion".to_string()),
        artwork: video.thumbnail_url,
        duration_seconds: video.duration,
        stream_url: format!("/dailymotion/stream/{}", video.id),
        plays: video.views_total,
        genre: Some("Video/Clip".to_string()),
        album: None,
        year: None,
    }
}

#[async_trait]
impl Provider for Dailymotion {
    fn name(&self) -> &'static str {
        "dailymotion"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/videos?search={}&fields=id,title,owner,duration,thumbnail_url,views_total&limit={SEARCH_LIMIT}&sort=relevance",
            self.api_base,
            urlencoding::encode(query)
        );

        let response: SearchResponse = self
            .http_client
            .get(&url)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("[DAILYMOTION] 拉取到 {} 条原始视频", response.list.len());

        Ok(response
            .list
            .into_iter()
            .map(to_record)
            .filter(TrackRecord::is_valid)
            .collect())
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Id(id) = target else {
            return Err(AggregatorError::StreamNotFound(
                "Dailymotion 只支持按视频 ID 取流".to_string(),
            ));
        };

        let metadata: PlayerMetadata = self
            .http_client
            .get(format!("{}/player/metadata/video/{id}", self.player_base))
            .timeout(METADATA_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let qualities = metadata.qualities.ok_or_else(|| {
            AggregatorError::StreamNotFound(format!("Dailymotion 视频 {id} 没有可用流"))
        })?;
        let url = pick_quality_url(&qualities).ok_or_else(|| {
            AggregatorError::StreamNotFound(format!("Dailymotion 视频 {id} 找不到流地址"))
        })?;

        Ok(StreamPlan::Redirect { url })
    }
}
