//! YouTube 适配器（经 Piped / Cobalt 公共代理）。
//!
//! 直连 YouTube 基本拿不到数据，搜索走社区维护的 Piped 实例，
//! 挨个试直到有结果；取流先问 Cobalt（成功率最高），不行再回落
//! 到 Piped 的 `streams` 端点。两者给出的都是外部直链，方案
//! 始终是重定向。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    error::{AggregatorError, Result},
    model::track::{StreamPlan, StreamTarget, TrackRecord, UNKNOWN_ARTIST},
    providers::Provider,
};

/// 取流成功率较高的 Cobalt 实例。
const COBALT_INSTANCES: &[&str] = &[
    "https://api.cobalt.tools",
    "https://co.wuk.sh",
    "https://cobalt.res.yafs.net",
];

/// 轮换使用的 Piped 实例。
const PIPED_INSTANCES: &[&str] = &[
    "https://api.piped.private.coffee",
    "https://pipedapi.kavin.rocks",
    "https://pipedapi.adminforge.de",
    "https://api.piped.yt",
    "https://pipedapi.nosebs.ru",
];

/// 单个 Piped 实例的搜索预算，超时立刻换下一个。
const SEARCH_TIMEOUT: Duration = Duration::from_millis(2500);
const COBALT_TIMEOUT: Duration = Duration::from_secs(5);
const STREAMS_TIMEOUT: Duration = Duration::from_secs(4);

const DEFAULT_QUALITY: &str = "720p";

#[derive(Debug, Deserialize)]
struct PipedSearchResponse {
    #[serde(default)]
    items: Option<Vec<PipedSearchItem>>,
    /// 部分旧版实例用 `streams` 作为字段名。
    #[serde(default)]
    streams: Option<Vec<PipedSearchItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedSearchItem {
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader_name: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CobaltResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    picker: Option<Vec<CobaltPickerItem>>,
}

#[derive(Debug, Deserialize)]
struct CobaltPickerItem {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedStreamsResponse {
    #[serde(default)]
    video_streams: Vec<PipedStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedStream {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    video_only: bool,
}

/// `/watch?v=xxx` 形式的站内路径里抠出视频 ID；新版实例直接给 `id`。
fn item_video_id(item: &PipedSearchItem) -> Option<String> {
    if let Some(url) = &item.url
        && let Some(id) = url.split("v=").nth(1)
    {
        return Some(id.to_string());
    }
    item.id.clone()
}

/// 从 Piped 的视频流列表里挑地址：先找指定档位的 mp4，
/// 再按 1080p、720p 找带音轨的流，最后退回列表第一个。
fn pick_video_stream(streams: &[PipedStream], quality: &str) -> Option<String> {
    let exact = streams.iter().find(|s| {
        s.quality.as_deref() == Some(quality)
            || (s.quality.as_deref().is_some_and(|q| q.contains(quality))
                && s.format.as_deref() == Some("mp4"))
    });
    let with_audio =
        |q: &str| streams.iter().find(|s| s.quality.as_deref() == Some(q) && !s.video_only);

    exact
        .or_else(|| with_audio("1080p"))
        .or_else(|| with_audio(DEFAULT_QUALITY))
        .or_else(|| streams.first())
        .and_then(|s| s.url.clone())
}

fn to_record(item: PipedSearchItem) -> Option<TrackRecord> {
    let id = item_video_id(&item)?;

    Some(TrackRecord {
        source: "youtube".to_string(),
        id: id.clone(),
        title: item.title.unwrap_or_default(),
        artist: item
            .uploader_name
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        artwork: item.thumbnail,
        duration_seconds: item.duration.and_then(|d| u64::try_from(d).ok()),
        stream_url: format!("/stream/{id}"),
        plays: None,
        genre: None,
        album: None,
        year: None,
    })
}

/// YouTube 视频源。
pub struct YouTube {
    http_client: reqwest::Client,
    cobalt_instances: Vec<String>,
    piped_instances: Vec<String>,
}

impl YouTube {
    /// 创建一个新的 YouTube 实例。
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            cobalt_instances: COBALT_INSTANCES.iter().map(|s| s.to_string()).collect(),
            piped_instances: PIPED_INSTANCES.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[cfg(test)]
    fn with_instances(
        http_client: reqwest::Client,
        cobalt_instances: Vec<String>,
        piped_instances: Vec<String>,
    ) -> Self {
        Self {
            http_client,
            cobalt_instances,
            piped_instances,
        }
    }

    async fn try_cobalt(&self, id: &str) -> Option<String> {
        for api in &self.cobalt_instances {
            let request = self
                .http_client
                .post(format!("{api}/api/json"))
                .header(reqwest::header::ACCEPT, "application/json")
                .json(&json!({
                    "url": format!("https://www.youtube.com/watch?v={id}"),
                    "vCodec": "h264",
                    "vQuality": DEFAULT_QUALITY.trim_end_matches('p'),
                    "aFormat": "mp3",
                    "isAudioOnly": false,
                }))
                .timeout(COBALT_TIMEOUT);

            let Ok(response) = request.send().await else {
                continue;
            };
            let Ok(body) = response.json::<CobaltResponse>().await else {
                continue;
            };

            let link = body
                .url
                .or_else(|| body.picker.and_then(|p| p.into_iter().next()).and_then(|i| i.url));
            if let Some(link) = link {
                debug!("[YOUTUBE] Cobalt 实例 {api} 解析成功");
                return Some(link);
            }
        }
        None
    }

    async fn try_piped_streams(&self, id: &str) -> Option<String> {
        for instance in &self.piped_instances {
            let Ok(response) = self
                .http_client
                .get(format!("{instance}/streams/{id}"))
                .timeout(STREAMS_TIMEOUT)
                .send()
                .await
            else {
                continue;
            };
            let Ok(body) = response.json::<PipedStreamsResponse>().await else {
                continue;
            };

            if let Some(url) = pick_video_stream(&body.video_streams, DEFAULT_QUALITY) {
                debug!("[YOUTUBE] Piped 实例 {instance} 解析成功");
                return Some(url);
            }
        }
        None
    }
}

#[async_trait]
impl Provider for YouTube {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        for instance in &self.piped_instances {
            let request = self
                .http_client
                .get(format!(
                    "{instance}/search?q={}&filter=music_videos",
                    urlencoding::encode(query)
                ))
                .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
                .timeout(SEARCH_TIMEOUT);

            let Ok(response) = request.send().await else {
                continue;
            };
            let Ok(body) = response.json::<PipedSearchResponse>().await else {
                continue;
            };

            let items = body.items.or(body.streams).unwrap_or_default();
            if items.is_empty() {
                continue;
            }

            debug!("[YOUTUBE] 实例 {instance} 返回 {} 条结果", items.len());
            return Ok(items
                .into_iter()
                .filter(|i| i.r#type.as_deref() == Some("stream"))
                .filter_map(to_record)
                .filter(TrackRecord::is_valid)
                .collect());
        }

        warn!("[YOUTUBE] 所有 Piped 实例都不可用，返回空结果");
        Ok(Vec::new())
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Id(id) = target else {
            return Err(AggregatorError::StreamNotFound(
                "YouTube 只支持按视频 ID 取流".to_string(),
            ));
        };

        if let Some(url) = self.try_cobalt(id).await {
            return Ok(StreamPlan::Redirect { url });
        }
        if let Some(url) = self.try_piped_streams(id).await {
            return Ok(StreamPlan::Redirect { url });
        }

        Err(AggregatorError::StreamNotFound(format!(
            "所有解析渠道都无法抽取 YouTube 视频 {id}"
        )))
    }
}
