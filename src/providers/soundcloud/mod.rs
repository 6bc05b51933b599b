//! 此模块实现了与 SoundCloud 平台进行交互的 `Provider`。
//!
//! SoundCloud 没有公开 API Key，所有请求都挂着一个从前端资源里
//! 抓出来的滚动 Client ID（见 [`crate::credentials`]）。
//! 拉流要走三步：曲目元数据 → 选 progressive（否则 HLS）转码 →
//! 请求中间 URL 拿到最终文件地址。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    credentials::ClientIdCache,
    error::{AggregatorError, Result},
    model::track::{RelayFallback, StreamPlan, StreamTarget, TrackRecord, UNKNOWN_ARTIST},
    providers::Provider,
};

pub mod models;
use models::{ApiTrack, ChartsResponse, SearchResponse, StreamInfo};

const API_BASE: &str = "https://api-v2.soundcloud.com";
const SEARCH_TIMEOUT: Duration = Duration::from_millis(4500);
const SEARCH_LIMIT: u32 = 20;
const TRENDING_LIMIT: u32 = 30;

/// 短于 60 秒的音频基本都是试听片段，直接过滤。
const MIN_DURATION_MS: u64 = 60_000;

/// SoundCloud 的 Provider 实现。
pub struct SoundCloud {
    http_client: Client,
    credentials: Arc<ClientIdCache>,
    api_base: String,
}

impl SoundCloud {
    /// 创建一个新的 SoundCloud 提供商实例。
    ///
    /// # 参数
    /// * `credentials` - 进程级共享的滚动凭据缓存。
    pub fn new(credentials: Arc<ClientIdCache>) -> Result<Self> {
        let http_client = Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            credentials,
            api_base: API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base;
        self
    }

    fn map_tracks(&self, tracks: Vec<ApiTrack>) -> Vec<TrackRecord> {
        tracks
            .into_iter()
            .filter(|t| t.duration.unwrap_or(0) > MIN_DURATION_MS)
            .filter_map(to_record)
            .filter(TrackRecord::is_valid)
            .collect()
    }
}

/// 把 "large" 档封面换成 500x500 高清档。
fn upscale_artwork(url: &str) -> String {
    url.replace("large", "t500x500")
}

fn to_record(track: ApiTrack) -> Option<TrackRecord> {
    let title = track.title?;
    let artwork = track
        .artwork_url
        .as_deref()
        .or(track.user.as_ref().and_then(|u| u.avatar_url.as_deref()))
        .map(upscale_artwork);
    let artist = track
        .user
        .as_ref()
        .and_then(|u| u.username.clone())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    Some(TrackRecord {
        source: "soundcloud".to_string(),
        id: track.id.to_string(),
        title,
        artist,
        artwork,
        duration_seconds: track.duration.map(|ms| ms / 1000),
        stream_url: format!("/soundcloud/stream/{}", track.id),
        plays: track.playback_count,
        genre: track.genre,
        ..Default::default()
    })
}

#[async_trait]
impl Provider for SoundCloud {
    fn name(&self) -> &'static str {
        "soundcloud"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let client_id = self.credentials.get_client_id().await;
        let response: SearchResponse = self
            .http_client
            .get(format!("{}/search/tracks", self.api_base))
            .query(&[
                ("q", query),
                ("client_id", &client_id),
                ("limit", &SEARCH_LIMIT.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(self.map_tracks(response.collection))
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Id(id) = target else {
            return Err(AggregatorError::StreamNotFound(
                "SoundCloud 的流必须通过曲目 ID 解析".to_string(),
            ));
        };

        let client_id = self.credentials.get_client_id().await;
        let track: ApiTrack = self
            .http_client
            .get(format!("{}/tracks/{id}", self.api_base))
            .query(&[("client_id", client_id.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let transcodings = track
            .media
            .map(|m| m.transcodings)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AggregatorError::StreamNotFound(format!("曲目 {id} 不可拉流")))?;

        // progressive 可以直接顺序播放，优先；没有再退 HLS
        let chosen = transcodings
            .iter()
            .find(|t| t.format.protocol == "progressive")
            .or_else(|| transcodings.iter().find(|t| t.format.protocol == "hls"))
            .ok_or_else(|| {
                AggregatorError::StreamNotFound(format!("曲目 {id} 没有兼容的转码格式"))
            })?;

        let stream_info: StreamInfo = self
            .http_client
            .get(&chosen.url)
            .query(&[("client_id", client_id.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(StreamPlan::Relay {
            url: stream_info.url,
            on_failure: RelayFallback::Error,
        })
    }

    async fn trending(&self) -> Result<Vec<TrackRecord>> {
        let client_id = self.credentials.get_client_id().await;
        let response: ChartsResponse = self
            .http_client
            .get(format!("{}/charts", self.api_base))
            .query(&[
                ("kind", "top"),
                ("genre", "soundcloud:genres:all-music"),
                ("client_id", &client_id),
                ("limit", &TRENDING_LIMIT.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let tracks = response
            .collection
            .into_iter()
            .filter_map(|item| item.track)
            .collect();
        Ok(self.map_tracks(tracks))
    }
}
