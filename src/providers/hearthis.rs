//! HearThis.at 平台适配器。
//!
//! 搜索响应里每条曲目都带现成的 `stream_url` 直链，因此把直链
//! 编码进 `streamUrl`，取流时按 URL 中继，失败则重定向到直链。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AggregatorError, Result},
    model::track::{RelayFallback, StreamPlan, StreamTarget, TrackRecord, UNKNOWN_ARTIST},
    providers::Provider,
};

const API_BASE: &str = "https://api-v2.hearthis.at";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const SEARCH_COUNT: u32 = 20;

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    user: Option<ApiUser>,
    #[serde(default)]
    artwork_url: Option<String>,
    #[serde(default)]
    thumb: Option<String>,
    /// HearThis 把时长作为字符串返回。
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    playback_count: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    stream_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    #[serde(default)]
    username: Option<String>,
}

/// HearThis.at 音乐源。
pub struct HearThis {
    http_client: reqwest::Client,
    api_base: String,
}

impl HearThis {
    /// 创建一个新的 HearThis 实例。
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            api_base: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_base(http_client: reqwest::Client, api_base: String) -> Self {
        Self {
            http_client,
            api_base,
        }
    }
}

fn to_record(track: ApiTrack) -> Option<TrackRecord> {
    let upstream = track.stream_url?;

    Some(TrackRecord {
        source: "hearthis".to_string(),
        id: track.id,
        title: track.title.unwrap_or_default(),
        artist: track
            .user
            .and_then(|u| u.username)
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        artwork: track.artwork_url.or(track.thumb),
        duration_seconds: track.duration.and_then(|d| d.parse().ok()),
        stream_url: format!("/hearthis/stream?url={}", urlencoding::encode(&upstream)),
        plays: track.playback_count.and_then(|p| p.parse().ok()),
        genre: track.genre,
        album: None,
        year: None,
    })
}

#[async_trait]
impl Provider for HearThis {
    fn name(&self) -> &'static str {
        "hearthis"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/search?t={}&count={SEARCH_COUNT}",
            self.api_base,
            urlencoding::encode(query)
        );

        let tracks: Vec<ApiTrack> = self
            .http_client
            .get(&url)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("[HEARTHIS] 拉取到 {} 条原始曲目", tracks.len());

        Ok(tracks
            .into_iter()
            .filter_map(to_record)
            .filter(TrackRecord::is_valid)
            .collect())
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Url(url) = target else {
            return Err(AggregatorError::StreamNotFound(
                "HearThis 只支持按直链 URL 取流".to_string(),
            ));
        };
        Ok(StreamPlan::Relay {
            url: url.clone(),
            on_failure: RelayFallback::Redirect,
        })
    }
}
