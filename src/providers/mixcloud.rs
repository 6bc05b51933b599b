//! Mixcloud 平台适配器。
//!
//! Mixcloud 的音频走其私有播放器，拿不到可中继的直链，所以这里
//! 只做搜索：`streamUrl` 直接给出外部网页链接，交由客户端打开。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AggregatorError, Result},
    model::track::{StreamPlan, StreamTarget, TrackRecord, UNKNOWN_ARTIST},
    providers::Provider,
};

const API_BASE: &str = "https://api.mixcloud.com";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const SEARCH_LIMIT: u32 = 30;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ApiCloudcast>,
}

#[derive(Debug, Deserialize)]
struct ApiCloudcast {
    /// 形如 `/spartacus/party-time/` 的站内路径。
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    user: Option<ApiUser>,
    #[serde(default)]
    pictures: Option<ApiPictures>,
    #[serde(default)]
    audio_length: Option<u64>,
    #[serde(default)]
    play_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPictures {
    #[serde(default)]
    large: Option<String>,
    #[serde(default)]
    medium: Option<String>,
}

/// Mixcloud 音乐源（仅搜索）。
pub struct Mixcloud {
    http_client: reqwest::Client,
    api_base: String,
}

impl Mixcloud {
    /// 创建一个新的 Mixcloud 实例。
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

fn to_record(cast: ApiCloudcast) -> Option<TrackRecord> {
    let web_url = cast.url?;

    Some(TrackRecord {
        source: "mixcloud".to_string(),
        id: cast.key,
        title: cast.name.unwrap_or_default(),
        artist: cast
            .user
            .and_then(|u| u.name)
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        artwork: cast
            .pictures
            .and_then(|p| p.large.or(p.medium)),
        duration_seconds: cast.audio_length,
        stream_url: web_url,
        plays: cast.play_count,
        genre: Some("Mix/Set".to_string()),
        album: None,
        year: None,
    })
}

#[async_trait]
impl Provider for Mixcloud {
    fn name(&self) -> &'static str {
        "mixcloud"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/search/?q={}&type=cloudcast&limit={SEARCH_LIMIT}",
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

        debug!("[MIXCLOUD] 拉取到 {} 条原始条目", response.data.len());

        Ok(response
            .data
            .into_iter()
            .filter_map(to_record)
            .filter(TrackRecord::is_valid)
            .collect())
    }

    async fn resolve_stream(&self, _target: &StreamTarget) -> Result<StreamPlan> {
        Err(AggregatorError::NotSupported(self.name()))
    }
}
