//! Audius 平台适配器。
//!
//! Audius 没有固定的 API 域名，而是由社区运营的一组发现节点
//! （discovery node）提供服务，节点会不定期下线。因此每次请求前
//! 先用 [`HostPool`] 探活，选出一个可用节点。

mod models;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::{AggregatorError, Result},
    model::track::{RelayFallback, StreamPlan, StreamTarget, TrackRecord, UNKNOWN_ARTIST},
    providers::Provider,
    rotation::HostPool,
};

use models::{ApiTrack, DataResponse};

/// 公开的发现节点列表。
const DISCOVERY_NODES: &[&str] = &[
    "https://discoveryprovider.audius.co",
    "https://discoveryprovider2.audius.co",
    "https://discoveryprovider3.audius.co",
    "https://audius-dp.delhi.creatorseed.com",
];

/// 探活路径，返回 200 即认为节点可用。
const HEALTH_PATH: &str = "/health_check";

/// Audius API 要求携带的应用标识。
const APP_NAME: &str = "music-aggregator";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(4);
const SEARCH_LIMIT: u32 = 15;
const TRENDING_LIMIT: u32 = 30;

/// Audius 音乐源。
pub struct Audius {
    http_client: reqwest::Client,
    hosts: HostPool,
}

impl Audius {
    /// 创建一个新的 Audius 实例。
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            hosts: HostPool::new(
                DISCOVERY_NODES.iter().map(|h| h.to_string()).collect(),
                HEALTH_PATH,
            ),
        }
    }

    #[cfg(test)]
    fn with_hosts(http_client: reqwest::Client, hosts: Vec<String>) -> Self {
        Self {
            http_client,
            hosts: HostPool::new(hosts, HEALTH_PATH),
        }
    }

    async fn fetch_tracks(&self, url: &str) -> Result<Vec<TrackRecord>> {
        let response: DataResponse = self
            .http_client
            .get(url)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let tracks = response.data.unwrap_or_default();
        debug!("[AUDIUS] 拉取到 {} 条原始曲目", tracks.len());

        Ok(tracks
            .into_iter()
            .map(to_record)
            .filter(TrackRecord::is_valid)
            .collect())
    }
}

fn to_record(track: ApiTrack) -> TrackRecord {
    let artwork = track
        .artwork
        .as_ref()
        .and_then(|a| a.large.clone().or_else(|| a.small.clone()));
    let artist = track
        .user
        .as_ref()
        .and_then(|u| u.name.clone())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    TrackRecord {
        source: "audius".to_string(),
        id: track.id.clone(),
        title: track.title.unwrap_or_default(),
        artist,
        artwork,
        duration_seconds: track.duration,
        stream_url: format!("/audius/stream/{}", track.id),
        plays: track.play_count,
        genre: track.genre,
        album: None,
        year: None,
    }
}

#[async_trait]
impl Provider for Audius {
    fn name(&self) -> &'static str {
        "audius"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let host = self.hosts.first_healthy(&self.http_client).await;
        let url = format!(
            "{host}/v1/tracks/search?query={}&limit={SEARCH_LIMIT}&app_name={APP_NAME}",
            urlencoding::encode(query)
        );
        self.fetch_tracks(&url).await
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Id(id) = target else {
            return Err(AggregatorError::StreamNotFound(
                "Audius 只支持按曲目 ID 取流".to_string(),
            ));
        };
        let host = self.hosts.first_healthy(&self.http_client).await;
        Ok(StreamPlan::Relay {
            url: format!("{host}/v1/tracks/{id}/stream?app_name={APP_NAME}"),
            on_failure: RelayFallback::Error,
        })
    }

    async fn trending(&self) -> Result<Vec<TrackRecord>> {
        let host = self.hosts.first_healthy(&self.http_client).await;
        let url = format!(
            "{host}/v1/tracks/trending?limit={TRENDING_LIMIT}&time=week&app_name={APP_NAME}"
        );
        self.fetch_tracks(&url).await
    }
}
