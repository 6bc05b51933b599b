//! Jamendo 平台适配器。
//!
//! Jamendo 提供正式的公开 API，使用官方示例中的公共 client_id 即可
//! 访问。取流地址由 `tracks/file` 端点按模板拼出，无需额外解析。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AggregatorError, Result},
    model::track::{RelayFallback, StreamPlan, StreamTarget, TrackRecord, UNKNOWN_ARTIST},
    providers::Provider,
};

/// Jamendo 官方示例使用的公共客户端 ID。
const CLIENT_ID: &str = "c9720322";

const API_BASE: &str = "https://api.jamendo.com/v3.0";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const PAGE_LIMIT: u32 = 30;

#[derive(Debug, Deserialize)]
struct TracksResponse {
    #[serde(default)]
    results: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    album_image: Option<String>,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    stats: Option<ApiStats>,
    #[serde(default)]
    musicinfo: Option<ApiMusicInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiStats {
    /// Jamendo 以下载量衡量热度。
    #[serde(default)]
    rate_downloads_total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiMusicInfo {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Jamendo 音乐源。
pub struct Jamendo {
    http_client: reqwest::Client,
    api_base: String,
}

impl Jamendo {
    /// 创建一个新的 Jamendo 实例。
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

    async fn fetch_tracks(&self, url: &str) -> Result<Vec<TrackRecord>> {
        let response: TracksResponse = self
            .http_client
            .get(url)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("[JAMENDO] 拉取到 {} 条原始曲目", response.results.len());

        Ok(response
            .results
            .into_iter()
            .map(to_record)
            .filter(TrackRecord::is_valid)
            .collect())
    }
}

fn to_record(track: ApiTrack) -> TrackRecord {
    let genre = track
        .musicinfo
        .and_then(|info| info.tags)
        .filter(|tags| !tags.is_empty())
        .map(|tags| tags.join(", "));

    TrackRecord {
        source: "jamendo".to_string(),
        id: track.id.clone(),
        title: track.name.unwrap_or_default(),
        artist: track
            .artist_name
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        artwork: track.album_image,
        duration_seconds: track.duration,
        stream_url: format!("/jamendo/stream/{}", track.id),
        plays: track.stats.and_then(|s| s.rate_downloads_total),
        genre,
        album: None,
        year: None,
    }
}

#[async_trait]
impl Provider for Jamendo {
    fn name(&self) -> &'static str {
        "jamendo"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/tracks/?client_id={CLIENT_ID}&format=json&limit={PAGE_LIMIT}&search={}&include=musicinfo",
            self.api_base,
            urlencoding::encode(query)
        );
        self.fetch_tracks(&url).await
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Id(id) = target else {
            return Err(AggregatorError::StreamNotFound(
                "Jamendo 只支持按曲目 ID 取流".to_string(),
            ));
        };
        Ok(StreamPlan::Relay {
            url: format!(
                "{}/tracks/file/?client_id={CLIENT_ID}&id={id}&action=stream",
                self.api_base
            ),
            on_failure: RelayFallback::Error,
        })
    }

    async fn trending(&self) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/tracks/?client_id={CLIENT_ID}&format=json&limit={PAGE_LIMIT}&order=popularity_week&include=musicinfo",
            self.api_base
        );
        self.fetch_tracks(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_joins_genre_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tracks/"))
            .and(query_param("search", "piano"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "id": "168",
                    "name": "Morning Keys",
                    "artist_name": "Elo",
                    "album_image": "https://img/capa.jpg",
                    "duration": 201,
                    "stats": { "rate_downloads_total": 77 },
                    "musicinfo": { "tags": ["classical", "piano"] }
                }]
            })))
            .mount(&server)
            .await;

        let jamendo = Jamendo::with_api_base(reqwest::Client::new(), server.uri());
        let records = jamendo.search_tracks("piano").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].genre.as_deref(), Some("classical, piano"));
        assert_eq!(records[0].plays, Some(77));
        assert_eq!(records[0].stream_url, "/jamendo/stream/168");
    }

    #[tokio::test]
    async fn test_resolve_stream_builds_templated_url() {
        let jamendo = Jamendo::new(reqwest::Client::new());
        let plan = jamendo
            .resolve_stream(&StreamTarget::Id("168".to_string()))
            .await
            .unwrap();

        assert_eq!(
            plan,
            StreamPlan::Relay {
                url: format!(
                    "{API_BASE}/tracks/file/?client_id={CLIENT_ID}&id=168&action=stream"
                ),
                on_failure: RelayFallback::Error,
            }
        );
    }
}
