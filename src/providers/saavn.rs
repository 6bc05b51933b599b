//! JioSaavn 平台适配器（经 saavn.me 公共代理）。
//!
//! 搜索结果里直接携带各码率的下载直链，所以取流不需要再查一次：
//! 搜索阶段就选好码率，把直链编码进 `streamUrl`，取流时按 URL 中继。
//! 中继失败时退化为重定向到直链本身。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AggregatorError, Result},
    model::track::{RelayFallback, StreamPlan, StreamTarget, TrackRecord, UNKNOWN_ARTIST},
    providers::Provider,
};

const API_BASE: &str = "https://saavn.me";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(6);
const SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    results: Vec<ApiSong>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSong {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    primary_artists: Option<String>,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    album: Option<ApiAlbum>,
    #[serde(default)]
    image: Vec<ApiLink>,
    #[serde(default)]
    download_url: Vec<ApiQualityLink>,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiLink {
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiQualityLink {
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

/// 按码率挑下载直链：320kbps 优先，其次 160kbps，最后取列表第一个。
fn pick_download_url(links: &[ApiQualityLink]) -> Option<&str> {
    let by_quality = |want: &str| {
        links
            .iter()
            .find(|l| l.quality.as_deref() == Some(want))
            .and_then(|l| l.link.as_deref())
    };
    by_quality("320kbps")
        .or_else(|| by_quality("160kbps"))
        .or_else(|| links.first().and_then(|l| l.link.as_deref()))
}

/// Saavn 音乐源。
pub struct Saavn {
    http_client: reqwest::Client,
    api_base: String,
}

impl Saavn {
    /// 创建一个新的 Saavn 实例。
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

fn to_record(song: ApiSong) -> Option<TrackRecord> {
    let download_url = pick_download_url(&song.download_url)?.to_string();
    // 封面列表按尺寸升序，第 3 档通常是 500x500。
    let artwork = song
        .image
        .get(2)
        .and_then(|l| l.link.clone())
        .or_else(|| song.image.first().and_then(|l| l.link.clone()));

    Some(TrackRecord {
        source: "saavn".to_string(),
        id: song.id,
        title: song.name.unwrap_or_default(),
        artist: song
            .primary_artists
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        artwork,
        duration_seconds: song.duration,
        stream_url: format!("/saavn/stream?url={}", urlencoding::encode(&download_url)),
        plays: None,
        genre: None,
        album: song.album.and_then(|a| a.name),
        year: song.year,
    })
}

#[async_trait]
impl Provider for Saavn {
    fn name(&self) -> &'static str {
        "saavn"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/search/songs?query={}&limit={SEARCH_LIMIT}",
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

        let songs = response.data.map(|d| d.results).unwrap_or_default();
        debug!("[SAAVN] 拉取到 {} 条原始曲目", songs.len());

        Ok(songs
            .into_iter()
            .filter_map(to_record)
            .filter(TrackRecord::is_valid)
            .collect())
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Url(url) = target else {
            return Err(AggregatorError::StreamNotFound(
                "Saavn 只支持按直链 URL 取流".to_string(),
            ));
        };
        Ok(StreamPlan::Relay {
            url: url.clone(),
            on_failure: RelayFallback::Redirect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality(quality: &str, link: &str) -> ApiQualityLink {
        ApiQualityLink {
            quality: Some(quality.to_string()),
            link: Some(link.to_string()),
        }
    }

    #[test]
    fn test_pick_download_url_prefers_320() {
        let links = vec![
            quality("96kbps", "https://cdn/96.mp4"),
            quality("160kbps", "https://cdn/160.mp4"),
            quality("320kbps", "https://cdn/320.mp4"),
        ];
        assert_eq!(pick_download_url(&links), Some("https://cdn/320.mp4"));
    }

    #[test]
    fn test_pick_download_url_falls_back_in_order() {
        let links = vec![
            quality("96kbps", "https://cdn/96.mp4"),
            quality("160kbps", "https://cdn/160.mp4"),
        ];
        assert_eq!(pick_download_url(&links), Some("https://cdn/160.mp4"));

        let only_low = vec![quality("48kbps", "https://cdn/48.mp4")];
        assert_eq!(pick_download_url(&only_low), Some("https://cdn/48.mp4"));
        assert_eq!(pick_download_url(&[]), None);
    }

    #[tokio::test]
    async fn test_resolve_stream_redirects_on_relay_failure() {
        let saavn = Saavn::new(reqwest::Client::new());
        let plan = saavn
            .resolve_stream(&StreamTarget::Url("https://cdn/320.mp4".to_string()))
            .await
            .unwrap();

        assert_eq!(
            plan,
            StreamPlan::Relay {
                url: "https://cdn/320.mp4".to_string(),
                on_failure: RelayFallback::Redirect,
            }
        );

        let err = saavn
            .resolve_stream(&StreamTarget::Id("abc".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AggregatorError::StreamNotFound(_)));
    }

    #[tokio::test]
    async fn test_search_encodes_download_url() {
        use serde_json::json;
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/songs"))
            .and(query_param("query", "tum hi ho"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "SUCCESS",
                "data": {
                    "results": [{
                        "id": "xq5zy",
                        "name": "Tum Hi Ho",
                        "primaryArtists": "Arijit Singh",
                        "duration": 262,
                        "year": "2013",
                        "album": { "name": "Aashiqui 2" },
                        "image": [
                            { "link": "https://img/50.jpg" },
                            { "link": "https://img/150.jpg" },
                            { "link": "https://img/500.jpg" }
                        ],
                        "downloadUrl": [
                            { "quality": "160kbps", "link": "https://cdn/160.mp4" },
                            { "quality": "320kbps", "link": "https://cdn/320.mp4" }
                        ]
                    }]
                }
            })))
            .mount(&server)
            .await;

        let saavn = Saavn::with_api_base(reqwest::Client::new(), server.uri());
        let records = saavn.search_tracks("tum hi ho").await.unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.album.as_deref(), Some("Aashiqui 2"));
        assert_eq!(record.year.as_deref(), Some("2013"));
        assert_eq!(record.artwork.as_deref(), Some("https://img/500.jpg"));
        assert_eq!(
            record.stream_url,
            format!("/saavn/stream?url={}", urlencoding::encode("https://cdn/320.mp4"))
        );
    }
}
