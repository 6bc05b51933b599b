//! Internet Archive（archive.org）平台适配器。
//!
//! 搜索走 `advancedsearch.php` 并限定 `mediatype:(audio)`；取流分两步，
//! 先读条目的 metadata 找出最合适的 MP3 文件，再按
//! `https://{d1}{dir}/{文件名}` 拼出直链。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AggregatorError, Result},
    model::track::{RelayFallback, StreamPlan, StreamTarget, TrackRecord, UNKNOWN_ARTIST},
    providers::Provider,
};

const API_BASE: &str = "https://archive.org";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(6);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const PAGE_LIMIT: u32 = 30;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    response: Option<SearchBody>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    docs: Vec<ApiDoc>,
}

#[derive(Debug, Deserialize)]
struct ApiDoc {
    identifier: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    creator: Option<Creator>,
}

/// `creator` 字段有时是字符串，有时是字符串数组。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Creator {
    One(String),
    Many(Vec<String>),
}

impl Creator {
    fn into_name(self) -> Option<String> {
        match self {
            Creator::One(name) => Some(name),
            Creator::Many(names) => names.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    files: Vec<ApiFile>,
    #[serde(default)]
    d1: Option<String>,
    #[serde(default)]
    dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    name: String,
    #[serde(default)]
    format: Option<String>,
}

/// 在文件列表中挑最适合播放的 MP3：优先 VBR MP3，其次 MP3，
/// 最后接受任何 `.mp3` 后缀的文件。
fn pick_audio_file(files: &[ApiFile]) -> Option<&ApiFile> {
    files
        .iter()
        .find(|f| f.format.as_deref() == Some("VBR MP3"))
        .or_else(|| files.iter().find(|f| f.format.as_deref() == Some("MP3")))
        .or_else(|| files.iter().find(|f| f.name.ends_with(".mp3")))
}

/// Internet Archive 音乐源。
pub struct ArchiveOrg {
    http_client: reqwest::Client,
    api_base: String,
}

impl ArchiveOrg {
    /// 创建一个新的 Internet Archive 实例。
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

    fn to_record(&self, doc: ApiDoc) -> TrackRecord {
        TrackRecord {
            source: "archive".to_string(),
            id: doc.identifier.clone(),
            title: doc.title.unwrap_or_default(),
            artist: doc
                .creator
                .and_then(Creator::into_name)
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            artwork: Some(format!(
                "{}/services/img/{}",
                self.api_base, doc.identifier
            )),
            duration_seconds: None,
            stream_url: format!("/archive/stream/{}", doc.identifier),
            plays: None,
            genre: Some("Archive".to_string()),
            album: None,
            year: None,
        }
    }
}

#[async_trait]
impl Provider for ArchiveOrg {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/advancedsearch.php?q={}&fl[]=identifier&fl[]=title&fl[]=creator&sort[]=downloads+desc&rows={PAGE_LIMIT}&page=1&output=json",
            self.api_base,
            urlencoding::encode(&format!("{query} AND mediatype:(audio)"))
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

        let docs = response.response.map(|b| b.docs).unwrap_or_default();
        debug!("[ARCHIVE] 拉取到 {} 条原始条目", docs.len());

        Ok(docs
            .into_iter()
            .map(|doc| self.to_record(doc))
            .filter(TrackRecord::is_valid)
            .collect())
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Id(id) = target else {
            return Err(AggregatorError::StreamNotFound(
                "Archive 只支持按条目 ID 取流".to_string(),
            ));
        };

        let metadata: MetadataResponse = self
            .http_client
            .get(format!("{}/metadata/{id}", self.api_base))
            .timeout(METADATA_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if metadata.files.is_empty() {
            return Err(AggregatorError::StreamNotFound(format!(
                "Archive 条目 {id} 没有可用文件"
            )));
        }

        let file = pick_audio_file(&metadata.files).ok_or_else(|| {
            AggregatorError::StreamNotFound(format!("Archive 条目 {id} 没有可播放的 MP3"))
        })?;
        let (Some(d1), Some(dir)) = (metadata.d1.as_deref(), metadata.dir.as_deref()) else {
            return Err(AggregatorError::Scrape(format!(
                "Archive 条目 {id} 的 metadata 缺少服务器信息"
            )));
        };

        Ok(StreamPlan::Relay {
            url: format!("https://{d1}{dir}/{}", file.name),
            on_failure: RelayFallback::Error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_pick_audio_file_prefers_vbr() {
        let files = vec![
            ApiFile {
                name: "capa.jpg".to_string(),
                format: Some("JPEG".to_string()),
            },
            ApiFile {
                name: "faixa.mp3".to_string(),
                format: Some("MP3".to_string()),
            },
            ApiFile {
                name: "faixa_vbr.mp3".to_string(),
                format: Some("VBR MP3".to_string()),
            },
        ];
        assert_eq!(pick_audio_file(&files).unwrap().name, "faixa_vbr.mp3");
    }

    #[test]
    fn test_pick_audio_file_falls_back_to_extension() {
        let files = vec![
            ApiFile {
                name: "notas.txt".to_string(),
                format: Some("Text".to_string()),
            },
            ApiFile {
                name: "gravacao.mp3".to_string(),
                format: None,
            },
        ];
        assert_eq!(pick_audio_file(&files).unwrap().name, "gravacao.mp3");
        assert!(pick_audio_file(&files[..1]).is_none());
    }

    #[tokio::test]
    async fn test_search_handles_creator_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advancedsearch.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {
                    "docs": [
                        { "identifier": "gd1977", "title": "Live 1977", "creator": ["Grateful Dead", "al."] },
                        { "identifier": "sem-titulo" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let archive = ArchiveOrg::with_api_base(reqwest::Client::new(), server.uri());
        let records = archive.search_tracks("dead").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].artist, "Grateful Dead");
        assert_eq!(
            records[0].artwork.as_deref(),
            Some(format!("{}/services/img/gd1977", server.uri()).as_str())
        );
    }

    #[tokio::test]
    async fn test_resolve_stream_builds_direct_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/gd1977"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "d1": "ia800300.us.archive.org",
                "dir": "/0/items/gd1977",
                "files": [
                    { "name": "set1.mp3", "format": "VBR MP3" }
                ]
            })))
            .mount(&server)
            .await;

        let archive = ArchiveOrg::with_api_base(reqwest::Client::new(), server.uri());
        let plan = archive
            .resolve_stream(&StreamTarget::Id("gd1977".to_string()))
            .await
            .unwrap();

        assert_eq!(
            plan,
            StreamPlan::Relay {
                url: "https://ia800300.us.archive.org/0/items/gd1977/set1.mp3".to_string(),
                on_failure: RelayFallback::Error,
            }
        );
    }
}
