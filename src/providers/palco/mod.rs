//! Palco MP3（巴西独立音乐平台）适配器。
//!
//! 没有公开 API，搜索靠抓网页并解析内嵌的 Apollo 状态，
//! 解析逻辑在 [`apollo`] 模块中。

mod apollo;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::{AggregatorError, Result},
    model::track::{RelayFallback, StreamPlan, StreamTarget, TrackRecord},
    providers::Provider,
};

const SEARCH_BASE: &str = "https://www.palcomp3.com.br";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(8);

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
/// 站点按语言协商返回不同页面，固定请求葡语版本。
const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7";

/// Palco MP3 音乐源。
pub struct PalcoMp3 {
    http_client: reqwest::Client,
    search_base: String,
}

impl PalcoMp3 {
    /// 创建一个新的 Palco MP3 实例。
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            search_base: SEARCH_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_search_base(http_client: reqwest::Client, search_base: String) -> Self {
        Self {
            http_client,
            search_base,
        }
    }
}

#[async_trait]
impl Provider for PalcoMp3 {
    fn name(&self) -> &'static str {
        "palco"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/busca.htm?q={}",
            self.search_base,
            urlencoding::encode(query)
        );

        let html = self
            .http_client
            .get(&url)
            .header(reqwest::header::USER_AGENT, BROWSER_UA)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        // 页面结构变了就解析不出状态，按无结果处理而不是报错
        let Some(state) = apollo::extract_state(&html) else {
            warn!("[PALCO] 页面里找不到 Apollo 状态，返回空结果");
            return Ok(Vec::new());
        };

        let records = apollo::collect_tracks(&state);
        debug!("[PALCO] 从 Apollo 状态提取到 {} 条曲目", records.len());
        Ok(records)
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Url(url) = target else {
            return Err(AggregatorError::StreamNotFound(
                "Palco MP3 只支持按直链 URL 取流".to_string(),
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
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_parses_embedded_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busca.htm"))
            .and(query_param("q", "modão"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><script>window.__APOLLO_STATE__ = {"Music:55":{"musicID":55,"title":"Estrada da Vida","mp3File":"https://palcomp3.com/m/55.mp3"}};</script></html>"#,
            ))
            .mount(&server)
            .await;

        let palco = PalcoMp3::with_search_base(reqwest::Client::new(), server.uri());
        let records = palco.search_tracks("modão").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Estrada da Vida");
        assert_eq!(
            records[0].stream_url,
            format!(
                "/palco/stream?url={}",
                urlencoding::encode("https://palcomp3.com/m/55.mp3")
            )
        );
    }

    #[tokio::test]
    async fn test_search_without_state_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busca.htm"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>novo layout</html>"))
            .mount(&server)
            .await;

        let palco = PalcoMp3::with_search_base(reqwest::Client::new(), server.uri());
        assert!(palco.search_tracks("x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_stream_redirect_fallback() {
        let palco = PalcoMp3::new(reqwest::Client::new());
        let plan = palco
            .resolve_stream(&StreamTarget::Url("https://palcomp3.com/m/55.mp3".to_string()))
            .await
            .unwrap();
        assert_eq!(
            plan,
            StreamPlan::Relay {
                url: "https://palcomp3.com/m/55.mp3".to_string(),
                on_failure: RelayFallback::Redirect,
            }
        );
    }
}
