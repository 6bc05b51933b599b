//! Bandcamp 平台适配器。
//!
//! Bandcamp 没有公开搜索 API，这里直接抓搜索页的 HTML，用正则
//! 切出每个结果块再提取字段。曲目页内嵌的 `data-tralbum` JSON
//! （或旧版的 `TralbumData` 脚本）里藏着 mp3-128 直链。
//! 解析全部是纯函数，便于离线测试。

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AggregatorError, Result},
    model::track::{RelayFallback, StreamPlan, StreamTarget, TrackRecord},
    providers::Provider,
};

const SEARCH_BASE: &str = "https://bandcamp.com";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(8);
const MAX_RESULTS: usize = 15;

/// 不带浏览器 UA 时 Bandcamp 会拒绝请求。
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<li class="searchresult data-search">(.*?)</li>"#)
        .expect("结果块正则非法")
});
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="heading">\s*<a[^>]*>(.*?)</a>"#)
        .expect("标题正则非法")
});
static SUBHEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="subhead">\s*by (.*?)</div>"#)
        .expect("艺术家正则非法")
});
static ITEM_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div class="itemurl">\s*<a href="([^"]+)""#)
        .expect("链接正则非法")
});
static ART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img src="([^"]+)""#)
        .expect("封面正则非法")
});
static TRALBUM_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-tralbum="([^"]*)""#)
        .expect("tralbum 属性正则非法")
});
static TRALBUM_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)TralbumData\s*=\s*(\{.*?\});")
        .expect("tralbum 脚本正则非法")
});
static MP3_128_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""mp3-128"\s*:\s*"([^"]+)""#)
        .expect("mp3 键正则非法")
});

#[derive(Debug, Deserialize)]
struct Tralbum {
    #[serde(default)]
    trackinfo: Vec<TralbumTrack>,
}

#[derive(Debug, Deserialize)]
struct TralbumTrack {
    #[serde(default)]
    file: Option<TralbumFile>,
}

#[derive(Debug, Deserialize)]
struct TralbumFile {
    #[serde(rename = "mp3-128", default)]
    mp3_128: Option<String>,
}

/// 从搜索页 HTML 中提取曲目/专辑结果，其余条目类型忽略。
fn parse_search_page(html: &str) -> Vec<TrackRecord> {
    let mut records = Vec::new();

    for block_match in BLOCK_RE.captures_iter(html) {
        let block = &block_match[1];
        if !block.contains(r#"itemtype="TRACK""#) && !block.contains(r#"itemtype="ALBUM""#) {
            continue;
        }

        let Some(title) = HEADING_RE.captures(block).map(|c| c[1].trim().to_string()) else {
            continue;
        };
        let Some(mut link) = ITEM_URL_RE.captures(block).map(|c| c[1].to_string()) else {
            continue;
        };
        if link.starts_with("//") {
            link = format!("https:{link}");
        }

        let encoded = urlencoding::encode(&link).into_owned();
        records.push(TrackRecord {
            source: "bandcamp".to_string(),
            // 曲目页 URL 就是 Bandcamp 的 ID
            id: encoded.clone(),
            title,
            artist: SUBHEAD_RE
                .captures(block)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_else(|| "Artista Bandcamp".to_string()),
            artwork: ART_RE.captures(block).map(|c| c[1].to_string()),
            duration_seconds: None,
            stream_url: format!("/bandcamp/stream?url={encoded}"),
            plays: None,
            genre: Some("Indie/Bandcamp".to_string()),
            album: None,
            year: None,
        });

        if records.len() == MAX_RESULTS {
            break;
        }
    }

    records
}

/// 从曲目页 HTML 中提取 mp3-128 直链。
///
/// 先解 `data-tralbum` 属性里被 `&quot;` 转义的 JSON；解不出来
/// 再退回旧版页面的 `TralbumData = {...}` 脚本块。
fn extract_stream_url(html: &str) -> Option<String> {
    if let Some(captures) = TRALBUM_ATTR_RE.captures(html) {
        let json = captures[1].replace("&quot;", "\"");
        if let Ok(tralbum) = serde_json::from_str::<Tralbum>(&json)
            && let Some(url) = tralbum
                .trackinfo
                .first()
                .and_then(|t| t.file.as_ref())
                .and_then(|f| f.mp3_128.clone())
        {
            return Some(url);
        }
    }

    TRALBUM_SCRIPT_RE
        .captures(html)
        .and_then(|script| {
            let body = script.get(1).map(|m| m.as_str())?;
            MP3_128_RE.captures(body).map(|c| c[1].to_string())
        })
}

/// Bandcamp 音乐源。
pub struct Bandcamp {
    http_client: reqwest::Client,
    search_base: String,
}

impl Bandcamp {
    /// 创建一个新的 Bandcamp 实例。
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
impl Provider for Bandcamp {
    fn name(&self) -> &'static str {
        "bandcamp"
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = format!(
            "{}/search?q={}",
            self.search_base,
            urlencoding::encode(query)
        );

        let html = self
            .http_client
            .get(&url)
            .header(reqwest::header::USER_AGENT, BROWSER_UA)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let records = parse_search_page(&html);
        debug!("[BANDCAMP] 从搜索页提取到 {} 条结果", records.len());
        Ok(records)
    }

    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan> {
        let StreamTarget::Url(page_url) = target else {
            return Err(AggregatorError::StreamNotFound(
                "Bandcamp 只支持按曲目页 URL 取流".to_string(),
            ));
        };

        let html = self
            .http_client
            .get(page_url)
            .header(reqwest::header::USER_AGENT, BROWSER_UA)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let url = extract_stream_url(&html).ok_or_else(|| {
            AggregatorError::Scrape(format!("Bandcamp 页面 {page_url} 中没有可用的 mp3-128 流"))
        })?;

        Ok(StreamPlan::Relay {
            url,
            on_failure: RelayFallback::Error,
        })
    }
}
