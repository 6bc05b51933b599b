//! SoundCloud 风格的滚动凭据缓存。
//!
//! 这类平台没有公开的 API Key，客户端 ID 要从官方页面引用的
//! 前端资源脚本里抓出来，而且会不定期轮换。本模块把抓取结果
//! 缓存一段 TTL 窗口，过期后由下一个调用方触发一次刷新；刷新
//! 彻底失败时退回到一个内置的备用 ID 池，保证调用方总能拿到
//! 一个（可能已失效的）凭据。
//!
//! 时钟和抓取过程都通过 trait 注入，测试可以用假时钟和计数桩
//! 做确定性验证。

use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::prelude::IndexedRandom;
use regex::Regex;
use reqwest::Client;
use tracing::{info, warn};

use crate::{
    config,
    error::{AggregatorError, Result},
};

/// 凭据的有效期窗口。窗口内无论请求量多大都直接复用缓存。
const CLIENT_ID_TTL_SECS: i64 = 60 * 60;

/// 刷新时最多探测多少个资源脚本。
const MAX_ASSETS_TO_PROBE: usize = 8;

const DISCOVER_PAGE_URL: &str = "https://soundcloud.com/discover";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// 抓取失败时轮换使用的备用 Client ID 池。
const FALLBACK_CLIENT_IDS: &[&str] = &[
    "LBCcHmRB8XSStWL6wKH2HPACspQlXg2P",
    "aYf4Fk9x7jS5t7a67fH5f6g7h8i9j0k1",
    "rKwe8HqZ6302e2E7iG5g3g5g3g5g3g5g",
    "Nb28sn2a2s211d12d212d212d212d212",
];

static ASSET_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src="(https://a-v2\.sndcdn\.com/assets/[^"]+\.js)""#)
        .expect("资源脚本正则不合法")
});

static CLIENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"client_id:"([a-zA-Z0-9]{32})""#).expect("Client ID 正则不合法"));

/// 可注入的时钟抽象。
pub trait Clock: Send + Sync {
    /// 返回当前时刻。
    fn now(&self) -> DateTime<Utc>;
}

/// 使用系统时间的默认时钟。
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 可注入的凭据抓取过程。
#[async_trait]
pub trait ClientIdSource: Send + Sync {
    /// 尝试从上游抓取一个新的 Client ID。
    async fn fetch_client_id(&self) -> Result<String>;
}

/// 生产环境的抓取实现：
/// 抓取发现页，提取其引用的资源脚本地址，按"最新的在后"的顺序
/// 倒序探测，从第一个命中固定模式的脚本里截取 Client ID。
pub struct DiscoverPageScraper {
    http_client: Client,
}

impl DiscoverPageScraper {
    /// 创建一个新的抓取器。
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl ClientIdSource for DiscoverPageScraper {
    async fn fetch_client_id(&self) -> Result<String> {
        let html = self
            .http_client
            .get(DISCOVER_PAGE_URL)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?
            .text()
            .await?;

        let mut script_urls: Vec<&str> = ASSET_SCRIPT_RE
            .captures_iter(&html)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        // 最新加入的脚本一般排在最后，里面的 Client ID 最可能还活着
        script_urls.reverse();

        for url in script_urls.into_iter().take(MAX_ASSETS_TO_PROBE) {
            let Ok(response) = self.http_client.get(url).send().await else {
                continue;
            };
            let Ok(js) = response.text().await else {
                continue;
            };
            if let Some(captures) = CLIENT_ID_RE.captures(&js)
                && let Some(id) = captures.get(1)
            {
                return Ok(id.as_str().to_string());
            }
        }

        Err(AggregatorError::Scrape(
            "没有任何资源脚本包含 Client ID".to_string(),
        ))
    }
}

#[derive(Debug, Clone)]
struct CachedClientId {
    client_id: String,
    fetched_at: DateTime<Utc>,
}

/// TTL 缓存的滚动凭据。
///
/// 状态机只有两态：`FRESH`（距上次成功抓取不足 TTL）与 `STALE`。
/// `STALE` 时由下一个调用方触发刷新；刷新过程不持锁，两个并发的
/// 过期调用可能各自刷新一次，结果等价，只是多了一次上游请求。
pub struct ClientIdCache {
    cached: Mutex<Option<CachedClientId>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    source: Arc<dyn ClientIdSource>,
    fallback_pool: Vec<String>,
    persist: bool,
}

impl ClientIdCache {
    /// 创建生产配置的缓存：系统时钟、发现页抓取器、磁盘持久化。
    ///
    /// 若本地存在持久化凭据则原样载入作为初始状态；
    /// 是否仍在有效期内由取用时统一判定。
    pub fn new(http_client: Client) -> Self {
        let cache = Self::with_parts(
            Arc::new(SystemClock),
            Arc::new(DiscoverPageScraper::new(http_client)),
            FALLBACK_CLIENT_IDS.iter().map(|s| s.to_string()).collect(),
        )
        .persisted();

        if let Ok(saved) = config::load_soundcloud_config() {
            let mut guard = cache.cached.lock().expect("凭据缓存锁被毒化");
            *guard = Some(CachedClientId {
                client_id: saved.client_id,
                fetched_at: saved.fetched_at,
            });
        }
        cache
    }

    /// 用显式注入的时钟/抓取器/备用池创建缓存，不做持久化。
    pub fn with_parts(
        clock: Arc<dyn Clock>,
        source: Arc<dyn ClientIdSource>,
        fallback_pool: Vec<String>,
    ) -> Self {
        Self {
            cached: Mutex::new(None),
            ttl: Duration::seconds(CLIENT_ID_TTL_SECS),
            clock,
            source,
            fallback_pool,
            persist: false,
        }
    }

    fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }

    /// 返回一个可用的 Client ID。
    ///
    /// 刷新失败永远不会向调用方暴露：总会返回一个凭据，哪怕它可能
    /// 已经失效。下游拿着失效凭据得到的 401 会表现为普通的空结果。
    pub async fn get_client_id(&self) -> String {
        let now = self.clock.now();
        {
            let guard = self.cached.lock().expect("凭据缓存锁被毒化");
            if let Some(cached) = guard.as_ref()
                && now - cached.fetched_at < self.ttl
            {
                return cached.client_id.clone();
            }
        }

        info!("[SOUNDCLOUD] 凭据过期或不存在，正在抓取新的 Client ID...");
        match self.source.fetch_client_id().await {
            Ok(client_id) => {
                info!("[SOUNDCLOUD] Client ID 已更新。");
                let fetched_at = self.clock.now();
                {
                    let mut guard = self.cached.lock().expect("凭据缓存锁被毒化");
                    *guard = Some(CachedClientId {
                        client_id: client_id.clone(),
                        fetched_at,
                    });
                }
                if self.persist
                    && let Err(e) = config::save_soundcloud_config(&config::SoundcloudConfig {
                        client_id: client_id.clone(),
                        fetched_at,
                    })
                {
                    warn!("[SOUNDCLOUD] 持久化 Client ID 失败: {e}");
                }
                client_id
            }
            Err(e) => {
                warn!("[SOUNDCLOUD] 抓取 Client ID 失败: {e}，使用备用池。");
                // 不更新时间戳，下一个调用方会再次尝试刷新
                self.fallback_pool
                    .choose(&mut rand::rng())
                    .cloned()
                    .unwrap_or_default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, delta: Duration) {
            let mut guard = self.now.lock().unwrap();
            *guard += delta;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl ClientIdSource for CountingSource {
        async fn fetch_client_id(&self) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AggregatorError::Scrape("测试桩故意失败".to_string()))
            } else {
                Ok(format!("scraped-{n}"))
            }
        }
    }

    #[tokio::test]
    async fn test_fresh_client_id_is_reused_without_refresh() {
        let clock = FakeClock::new();
        let source = CountingSource::new(false);
        let cache = ClientIdCache::with_parts(clock.clone(), source.clone(), vec![]);

        let first = cache.get_client_id().await;
        let second = cache.get_client_id().await;

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1, "TTL 内只允许一次抓取");
    }

    #[tokio::test]
    async fn test_expired_client_id_triggers_exactly_one_refresh() {
        let clock = FakeClock::new();
        let source = CountingSource::new(false);
        let cache = ClientIdCache::with_parts(clock.clone(), source.clone(), vec![]);

        cache.get_client_id().await;
        clock.advance(Duration::seconds(CLIENT_ID_TTL_SECS + 1));
        cache.get_client_id().await;
        // 刷新后再取一次，确认新时间戳生效
        cache.get_client_id().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scrape_failure_falls_back_to_pool_without_marking_fresh() {
        let clock = FakeClock::new();
        let source = CountingSource::new(true);
        let cache = ClientIdCache::with_parts(
            clock.clone(),
            source.clone(),
            vec!["backup-token".to_string()],
        );

        let first = cache.get_client_id().await;
        assert_eq!(first, "backup-token");

        // 时间戳没有被刷新，下一次调用必须再次尝试抓取
        let second = cache.get_client_id().await;
        assert_eq!(second, "backup-token");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_client_id_pattern_extraction() {
        let js = r#"var cfg={client_id:"AbCdEf0123456789AbCdEf0123456789",env:"production"}"#;
        let captured = CLIENT_ID_RE.captures(js).unwrap();
        assert_eq!(&captured[1], "AbCdEf0123456789AbCdEf0123456789");
    }

    #[test]
    fn test_asset_script_extraction_keeps_document_order() {
        let html = r#"
            <script crossorigin src="https://a-v2.sndcdn.com/assets/0-first.js"></script>
            <script crossorigin src="https://a-v2.sndcdn.com/assets/1-second.js"></script>
        "#;
        let urls: Vec<&str> = ASSET_SCRIPT_RE
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://a-v2.sndcdn.com/assets/0-first.js",
                "https://a-v2.sndcdn.com/assets/1-second.js"
            ]
        );
    }
}
