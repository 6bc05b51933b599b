#![warn(missing_docs)]

//! # Music Aggregator RS
//!
//! 一个把十余个音乐/视频平台聚合成统一搜索与取流接口的 Rust 库。
//!
//! ## 主要功能
//!
//! - **聚合搜索**: 同时在 SoundCloud、Audius、Jamendo、Archive.org、
//!   Mixcloud、HearThis、Bandcamp、Dailymotion、Saavn、Palco MP3 和
//!   YouTube（经 Piped）中搜索，把结果归一成统一的曲目结构后随机混排。
//! - **流媒体解析**: 每个平台各自把曲目 ID 或直链解析成可执行的取流
//!   方案——以 inline 方式中继字节流，或重定向到上游地址。
//! - **凭据轮换**: SoundCloud 的 client_id 会从网页端自动刮取并按
//!   小时滚动；Audius 的发现节点按健康状况轮换。
//!
//! ## 聚合搜索
//!
//! ```rust,no_run
//! use music_aggregator_rs::MusicAggregator;
//!
//! async {
//!     let mut aggregator = MusicAggregator::new();
//!     aggregator.load_providers().await.unwrap();
//!
//!     match aggregator.search_tracks("lofi hip hop").await {
//!         Ok(tracks) => println!("找到 {} 条曲目。", tracks.len()),
//!         Err(e) => eprintln!("发生错误: {e}"),
//!     }
//! };
//! ```
//!
//! ## 取流
//!
//! ```rust,no_run
//! use music_aggregator_rs::{MusicAggregator, RelayOutcome, StreamTarget};
//!
//! async {
//!     let mut aggregator = MusicAggregator::new();
//!     aggregator.load_providers().await.unwrap();
//!
//!     match aggregator
//!         .stream("soundcloud", &StreamTarget::Id("293".into()))
//!         .await
//!     {
//!         Ok(RelayOutcome::Stream(stream)) => {
//!             println!("中继 {} 字节流", stream.content_type);
//!         }
//!         Ok(RelayOutcome::Redirect(url)) => println!("重定向到 {url}"),
//!         Err(e) => eprintln!("发生错误: {e}"),
//!     }
//! };
//! ```

mod config;
pub mod credentials;
pub mod error;
pub mod model;
pub mod providers;
pub mod relay;
pub mod rotation;
pub mod search;

use std::{pin::Pin, sync::Arc};

use futures::future;

pub use crate::{
    error::{AggregatorError, Result},
    model::{RelayFallback, StreamPlan, StreamTarget, TrackRecord},
    relay::{RelayOutcome, RelayedStream},
    search::Contribution,
};

use crate::{
    credentials::ClientIdCache,
    providers::{
        Provider, archive::ArchiveOrg, audius::Audius, bandcamp::Bandcamp,
        dailymotion::Dailymotion, hearthis::HearThis, jamendo::Jamendo, mixcloud::Mixcloud,
        palco::PalcoMp3, saavn::Saavn, soundcloud::SoundCloud, youtube::YouTube,
    },
};

// ==========================================================
//  顶层 API
// ==========================================================

/// 顶层聚合器客户端，封装了所有平台提供商，为用户提供统一、简单的接口。
///
/// 这是与本库交互的主要入口点。
pub struct MusicAggregator {
    providers: Vec<Box<dyn Provider>>,
    http_client: reqwest::Client,
}

impl Default for MusicAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MusicAggregator {
    /// 创建一个新的、空的 `MusicAggregator` 实例。
    ///
    /// 在使用搜索和取流功能之前，须先调用 `load_providers()`。
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            http_client: reqwest::Client::new(),
        }
    }

    /// 用外部构造好的提供商集合创建实例，主要用于测试替身注入。
    pub fn with_providers(providers: Vec<Box<dyn Provider>>) -> Self {
        Self {
            providers,
            http_client: reqwest::Client::new(),
        }
    }

    /// 初始化并加载所有平台提供商。
    ///
    /// 个别提供商初始化失败不会让整体失败，只会被记录并跳过。
    pub async fn load_providers(&mut self) -> Result<()> {
        let http_client = self.http_client.clone();
        let credentials = Arc::new(ClientIdCache::new(http_client.clone()));

        type Initializer =
            Pin<Box<dyn Future<Output = (&'static str, Result<Box<dyn Provider>>)> + Send>>;

        let initializers: Vec<Initializer> = vec![
            {
                let credentials = Arc::clone(&credentials);
                Box::pin(async move {
                    (
                        "soundcloud",
                        SoundCloud::new(credentials).map(|p| Box::new(p) as Box<_>),
                    )
                })
            },
            {
                let client = http_client.clone();
                Box::pin(async move { ("audius", Ok(Box::new(Audius::new(client)) as Box<_>)) })
            },
            {
                let client = http_client.clone();
                Box::pin(async move { ("jamendo", Ok(Box::new(Jamendo::new(client)) as Box<_>)) })
            },
            {
                let client = http_client.clone();
                Box::pin(
                    async move { ("archive", Ok(Box::new(ArchiveOrg::new(client)) as Box<_>)) },
                )
            },
            {
                let client = http_client.clone();
                Box::pin(async move { ("saavn", Ok(Box::new(Saavn::new(client)) as Box<_>)) })
            },
            {
                let client = http_client.clone();
                Box::pin(
                    async move { ("hearthis", Ok(Box::new(HearThis::new(client)) as Box<_>)) },
                )
            },
            {
                let client = http_client.clone();
                Box::pin(
                    async move { ("mixcloud", Ok(Box::new(Mixcloud::new(client)) as Box<_>)) },
                )
            },
            {
                let client = http_client.clone();
                Box::pin(async move {
                    ("dailymotion", Ok(Box::new(Dailymotion::new(client)) as Box<_>))
                })
            },
            {
                let client = http_client.clone();
                Box::pin(
                    async move { ("bandcamp", Ok(Box::new(Bandcamp::new(client)) as Box<_>)) },
                )
            },
            {
                let client = http_client.clone();
                Box::pin(async move { ("palco", Ok(Box::new(PalcoMp3::new(client)) as Box<_>)) })
            },
            {
                let client = http_client.clone();
                Box::pin(async move { ("youtube", Ok(Box::new(YouTube::new(client)) as Box<_>)) })
            },
        ];

        let results = future::join_all(initializers).await;

        self.providers = results
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(provider) => {
                    tracing::info!("[Main] Provider '{}' 初始化成功。", name);
                    Some(provider)
                }
                Err(e) => {
                    tracing::error!("[Main] Provider '{}' 初始化失败: {}", name, e);
                    None
                }
            })
            .collect();

        Ok(())
    }

    /// 返回已加载的提供商名称。
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// 在所有平台中并发搜索，返回合并且随机打乱后的标准化曲目。
    ///
    /// # 错误
    /// - 空白关键词返回 [`AggregatorError::EmptyQuery`]；
    /// - 所有平台都没有结果时返回 [`AggregatorError::NothingFound`]。
    pub async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        if self.providers.is_empty() {
            return Err(AggregatorError::Internal(
                "提供商尚未初始化，请先调用 load_providers()".to_string(),
            ));
        }
        search::aggregate_search(&self.providers, query).await
    }

    /// 返回指定平台的热门曲目。
    pub async fn trending(&self, provider_name: &str) -> Result<Vec<TrackRecord>> {
        self.find_provider(provider_name)?.trending().await
    }

    /// 解析并执行一次取流请求。
    ///
    /// 先让对应平台把 `target` 解析成 [`StreamPlan`]，再执行计划：
    /// 重定向方案直接返回目标地址；中继方案抓取上游字节流，失败时
    /// 按该平台声明的 [`RelayFallback`] 回退。
    pub async fn stream(
        &self,
        provider_name: &str,
        target: &StreamTarget,
    ) -> Result<RelayOutcome> {
        let provider = self.find_provider(provider_name)?;
        let plan = provider.resolve_stream(target).await?;

        match plan {
            StreamPlan::Redirect { url } => Ok(RelayOutcome::Redirect(url)),
            StreamPlan::Relay { url, on_failure } => {
                match relay::fetch_inline(&self.http_client, &url).await {
                    Ok(stream) => Ok(RelayOutcome::Stream(stream)),
                    Err(e) => match on_failure {
                        RelayFallback::Redirect => {
                            tracing::warn!(
                                "[{}] 中继失败（{e}），按回退策略重定向到上游。",
                                provider.name().to_uppercase()
                            );
                            Ok(RelayOutcome::Redirect(url))
                        }
                        RelayFallback::Error => Err(e),
                    },
                }
            }
        }
    }

    fn find_provider(&self, name: &str) -> Result<&dyn Provider> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .map(|p| p.as_ref())
            .ok_or_else(|| AggregatorError::ProviderNotSupported(name.to_string()))
    }
}
