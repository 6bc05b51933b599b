//! 定义了整个 `music-aggregator` 库的错误类型 `AggregatorError`。

use std::io;
use thiserror::Error;

/// `music-aggregator` 库的通用错误枚举。
#[derive(Error, Debug)]
pub enum AggregatorError {
    /// 通用的 anyhow 错误
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    /// 网络请求失败 (源自 `reqwest::Error`)
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// JSON 解析失败 (源自 `serde_json::Error`)
    #[error("JSON 解析失败: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// I/O 错误 (源自 `io::Error`)
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// 搜索关键词为空
    #[error("搜索关键词为空")]
    EmptyQuery,

    /// 所有提供商都没有返回任何结果
    #[error("没有找到任何结果")]
    NothingFound,

    /// 不支持的平台提供商
    #[error("不支持的提供商: '{0}'")]
    ProviderNotSupported(String),

    /// 提供商不支持该操作
    #[error("提供商 '{0}' 不支持该操作")]
    NotSupported(&'static str),

    /// 无法为指定曲目解析出可播放的流
    #[error("无法解析可播放的流: {0}")]
    StreamNotFound(String),

    /// API 返回错误或空数据
    #[error("API 为 `{0}` 返回了错误或空数据")]
    ApiError(String),

    /// 页面抓取失败（标记缺失、结构变化等）
    #[error("页面抓取失败: {0}")]
    Scrape(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 更通用的网络层错误
    #[error("网络错误: {0}")]
    Network(String),
}

/// `AggregatorError` 的 `Result` 类型别名，方便在函数签名中使用。
pub type Result<T> = std::result::Result<T, AggregatorError>;

impl AggregatorError {
    /// 返回该错误对应的 HTTP 状态码提示，供外层 HTTP 边界直接映射。
    ///
    /// `EmptyQuery` 对应客户端输入错误，`NothingFound` 是"合法的空结果"，
    /// 两者都必须与服务端错误 (5xx) 区分开。
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::EmptyQuery => 400,
            Self::NothingFound | Self::ProviderNotSupported(_) | Self::NotSupported(_) => 404,
            _ => 500,
        }
    }
}
