//! 提供商模块
//!
//! 该模块定义了与各音乐/视频平台进行交互的核心抽象。

use async_trait::async_trait;

use crate::{
    error::{AggregatorError, Result},
    model::{StreamPlan, StreamTarget, TrackRecord},
};

pub mod archive;
pub mod audius;
pub mod bandcamp;
pub mod dailymotion;
pub mod hearthis;
pub mod jamendo;
pub mod mixcloud;
pub mod palco;
pub mod saavn;
pub mod soundcloud;
pub mod youtube;

/// 定义了所有平台提供商需要实现的通用接口。
///
/// 实现方约定：
/// - `search_tracks` 内部必须套用自身的有界超时（各平台 2.5–8 秒不等），
///   并在返回前丢弃缺失标题或流地址的无效记录；
/// - 抓取型提供商在页面标记缺失时返回空列表，而不是尝试部分提取；
/// - 返回 `Err` 是允许的，聚合器会把它转换为一份被记录原因的空贡献，
///   绝不会让单个提供商的失败污染整个聚合结果。
#[async_trait]
pub trait Provider: Send + Sync {
    ///
    /// 返回提供商的唯一名称。
    ///
    /// 一个全小写的静态字符串，例如 `"soundcloud"`, `"audius"`，
    /// 同时也是内部流代理路径的第一段。
    ///
    fn name(&self) -> &'static str;

    ///
    /// 根据自由文本关键词搜索曲目。
    ///
    /// # 参数
    /// * `query` - 搜索关键词（曲目、艺术家或专辑）。
    ///
    /// # 返回
    /// 一个 `Result`，成功时包含一个标准化的 `Vec<TrackRecord>`。
    ///
    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>>;

    ///
    /// 把一次流媒体请求解析为可执行的 `StreamPlan`。
    ///
    /// 解析过程可能包含多步上游调用（例如先取元数据再定位文件地址），
    /// 这些步骤是严格顺序的。
    ///
    /// # 参数
    /// * `target` - 曲目 ID 或已编码的上游 URL，取决于平台的端点形式。
    ///
    async fn resolve_stream(&self, target: &StreamTarget) -> Result<StreamPlan>;

    ///
    /// 返回该平台的热门曲目。
    ///
    /// 只有部分平台有对应接口，默认实现返回 `NotSupported`。
    ///
    async fn trending(&self) -> Result<Vec<TrackRecord>> {
        Err(AggregatorError::NotSupported(self.name()))
    }
}
