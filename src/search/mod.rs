//! 聚合搜索模块
//!
//! 这是整个库唯一存在真正并发协调的地方：对一个关键词同时发起
//! 全部提供商的搜索，逐分支隔离失败，合并后随机打乱。

use futures::future;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::{
    error::{AggregatorError, Result},
    model::TrackRecord,
    providers::Provider,
};

/// 单个提供商在一次聚合调用中的贡献。
///
/// 失败不会跨越提供商边界传播：`failure` 只是一份被记录的原因，
/// 让测试（和日志）能回答"这个提供商为什么没贡献结果"，
/// 对外契约仍然是"失败等价于空列表"。
pub struct Contribution {
    /// 提供商名称。
    pub provider_name: &'static str,
    /// 该提供商返回的标准化记录。
    pub records: Vec<TrackRecord>,
    /// 如果该提供商失败了，这里保留原因；不会向上传播。
    pub failure: Option<AggregatorError>,
}

/// 在所有提供商中并发搜索，返回合并且随机打乱后的结果。
///
/// # 行为
/// 1. 空白关键词在任何扇出发生之前就被拒绝 (`EmptyQuery`)。
/// 2. 所有提供商同时启动，统一在汇合点等待；整体耗时约等于
///    最慢一家自己的超时，而不是各家之和。
/// 3. 任何一家失败/超时只会让它自己贡献为空，绝不中断聚合。
/// 4. 全员为空时返回 `NothingFound`——这是合法的空搜索结果，
///    必须与服务端错误区分开。
/// 5. 否则均匀打乱顺序返回：来源多样性优先于相关度排序，
///    不允许任何平台垄断排头。
pub async fn aggregate_search(
    providers: &[Box<dyn Provider>],
    query: &str,
) -> Result<Vec<TrackRecord>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AggregatorError::EmptyQuery);
    }

    info!("开始对关键词 '{query}' 在 {} 个提供商中聚合搜索...", providers.len());

    let contributions = fan_out(providers, query).await;

    let mut merged: Vec<TrackRecord> = contributions
        .into_iter()
        .flat_map(|c| c.records)
        .collect();

    if merged.is_empty() {
        info!("聚合搜索完毕，所有提供商都没有结果。");
        return Err(AggregatorError::NothingFound);
    }

    info!("聚合搜索完毕，收集到 {} 条结果。", merged.len());
    merged.shuffle(&mut rand::rng());
    Ok(merged)
}

/// 并发调用所有提供商，返回逐提供商的贡献列表。
///
/// 每个分支自行消化错误；这里只做汇合，不做额外的异常处理。
pub async fn fan_out(providers: &[Box<dyn Provider>], query: &str) -> Vec<Contribution> {
    let search_futures = providers
        .iter()
        .map(|provider| search_one(provider.as_ref(), query));
    future::join_all(search_futures).await
}

async fn search_one(provider: &dyn Provider, query: &str) -> Contribution {
    match provider.search_tracks(query).await {
        Ok(records) => {
            if !records.is_empty() {
                info!(
                    "提供商 '{}' 成功返回 {} 条结果。",
                    provider.name(),
                    records.len()
                );
            }
            Contribution {
                provider_name: provider.name(),
                records,
                failure: None,
            }
        }
        Err(e) => {
            warn!(
                "提供商 '{}' 的搜索失败: {}。该提供商按空贡献计。",
                provider.name(),
                e
            );
            Contribution {
                provider_name: provider.name(),
                records: vec![],
                failure: Some(e),
            }
        }
    }
}
