// src/bidding/tokens.rs

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::{BidTokenSource, NetworkId};
use crate::openrtb::request::AdapterTokens;

/// 并发获取所有网络的 bidder token
/// 等所有来源都结束（成功或失败）才返回；失败的网络不会出现在结果里，也不会重试。
pub async fn aggregate_tokens(sources: &HashMap<NetworkId, Arc<dyn BidTokenSource>>) -> AdapterTokens {
    let mut tasks: FuturesUnordered<_> = sources
        .iter()
        .map(|(network, source)| {
            let network = *network;
            let source = Arc::clone(source);
            async move {
                let joined = tokio::spawn(async move { source.token().await }).await;
                (network, joined)
            }
        })
        .collect();

    let mut tokens = AdapterTokens::new();
    while let Some((network, joined)) = tasks.next().await {
        match joined {
            Ok(Ok(bundle)) => {
                debug!(network = %network, keys = bundle.len(), "bid token collected");
                tokens.insert(network, bundle);
            }
            Ok(Err(e)) => warn!(network = %network, error = %e, "bid token source failed"),
            Err(e) => warn!(network = %network, error = %e, "bid token task aborted"),
        }
    }
    tokens
}
