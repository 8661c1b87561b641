use serde::{Serialize, Deserialize};
use chrono::Utc;

use crate::bidding::auction_client::EnrichmentOutcome;

/// **单轮竞价日志**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuctionLog {
    pub timestamp: String,                // 记录时间
    pub log_type: String,                 // 固定为 "auction_cycle"
    pub placement_id: String,             // 广告位
    pub request_id: String,               // BidRequest.id
    pub token_networks: Vec<String>,      // 成功拿到 token 的网络
    pub enrichment: EnrichmentOutcome,    // CDP 增强结果
    pub status: String,                   // "success" / "no_bid" / "timeout" ...
    pub bid_count: usize,                 // 返回的 bid 数量
    pub latency_ms: u128,                 // 竞价耗时
    pub winning_network: Option<String>,  // rank 0 的网络
    pub winning_price: f64,               // rank 0 的价格
}

impl AuctionLog {
    pub fn new(placement_id: &str, request_id: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            log_type: "auction_cycle".to_string(),
            placement_id: placement_id.to_string(),
            request_id: request_id.to_string(),
            token_networks: Vec::new(),
            enrichment: EnrichmentOutcome::Skipped,
            status: "failure".to_string(),  // 默认失败，后续更新
            bid_count: 0,
            latency_ms: 0,
            winning_network: None,
            winning_price: 0.0,
        }
    }

    pub fn set_winner(&mut self, network: &str, price: f64, bid_count: usize) {
        self.status = "success".to_string();
        self.winning_network = Some(network.to_string());
        self.winning_price = price;
        self.bid_count = bid_count;
    }

    pub fn set_failure(&mut self, reason: &str) {
        self.status = reason.to_string();
    }

    /// 日志级别：失败记为 WARN
    pub fn level(&self) -> &'static str {
        if self.status == "success" { "INFO" } else { "WARN" }
    }
}
