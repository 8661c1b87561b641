// src/bidding/auction_client.rs

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::SdkConfig;
use crate::error::{EnrichmentError, TransportError};
use crate::openrtb::request::BidRequest;
use crate::openrtb::response::AuctionResponse;

/// CDP 增强的结果，写进竞价日志
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    /// 没有配置 CDP 地址
    Skipped,
    Applied,
    /// 失败后使用原始请求
    Failed(String),
}

/// **竞价客户端**
/// 负责和竞价服务、CDP 服务之间的 HTTP 交互。
pub struct AuctionClient {
    client: Client,
    auction_url: String,
    cdp_url: Option<String>,
    timeout: Duration,
}

impl AuctionClient {
    pub fn new(auction_url: &str, cdp_url: &str, timeout: Duration) -> Self {
        let cdp_url = cdp_url.trim();
        Self {
            client: Client::new(),
            auction_url: auction_url.to_string(),
            cdp_url: (!cdp_url.is_empty()).then(|| cdp_url.to_string()),
            timeout,
        }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(
            &config.auction_endpoint,
            config.cdp_endpoint().unwrap_or_default(),
            config.http_timeout(),
        )
    }

    pub fn cdp_enabled(&self) -> bool {
        self.cdp_url.is_some()
    }

    /// 发起竞价：一次 POST，HTTP 或解析失败都返回错误
    pub async fn start_auction(&self, request: &BidRequest) -> Result<AuctionResponse, TransportError> {
        let response: AuctionResponse = self.post_json(&self.auction_url, request).await?;
        debug!(request_id = %request.id, bids = response.bid_count(), "auction response received");
        Ok(response)
    }

    /// CDP 增强：把请求发给 CDP 服务，返回增强后的请求
    pub async fn start_cdp_flow(&self, request: &BidRequest) -> Result<BidRequest, EnrichmentError> {
        let Some(cdp_url) = self.cdp_url.as_deref() else {
            return Ok(request.clone());
        };
        let enriched: BidRequest = self.post_json(cdp_url, request).await?;
        Ok(enriched)
    }

    /// 尝试 CDP 增强，失败时记录日志并退回原始请求，绝不阻断竞价
    pub async fn enrich(&self, request: BidRequest) -> (BidRequest, EnrichmentOutcome) {
        if !self.cdp_enabled() {
            return (request, EnrichmentOutcome::Skipped);
        }
        match self.start_cdp_flow(&request).await {
            Ok(enriched) => (enriched, EnrichmentOutcome::Applied),
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "cdp enrichment failed, using original request");
                (request, EnrichmentOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = Url::parse(url).map_err(|_| TransportError::InvalidUrl(url.to_string()))?;
        let exchange = async {
            let resp = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(TransportError::Status(resp.status().as_u16()));
            }
            let bytes = resp.bytes().await?;
            Ok(serde_json::from_slice::<T>(&bytes)?)
        };
        match timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidding::request_builder::{BidRequestBuilder, BidRequestParams};
    use crate::model::placements::AdType;
    use crate::openrtb::request::AdapterTokens;

    fn request() -> BidRequest {
        BidRequestBuilder::default().create_bid_request(BidRequestParams {
            ad_unit_id: "home_banner".to_string(),
            stored_impression_id: "imp-1".to_string(),
            ad_type: AdType::Banner,
            deal_id: None,
            floor: 0.1,
            publisher_id: "pub-1".to_string(),
            user_id: "user-1".to_string(),
            adapter_tokens: AdapterTokens::new(),
            native_requirements: None,
        })
    }

    #[tokio::test]
    async fn malformed_auction_url_is_rejected_before_sending() {
        let client = AuctionClient::new("not a url", "", Duration::from_secs(1));
        let err = client.start_auction(&request()).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(ref url) if url == "not a url"));
    }

    #[tokio::test]
    async fn malformed_cdp_url_falls_back_to_original_request() {
        let client = AuctionClient::new("http://127.0.0.1:1/auction", "::cdp::", Duration::from_secs(1));
        assert!(client.cdp_enabled());
        let original = request();
        let (sent, outcome) = client.enrich(original.clone()).await;
        assert_eq!(sent, original);
        assert!(matches!(outcome, EnrichmentOutcome::Failed(ref reason) if reason.contains("invalid url")));
    }

    #[tokio::test]
    async fn empty_cdp_url_skips_enrichment() {
        let client = AuctionClient::new("http://127.0.0.1:1/auction", "  ", Duration::from_secs(1));
        let (_, outcome) = client.enrich(request()).await;
        assert_eq!(outcome, EnrichmentOutcome::Skipped);
    }
}
