// src/reporting/event_reporter.rs

use chrono::Utc;
use reqwest::Url;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::TrackingError;
use crate::http_client::RetryingHttpClient;

pub const AUCTION_PRICE_MACRO: &str = "${AUCTION_PRICE}";
pub const PAYLOAD_MACRO: &str = "${PAYLOAD}";
pub const TIMESTAMP_MACRO: &str = "${TIMESTAMP}";

/// 上报事件类型，对应 tracking 接口的 `t` 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingEvent {
    Impression,
    Win,
    Click,
    PriceNotify,
    CustomPixel,
}

impl TrackingEvent {
    fn as_param(&self) -> &'static str {
        match self {
            TrackingEvent::Impression => "imp",
            TrackingEvent::Win => "win",
            TrackingEvent::Click => "click",
            TrackingEvent::PriceNotify => "price",
            TrackingEvent::CustomPixel => "pixel",
        }
    }
}

impl fmt::Display for TrackingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// **广告事件上报**
/// 所有操作都是 fire-and-forget：立即返回，真正的请求在独立任务里执行，
/// 失败只记日志。返回的 `JoinHandle` 可以被 await，丢弃它不会取消上报。
/// 不做去重，同一个 bid 调两次就会上报两次。
#[derive(Clone)]
pub struct EventReporter {
    http: Arc<RetryingHttpClient>,
    tracking_endpoint: String,
}

impl EventReporter {
    pub fn new(http: Arc<RetryingHttpClient>, tracking_endpoint: &str) -> Self {
        Self {
            http,
            tracking_endpoint: tracking_endpoint.to_string(),
        }
    }

    pub fn impression(&self, bid_id: &str) -> JoinHandle<()> {
        self.track(bid_id, TrackingEvent::Impression)
    }

    pub fn win(&self, bid_id: &str) -> JoinHandle<()> {
        self.track(bid_id, TrackingEvent::Win)
    }

    pub fn click(&self, bid_id: &str) -> JoinHandle<()> {
        self.track(bid_id, TrackingEvent::Click)
    }

    /// 替换 `${AUCTION_PRICE}` 后请求第三方 win / billing 地址
    pub fn price_macro_notify(&self, price: f64, template_url: &str) -> JoinHandle<()> {
        let url = substitute_price(template_url, price);
        self.dispatch(url, TrackingEvent::PriceNotify)
    }

    /// 自定义像素：`${PAYLOAD}` 替换为 URL 编码后的 payload，`${TIMESTAMP}` 为毫秒时间戳
    pub fn custom_pixel(&self, url_template: &str, encoded_payload: &str) -> JoinHandle<()> {
        let payload: String = url::form_urlencoded::byte_serialize(encoded_payload.as_bytes()).collect();
        let url = url_template
            .replace(PAYLOAD_MACRO, &payload)
            .replace(TIMESTAMP_MACRO, &Utc::now().timestamp_millis().to_string());
        self.dispatch(url, TrackingEvent::CustomPixel)
    }

    fn track(&self, bid_id: &str, event: TrackingEvent) -> JoinHandle<()> {
        let url = tracking_url(&self.tracking_endpoint, bid_id, event);
        self.deliver(url, event)
    }

    fn dispatch(&self, raw_url: String, event: TrackingEvent) -> JoinHandle<()> {
        self.deliver(parse_tracking_url(&raw_url), event)
    }

    fn deliver(&self, url: Result<Url, TrackingError>, event: TrackingEvent) -> JoinHandle<()> {
        let http = self.http.clone();
        tokio::spawn(async move {
            let url = match url {
                Ok(url) => url,
                Err(e) => {
                    warn!(event = %event, error = %e, "skipping tracking call");
                    return;
                }
            };
            match http.get(url.clone()).await {
                Ok(()) => debug!(event = %event, url = %url, "tracking delivered"),
                Err(e) => warn!(event = %event, url = %url, error = %e, "tracking dropped"),
            }
        })
    }
}

/// tracking 接口地址：`{endpoint}?b={bid_id}&t={event}`
fn tracking_url(endpoint: &str, bid_id: &str, event: TrackingEvent) -> Result<Url, TrackingError> {
    let url = Url::parse_with_params(endpoint, &[("b", bid_id), ("t", event.as_param())])
        .map_err(|_| TrackingError::MalformedUrl(endpoint.to_string()))?;
    parse_tracking_url(url.as_str())
}

/// 价格宏替换，价格按原样输出
pub fn substitute_price(template_url: &str, price: f64) -> String {
    template_url.replace(AUCTION_PRICE_MACRO, &price.to_string())
}

fn parse_tracking_url(raw: &str) -> Result<Url, TrackingError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(TrackingError::MalformedUrl(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_macro_uses_literal_clearing_price() {
        assert_eq!(
            substitute_price("https://win.example/n?p=${AUCTION_PRICE}&q=${AUCTION_PRICE}", 1.5),
            "https://win.example/n?p=1.5&q=1.5"
        );
        assert_eq!(substitute_price("https://win.example/n", 0.9), "https://win.example/n");
    }

    #[test]
    fn tracking_url_keeps_bid_and_event_params() {
        let url = tracking_url("https://track.example/t", "bid 7", TrackingEvent::Win).unwrap();
        assert_eq!(url.as_str(), "https://track.example/t?b=bid+7&t=win");
    }

    #[test]
    fn malformed_endpoint_is_rejected_not_stripped() {
        for endpoint in ["not a url", "", "ftp://track.example/t"] {
            let err = tracking_url(endpoint, "bid-1", TrackingEvent::Impression).unwrap_err();
            assert!(matches!(err, TrackingError::MalformedUrl(ref url) if url.starts_with(endpoint)));
        }
    }

    #[tokio::test]
    async fn malformed_endpoint_task_completes_quietly() {
        let http = Arc::new(RetryingHttpClient::new(3, std::time::Duration::from_millis(1), std::time::Duration::from_millis(50)));
        let reporter = EventReporter::new(http, "not a url");
        reporter.impression("bid-1").await.unwrap();
        reporter.click("bid-1").await.unwrap();
    }

    #[test]
    fn rejects_malformed_and_non_http_urls() {
        assert!(parse_tracking_url("ht!tp://bad url/0.9").is_err());
        assert!(parse_tracking_url("1.5").is_err());
        assert!(parse_tracking_url("mailto:ads@example.com").is_err());
        assert!(parse_tracking_url("https://track.example/t?b=1").is_ok());
    }
}
