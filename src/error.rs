// src/error.rs

use thiserror::Error;

use crate::adapters::NetworkId;

/// **竞价核心对外暴露的错误**
/// 只有拿不到 bid 的情况才会传给调用方，其它错误都在各自组件内部消化。
#[derive(Error, Debug)]
pub enum BiddingError {
    /// 新一轮竞价没有返回任何可用 bid
    #[error("no bid for placement {placement_id}")]
    NoBid { placement_id: String },

    /// 竞价请求的 HTTP 或解析失败
    #[error("auction transport failed: {0}")]
    Transport(#[from] TransportError),

    /// 所属广告位已经销毁，本次请求被丢弃
    #[error("bid request cancelled")]
    Cancelled,
}

impl BiddingError {
    /// 日志里使用的失败原因
    pub fn reason(&self) -> &'static str {
        match self {
            BiddingError::NoBid { .. } => "no_bid",
            BiddingError::Transport(TransportError::Timeout) => "timeout",
            BiddingError::Transport(TransportError::Decode(_)) => "json_parse_error",
            BiddingError::Transport(_) => "invalid_response",
            BiddingError::Cancelled => "cancelled",
        }
    }
}

/// HTTP 层错误
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url `{0}`")]
    InvalidUrl(String),
}

/// CDP 数据增强失败，调用方永远看不到，只会回退到原始请求
#[derive(Error, Debug)]
#[error("cdp enrichment failed: {0}")]
pub struct EnrichmentError(#[from] pub TransportError);

/// 单个 bidder token 来源失败
#[derive(Error, Debug)]
#[error("token source for {network} failed: {reason}")]
pub struct TokenSourceError {
    pub network: NetworkId,
    pub reason: String,
}

/// 打点上报在重试耗尽后的错误
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("malformed tracking url `{0}`")]
    MalformedUrl(String),

    #[error("tracking failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

/// 广告网络初始化失败
#[derive(Error, Debug)]
#[error("adapter {network} failed to initialize: {reason}")]
pub struct AdapterError {
    pub network: NetworkId,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
