// src/http_client.rs

use reqwest::{Client, Url};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::error::{TrackingError, TransportError};

/// 带固定间隔重试的 GET 客户端，打点上报共用
/// 重试间隔是线性的：每两次尝试之间等待同样的 `backoff`。
#[derive(Clone, Debug)]
pub struct RetryingHttpClient {
    client: Client,
    attempts: u32,
    backoff: Duration,
    timeout: Duration,
}

impl RetryingHttpClient {
    pub fn new(attempts: u32, backoff: Duration, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            attempts: attempts.max(1),
            backoff,
            timeout,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 发送 GET，非 2xx 也视为失败并重试
    pub async fn get(&self, url: Url) -> Result<(), TrackingError> {
        let mut last_error = TransportError::Timeout;
        for attempt in 1..=self.attempts {
            match self.get_once(url.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(url = %url, attempt, error = %e, "tracking attempt failed");
                    last_error = e;
                }
            }
            if attempt < self.attempts {
                sleep(self.backoff).await;
            }
        }
        Err(TrackingError::Exhausted { attempts: self.attempts, source: last_error })
    }

    async fn get_once(&self, url: Url) -> Result<(), TransportError> {
        match timeout(self.timeout, self.client.get(url).send()).await {
            Ok(Ok(resp)) if resp.status().is_success() => Ok(()),
            Ok(Ok(resp)) => Err(TransportError::Status(resp.status().as_u16())),
            Ok(Err(e)) => Err(TransportError::Http(e)),
            Err(_) => Err(TransportError::Timeout),
        }
    }
}
