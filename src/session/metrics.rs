// src/session/metrics.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// 单个广告位的累计指标，会话内只增不减
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PerformanceCounters {
    pub bid_requests: u64,
    pub bid_latency_samples: u64,
    pub bid_latency_ms_total: u64,
    pub loads: u64,
    pub load_latency_ms_total: u64,
    pub impressions: u64,
    pub clicks: u64,
    pub closes: u64,
    pub load_failures: u64,
    pub show_failures: u64,
}

impl PerformanceCounters {
    /// 只统计新一轮竞价测得的耗时
    pub fn average_bid_latency_ms(&self) -> Option<f64> {
        (self.bid_latency_samples > 0)
            .then(|| self.bid_latency_ms_total as f64 / self.bid_latency_samples as f64)
    }
}

/// 一次展示产生的花费
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpendMetric {
    pub placement_id: String,
    pub network: String,
    pub bid_id: String,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

/// SDK 会话，每次初始化创建一个
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub app_key: String,
    pub reporting_url: String,
    /// 定时采样的运行时长（墙钟时间）
    pub duration: Duration,
    pub spend: Vec<SpendMetric>,
    pub placements: BTreeMap<String, PerformanceCounters>,
}

impl Session {
    pub fn new(app_key: &str, reporting_url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            app_key: app_key.to_string(),
            reporting_url: reporting_url.to_string(),
            duration: Duration::ZERO,
            spend: Vec::new(),
            placements: BTreeMap::new(),
        }
    }

    pub fn counters(&self, placement_id: &str) -> Option<&PerformanceCounters> {
        self.placements.get(placement_id)
    }

    pub(crate) fn counters_mut(&mut self, placement_id: &str) -> &mut PerformanceCounters {
        self.placements.entry(placement_id.to_string()).or_default()
    }

    /// 按墙钟时间刷新时长，进程挂起期间的时间也会计入
    pub(crate) fn refresh_duration(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.started_at).to_std().unwrap_or_default();
        if elapsed > self.duration {
            self.duration = elapsed;
        }
    }

    pub fn total_spend(&self) -> f64 {
        self.spend.iter().map(|s| s.price).sum()
    }
}

/// 会话持久化（外部实现）
pub trait MetricsSink: Send + Sync {
    fn persist(&self, session: &Session);
}

pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn persist(&self, _session: &Session) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_never_moves_backwards() {
        let mut session = Session::new("app", "https://report.example");
        session.refresh_duration(session.started_at + chrono::Duration::seconds(5));
        assert_eq!(session.duration, Duration::from_secs(5));
        // 时钟回拨
        session.refresh_duration(session.started_at + chrono::Duration::seconds(2));
        assert_eq!(session.duration, Duration::from_secs(5));
    }

    #[test]
    fn average_latency_ignores_empty_counters() {
        let mut counters = PerformanceCounters::default();
        assert_eq!(counters.average_bid_latency_ms(), None);
        counters.bid_latency_samples = 2;
        counters.bid_latency_ms_total = 30;
        assert_eq!(counters.average_bid_latency_ms(), Some(15.0));
    }
}
