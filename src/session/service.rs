// src/session/service.rs

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::metrics::{MetricsSink, Session, SpendMetric};

enum SessionCommand {
    BidLatency { placement_id: String, latency: Duration },
    LoadLatency { placement_id: String, latency: Duration },
    Impression { placement_id: String },
    Click { placement_id: String },
    Close { placement_id: String },
    LoadFailed { placement_id: String },
    ShowFailed { placement_id: String },
    Spend(SpendMetric),
    Snapshot(oneshot::Sender<Session>),
}

/// 会话指标的写入句柄，可以随意 clone 给各个广告位
/// 所有写操作都进入同一个队列，由后台任务串行执行。
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::UnboundedSender<SessionCommand>,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCommand")
    }
}

impl SessionHandle {
    /// 记录一次 bid 请求，`Duration::ZERO` 表示复用队列里的 bid，不计入耗时采样
    pub fn record_bid_latency(&self, placement_id: &str, latency: Duration) {
        self.send(SessionCommand::BidLatency { placement_id: placement_id.to_string(), latency });
    }

    pub fn record_load_latency(&self, placement_id: &str, latency: Duration) {
        self.send(SessionCommand::LoadLatency { placement_id: placement_id.to_string(), latency });
    }

    pub fn record_impression(&self, placement_id: &str) {
        self.send(SessionCommand::Impression { placement_id: placement_id.to_string() });
    }

    pub fn record_click(&self, placement_id: &str) {
        self.send(SessionCommand::Click { placement_id: placement_id.to_string() });
    }

    pub fn record_close(&self, placement_id: &str) {
        self.send(SessionCommand::Close { placement_id: placement_id.to_string() });
    }

    pub fn record_load_failure(&self, placement_id: &str) {
        self.send(SessionCommand::LoadFailed { placement_id: placement_id.to_string() });
    }

    pub fn record_show_failure(&self, placement_id: &str) {
        self.send(SessionCommand::ShowFailed { placement_id: placement_id.to_string() });
    }

    pub fn record_spend(&self, metric: SpendMetric) {
        self.send(SessionCommand::Spend(metric));
    }

    /// 读取当前会话的副本；服务已关闭时返回 None
    pub async fn snapshot(&self) -> Option<Session> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(SessionCommand::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    fn send(&self, command: SessionCommand) {
        if self.sender.send(command).is_err() {
            debug!("session service stopped, dropping metric");
        }
    }
}

/// **会话服务**
/// 后台任务独占 `Session`，同时驱动时长刷新的定时器。
/// `teardown` 之后定时器保证不会再触发。
pub struct SessionService {
    handle: SessionHandle,
    cancel: CancellationToken,
    worker: JoinHandle<Session>,
}

impl SessionService {
    pub fn start(
        app_key: &str,
        reporting_url: &str,
        tick_interval: Duration,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let session = Session::new(app_key, reporting_url);
        info!(session_id = %session.id, app_key, "session started");

        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(Self::run(session, receiver, tick_interval, sink, cancel.clone()));

        Self {
            handle: SessionHandle { sender },
            cancel,
            worker,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// 停止定时器和写入队列，返回最终的会话数据
    pub async fn teardown(self) -> Option<Session> {
        self.cancel.cancel();
        match self.worker.await {
            Ok(session) => {
                info!(session_id = %session.id, duration_ms = session.duration.as_millis() as u64, "session closed");
                Some(session)
            }
            Err(e) => {
                tracing::error!(error = %e, "session worker failed");
                None
            }
        }
    }

    async fn run(
        mut session: Session,
        mut receiver: mpsc::UnboundedReceiver<SessionCommand>,
        tick_interval: Duration,
        sink: Arc<dyn MetricsSink>,
        cancel: CancellationToken,
    ) -> Session {
        let mut ticker = time::interval(tick_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                command = receiver.recv() => match command {
                    Some(command) => {
                        if apply(&mut session, command) {
                            sink.persist(&session);
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    session.refresh_duration(Utc::now());
                    sink.persist(&session);
                }
            }
        }

        // 把已经排队的写操作处理完
        receiver.close();
        while let Ok(command) = receiver.try_recv() {
            apply(&mut session, command);
        }
        session.refresh_duration(Utc::now());
        sink.persist(&session);
        session
    }
}

/// 返回 true 表示会话被修改
fn apply(session: &mut Session, command: SessionCommand) -> bool {
    match command {
        SessionCommand::BidLatency { placement_id, latency } => {
            let counters = session.counters_mut(&placement_id);
            counters.bid_requests = counters.bid_requests.saturating_add(1);
            if !latency.is_zero() {
                counters.bid_latency_samples = counters.bid_latency_samples.saturating_add(1);
                counters.bid_latency_ms_total = counters.bid_latency_ms_total.saturating_add(millis(latency));
            }
        }
        SessionCommand::LoadLatency { placement_id, latency } => {
            let counters = session.counters_mut(&placement_id);
            counters.loads = counters.loads.saturating_add(1);
            counters.load_latency_ms_total = counters.load_latency_ms_total.saturating_add(millis(latency));
        }
        SessionCommand::Impression { placement_id } => {
            let counters = session.counters_mut(&placement_id);
            counters.impressions = counters.impressions.saturating_add(1);
        }
        SessionCommand::Click { placement_id } => {
            let counters = session.counters_mut(&placement_id);
            counters.clicks = counters.clicks.saturating_add(1);
        }
        SessionCommand::Close { placement_id } => {
            let counters = session.counters_mut(&placement_id);
            counters.closes = counters.closes.saturating_add(1);
        }
        SessionCommand::LoadFailed { placement_id } => {
            let counters = session.counters_mut(&placement_id);
            counters.load_failures = counters.load_failures.saturating_add(1);
        }
        SessionCommand::ShowFailed { placement_id } => {
            let counters = session.counters_mut(&placement_id);
            counters.show_failures = counters.show_failures.saturating_add(1);
        }
        SessionCommand::Spend(metric) => session.spend.push(metric),
        SessionCommand::Snapshot(reply) => {
            let _ = reply.send(session.clone());
            return false;
        }
    }
    true
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::metrics::NoopMetricsSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        persisted: AtomicUsize,
    }

    impl MetricsSink for CountingSink {
        fn persist(&self, _session: &Session) {
            self.persisted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn concurrent_writers_are_serialized() {
        let service = SessionService::start("app", "https://r", Duration::from_secs(60), Arc::new(NoopMetricsSink));
        let mut tasks = Vec::new();
        for i in 0..8 {
            let handle = service.handle();
            tasks.push(tokio::spawn(async move {
                let placement = if i % 2 == 0 { "banner" } else { "inter" };
                for _ in 0..25 {
                    handle.record_impression(placement);
                    handle.record_click(placement);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let session = service.handle().snapshot().await.unwrap();
        assert_eq!(session.counters("banner").unwrap().impressions, 100);
        assert_eq!(session.counters("inter").unwrap().clicks, 100);
        service.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn zero_latency_requests_are_not_sampled() {
        let service = SessionService::start("app", "https://r", Duration::from_secs(60), Arc::new(NoopMetricsSink));
        let handle = service.handle();
        handle.record_bid_latency("p", Duration::from_millis(40));
        handle.record_bid_latency("p", Duration::ZERO);

        let session = service.teardown().await.unwrap();
        let counters = session.counters("p").unwrap();
        assert_eq!(counters.bid_requests, 2);
        assert_eq!(counters.bid_latency_samples, 1);
        assert_eq!(counters.bid_latency_ms_total, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_refreshes_and_stops_after_teardown() {
        let sink = Arc::new(CountingSink::default());
        let service = SessionService::start("app", "https://r", Duration::from_millis(100), sink.clone());
        let handle = service.handle();

        time::sleep(Duration::from_millis(350)).await;
        let ticks_before = sink.persisted.load(Ordering::SeqCst);
        assert!(ticks_before >= 3);

        service.teardown().await.unwrap();
        let after_teardown = sink.persisted.load(Ordering::SeqCst);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.persisted.load(Ordering::SeqCst), after_teardown);

        // 关闭后的写入被丢弃，不会 panic
        handle.record_click("p");
        assert!(handle.snapshot().await.is_none());
    }
}
