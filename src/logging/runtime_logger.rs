// src/logging/runtime_logger.rs

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing_appender::rolling;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::MakeWriter;
use serde_json::json;
use chrono::Utc;

use crate::logging::auction_log::AuctionLog;

const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// 单条日志消息
struct LogEntry {
    level: String,
    content: String,
}

/// 运行日志管理器（RuntimeLogger）
/// 按日志级别分文件写入，后台任务批量刷盘。
/// 竞价日志（AuctionLog）也走这里，CDP 增强失败等只记录不上抛的信息都能在文件里查到。
pub struct RuntimeLogger {
    sender: Sender<LogEntry>,
    cancel: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl RuntimeLogger {
    /// - `log_dir`: 日志目录
    /// - `file_prefix`: 文件前缀，最终文件名形如 `{prefix}_info.json`
    /// - `buffer_size`: 通道大小
    /// - `batch_size`: 每个级别累计多少条后写盘
    /// - `flush_interval`: 定时刷盘间隔（毫秒）
    pub fn new(
        log_dir: &str,
        file_prefix: &str,
        buffer_size: usize,
        batch_size: usize,
        flush_interval: u64,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let mut log_files = HashMap::new();
        for level in LEVELS {
            let file_name = format!("{}_{}.json", file_prefix, level.to_lowercase());
            log_files.insert(level.to_string(), Arc::new(rolling::hourly(log_dir, file_name)));
        }
        let cancel = CancellationToken::new();
        let writer = tokio::spawn(Self::background_log_writer(
            log_files,
            receiver,
            batch_size.max(1),
            flush_interval.max(1),
            cancel.clone(),
        ));
        Arc::new(Self {
            sender,
            cancel,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// 记录运行日志
    pub async fn log(&self, level: &str, message: &str) {
        let content = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "message": message,
        })
        .to_string();
        self.send(level, content).await;
    }

    /// 记录一轮竞价
    pub async fn log_auction(&self, entry: &AuctionLog) {
        match serde_json::to_string(entry) {
            Ok(content) => self.send(entry.level(), content).await,
            Err(e) => tracing::warn!(error = %e, "failed to serialize auction log"),
        }
    }

    async fn send(&self, level: &str, content: String) {
        if self.cancel.is_cancelled() {
            return;
        }
        let level = level.to_ascii_uppercase();
        let level = if LEVELS.contains(&level.as_str()) { level } else { "INFO".to_string() };
        if let Err(e) = self.sender.send(LogEntry { level, content }).await {
            tracing::warn!(error = %e, "runtime logger closed");
        }
    }

    /// 停止后台任务，剩余日志全部写盘后返回
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                tracing::error!(error = %e, "runtime log writer panicked");
            }
        }
    }

    async fn background_log_writer(
        log_files: HashMap<String, Arc<RollingFileAppender>>,
        mut receiver: Receiver<LogEntry>,
        batch_size: usize,
        flush_interval: u64,
        cancel: CancellationToken,
    ) {
        let mut buffers: HashMap<String, Vec<String>> = HashMap::new();
        let mut interval = time::interval(Duration::from_millis(flush_interval));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                entry = receiver.recv() => {
                    let Some(entry) = entry else { break };
                    let buffer = buffers.entry(entry.level.clone()).or_default();
                    buffer.push(entry.content);
                    if buffer.len() >= batch_size {
                        let lines = std::mem::take(buffer);
                        Self::write_logs_to_disk(log_files.get(&entry.level), lines).await;
                    }
                },
                _ = interval.tick() => {
                    Self::flush_all(&log_files, &mut buffers).await;
                }
            }
        }

        receiver.close();
        while let Ok(entry) = receiver.try_recv() {
            buffers.entry(entry.level).or_default().push(entry.content);
        }
        Self::flush_all(&log_files, &mut buffers).await;
    }

    async fn flush_all(
        log_files: &HashMap<String, Arc<RollingFileAppender>>,
        buffers: &mut HashMap<String, Vec<String>>,
    ) {
        for (level, buffer) in buffers.iter_mut() {
            if !buffer.is_empty() {
                let lines = std::mem::take(buffer);
                Self::write_logs_to_disk(log_files.get(level), lines).await;
            }
        }
    }

    async fn write_logs_to_disk(file: Option<&Arc<RollingFileAppender>>, lines: Vec<String>) {
        let Some(file) = file.cloned() else { return };
        let content = lines.join("\n") + "\n";
        let result = task::spawn_blocking(move || {
            let mut writer = file.make_writer();
            writer.write_all(content.as_bytes())
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "failed to write runtime logs"),
            Err(e) => tracing::error!(error = %e, "runtime log write task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_flushes_pending_entries() {
        let dir = std::env::temp_dir().join(format!("runtime-logger-{}", uuid::Uuid::new_v4()));
        let dir_str = dir.to_string_lossy().to_string();
        let logger = RuntimeLogger::new(&dir_str, "sdk", 16, 100, 60_000);

        logger.log("info", "session started").await;
        let mut auction = AuctionLog::new("home_banner", "req-1");
        auction.set_failure("no_bid");
        logger.log_auction(&auction).await;
        logger.shutdown().await;

        let mut contents = String::new();
        for entry in std::fs::read_dir(&dir).unwrap() {
            contents.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        assert!(contents.contains("session started"));
        assert!(contents.contains("\"status\":\"no_bid\""));

        // 关闭后再写不会报错
        logger.log("INFO", "ignored").await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
