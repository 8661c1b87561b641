// src/main.rs

use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

mod demo_adapters;

use mediation_bidder::adapters::{initialize_networks, AdNetworkFactories};
use mediation_bidder::bidding::{AdEvent, AuctionClient, BidRequestBuilder, BiddingContext, PlacementLoader};
use mediation_bidder::config::{ConfigSource, FileConfigSource, SdkConfig, StaticConfigSource};
use mediation_bidder::http_client::RetryingHttpClient;
use mediation_bidder::logging::{init_tracing, RuntimeLogger};
use mediation_bidder::mock_server::{AuctionMode, MockBackend};
use mediation_bidder::model::placements::{AdType, Placement};
use mediation_bidder::model::privacy::PrivacySettings;
use mediation_bidder::model::targeting::{AppInfo, Targeting};
use mediation_bidder::reporting::EventReporter;
use mediation_bidder::session::{NoopMetricsSink, SessionService};

#[derive(Parser, Debug)]
#[command(author = "whiteCcinn", version = "1.0", about = "Mediation SDK bidding core demo")]
struct CliArgs {
    /// SDK 配置文件，不指定时使用本地 mock 后端
    #[arg(short, long)]
    config: Option<String>,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    /// mock 后端端口
    #[arg(short, long, default_value_t = 9001)]
    port: u16,
    #[arg(long)]
    placement: Option<String>,
    /// 每个广告位加载次数
    #[arg(long, default_value_t = 3)]
    loads: usize,
}

fn demo_config(backend: &MockBackend) -> SdkConfig {
    SdkConfig {
        app_key: "demo-app-key".to_string(),
        publisher_id: "demo-publisher".to_string(),
        user_id: uuid::Uuid::new_v4().to_string(),
        app: AppInfo {
            bundle: "com.example.demo".to_string(),
            version: Some("1.0.0".to_string()),
            os: Some("android".to_string()),
        },
        auction_endpoint: backend.auction_url(),
        cdp_endpoint: backend.cdp_url(),
        tracking_endpoint: backend.track_url(),
        http_timeout_ms: 2000,
        tracking_attempts: 3,
        tracking_backoff_ms: 1000,
        session_tick_ms: 1000,
        tmax_ms: Some(1500),
        privacy: PrivacySettings::default().with_consent(true),
        targeting: Targeting::default(),
        networks: HashMap::new(),
        placements: vec![
            Placement::new("home_banner", AdType::Banner, 0.2),
            Placement::new("level_end", AdType::Interstitial, 1.0),
            Placement::new("extra_life", AdType::Rewarded, 2.5),
        ],
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // 初始化全局 tracing 日志
    let _guard = init_tracing(&args.log_dir)?;
    let runtime_logger = RuntimeLogger::new(&args.log_dir, "runtime", 1000, 100, 1000);
    runtime_logger.log("INFO", "mediation demo is starting...").await;

    // 启动 mock 后端（auction / cdp / track）
    let backend = MockBackend::start_on(&format!("127.0.0.1:{}", args.port), AuctionMode::Random).await?;

    let source: Box<dyn ConfigSource> = match &args.config {
        Some(path) => Box::new(FileConfigSource::new(path)),
        None => Box::new(StaticConfigSource(demo_config(&backend))),
    };
    let config = source.load()?;
    info!(auction = %config.auction_endpoint, cdp = ?config.cdp_endpoint(), "config loaded");

    // 注册并初始化广告网络
    let factories = AdNetworkFactories::resolve(&demo_adapters::catalog());
    let readiness = initialize_networks(&factories, &config.networks, &config.privacy).await;
    info!(ready = ?readiness.ready_networks(), "ad networks ready");

    let session = SessionService::start(
        &config.app_key,
        &config.tracking_endpoint,
        config.session_tick(),
        Arc::new(NoopMetricsSink),
    );

    let http = Arc::new(RetryingHttpClient::new(
        config.tracking_attempts,
        config.tracking_backoff(),
        config.http_timeout(),
    ));
    let reporter = EventReporter::new(http, &config.tracking_endpoint);

    let ctx = BiddingContext::new(
        &config.publisher_id,
        &config.user_id,
        BidRequestBuilder::new(config.app.clone(), config.privacy, config.targeting.clone())
            .with_tmax(config.tmax_ms),
        AuctionClient::from_config(&config),
        factories,
    )
    .with_readiness(readiness)
    .with_session(session.handle())
    .with_runtime_logger(runtime_logger.clone());

    let placements: Vec<Placement> = config
        .placements
        .iter()
        .filter(|p| args.placement.as_deref().map_or(true, |id| id == p.placement_id))
        .cloned()
        .collect();

    let demo = async {
        for placement in placements {
            let (loader, mut events) = PlacementLoader::new(placement, ctx.clone(), reporter.clone());
            for _ in 0..args.loads {
                loader.load();
                match events.recv().await {
                    Some(AdEvent::Loaded(ad)) => {
                        info!(ad = ?ad, latency_ms = ad.served.latency.as_millis() as u64, "showing ad");
                        loader.report_shown(&ad);
                        loader.report_closed();
                    }
                    Some(AdEvent::FailedToLoad) => warn!("failed to load"),
                    None => break,
                }
            }
            loader.destroy();
        }
    };

    tokio::select! {
        _ = demo => {}
        _ = signal::ctrl_c() => {
            runtime_logger.log("INFO", "Shutting down gracefully...").await;
        }
    }

    if let Some(final_session) = session.teardown().await {
        let summary = serde_json::to_string(&final_session)?;
        runtime_logger.log("INFO", &summary).await;
        info!(session_id = %final_session.id, spend = final_session.total_spend(), "session summary");
    }
    runtime_logger.shutdown().await;
    drop(backend);
    Ok(())
}
