// src/mock_server.rs

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{serve, Json, Router};
use rand::Rng;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::adapters::NetworkId;
use crate::model::placements::AdType;
use crate::openrtb::request::BidRequest;
use crate::openrtb::response::{AuctionResponse, Bid, BidExt, SeatBid};

/// CDP 接口的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdpMode {
    /// 追加一个定向参数后原样返回
    Enrich,
    /// 返回 500
    Fail,
}

/// auction 接口的行为
#[derive(Debug, Clone)]
pub enum AuctionMode {
    /// 返回固定的 bid 列表
    Fixed(Vec<Bid>),
    /// 按底价随机出价，demo 使用
    Random,
    /// 返回 500
    Fail,
}

/// Mock 后端的共享状态，测试里用来断言请求次数
pub struct MockState {
    auction_mode: Mutex<AuctionMode>,
    cdp_mode: Mutex<CdpMode>,
    track_failures: AtomicUsize,
    auction_hits: AtomicUsize,
    cdp_hits: AtomicUsize,
    last_auction_request: Mutex<Option<BidRequest>>,
    track_queries: Mutex<Vec<String>>,
    notify_queries: Mutex<Vec<String>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    fn new(mode: AuctionMode) -> Self {
        Self {
            auction_mode: Mutex::new(mode),
            cdp_mode: Mutex::new(CdpMode::Enrich),
            track_failures: AtomicUsize::new(0),
            auction_hits: AtomicUsize::new(0),
            cdp_hits: AtomicUsize::new(0),
            last_auction_request: Mutex::new(None),
            track_queries: Mutex::new(Vec::new()),
            notify_queries: Mutex::new(Vec::new()),
        }
    }
}

/// 进程内的 mock 竞价 / CDP / 打点服务
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// 监听随机端口
    pub async fn start(mode: AuctionMode) -> std::io::Result<Self> {
        Self::start_on("127.0.0.1:0", mode).await
    }

    pub async fn start_on(addr: &str, mode: AuctionMode) -> std::io::Result<Self> {
        let state = Arc::new(MockState::new(mode));
        let app = Router::new()
            .route("/auction", post(handle_auction))
            .route("/cdp", post(handle_cdp))
            .route("/track", get(handle_track))
            .route("/notify", get(handle_notify))
            .with_state(state.clone());

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("Mock backend running at http://{}", addr);
        let handle = tokio::spawn(async move {
            if let Err(e) = serve(listener, app).await {
                error!(error = %e, "mock backend stopped");
            }
        });
        Ok(Self { addr, state, handle })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn auction_url(&self) -> String {
        self.url("/auction")
    }

    pub fn cdp_url(&self) -> String {
        self.url("/cdp")
    }

    pub fn track_url(&self) -> String {
        self.url("/track")
    }

    /// 带价格宏的第三方通知地址
    pub fn notify_template(&self, kind: &str) -> String {
        format!("{}?kind={}&price=${{AUCTION_PRICE}}", self.url("/notify"), kind)
    }

    pub fn set_auction_mode(&self, mode: AuctionMode) {
        *lock(&self.state.auction_mode) = mode;
    }

    pub fn set_cdp_mode(&self, mode: CdpMode) {
        *lock(&self.state.cdp_mode) = mode;
    }

    /// 接下来的 `n` 次打点返回 500
    pub fn fail_next_tracks(&self, n: usize) {
        self.state.track_failures.store(n, Ordering::SeqCst);
    }

    pub fn auction_hits(&self) -> usize {
        self.state.auction_hits.load(Ordering::SeqCst)
    }

    pub fn cdp_hits(&self) -> usize {
        self.state.cdp_hits.load(Ordering::SeqCst)
    }

    pub fn last_auction_request(&self) -> Option<BidRequest> {
        lock(&self.state.last_auction_request).clone()
    }

    /// 收到的打点请求（含失败的尝试），元素为原始 query string
    pub fn track_queries(&self) -> Vec<String> {
        lock(&self.state.track_queries).clone()
    }

    pub fn notify_queries(&self) -> Vec<String> {
        lock(&self.state.notify_queries).clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 构造一个 bid，测试和 demo 共用
pub fn mock_bid(id: &str, rank: u32, price: f64, network: NetworkId) -> Bid {
    Bid {
        id: id.to_string(),
        price,
        adm: Some(format!("<html><body>Mock {} Ad {}</body></html>", network, id)),
        nurl: None,
        burl: None,
        dealid: None,
        ext: BidExt {
            adapter: network.to_string(),
            rank,
            adapter_extras: BTreeMap::new(),
        },
    }
}

async fn handle_auction(
    State(state): State<Arc<MockState>>,
    Json(request): Json<BidRequest>,
) -> Result<Json<AuctionResponse>, StatusCode> {
    state.auction_hits.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_auction_request) = Some(request.clone());
    let mode = lock(&state.auction_mode).clone();

    let bids = match mode {
        AuctionMode::Fixed(bids) => bids,
        AuctionMode::Random => random_bids(&request).await,
        AuctionMode::Fail => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    Ok(Json(AuctionResponse {
        id: request.id.clone(),
        seatbid: vec![SeatBid { seat: Some("mock_seat".to_string()), bid: bids }],
        cur: Some("USD".to_string()),
    }))
}

/// 模拟竞价：延迟 20~80ms，按广告类型在底价上乘一个随机系数
async fn random_bids(request: &BidRequest) -> Vec<Bid> {
    let delay_ms = rand::thread_rng().gen_range(20..80);
    sleep(Duration::from_millis(delay_ms)).await;

    let floor = request.floor().unwrap_or(0.0).max(0.01);
    let ad_type = request.ad_type().unwrap_or(AdType::Banner);
    let networks: Vec<NetworkId> = if request.ext.adapters.is_empty() {
        vec![NetworkId::AppLovin, NetworkId::UnityAds, NetworkId::Meta]
    } else {
        request.ext.adapters.keys().copied().collect()
    };

    let mut rng = rand::thread_rng();
    let mut bids: Vec<Bid> = networks
        .iter()
        .enumerate()
        .map(|(i, network)| {
            let multiplier = match ad_type {
                AdType::Rewarded => rng.gen_range(1.0..2.5),
                AdType::Interstitial => rng.gen_range(1.0..2.0),
                AdType::Native => rng.gen_range(0.8..2.0),
                AdType::Banner => rng.gen_range(0.8..1.2),
            };
            let price = (floor * multiplier * 100.0).round() / 100.0;
            mock_bid(&format!("bid-{}-{}", request.id, i), 0, price, *network)
        })
        .collect();

    // 价格高的 rank 小
    bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
    for (rank, bid) in bids.iter_mut().enumerate() {
        bid.ext.rank = rank as u32;
    }
    bids
}

async fn handle_cdp(
    State(state): State<Arc<MockState>>,
    Json(mut request): Json<BidRequest>,
) -> Result<Json<BidRequest>, StatusCode> {
    state.cdp_hits.fetch_add(1, Ordering::SeqCst);
    match *lock(&state.cdp_mode) {
        CdpMode::Fail => Err(StatusCode::INTERNAL_SERVER_ERROR),
        CdpMode::Enrich => {
            request
                .targeting
                .params
                .insert("cdp_segment".to_string(), "high_value".to_string());
            Ok(Json(request))
        }
    }
}

async fn handle_track(State(state): State<Arc<MockState>>, RawQuery(query): RawQuery) -> StatusCode {
    lock(&state.track_queries).push(query.unwrap_or_default());
    let failing = state
        .track_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn handle_notify(State(state): State<Arc<MockState>>, RawQuery(query): RawQuery) -> StatusCode {
    lock(&state.notify_queries).push(query.unwrap_or_default());
    StatusCode::OK
}
