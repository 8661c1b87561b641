// src/bidding/placement.rs

use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{AdUnit, AdUnitBundle};
use crate::bidding::context::BiddingContext;
use crate::bidding::waterfall::{BidWaterfall, ServedBid, WaterfallState};
use crate::model::placements::Placement;
use crate::reporting::EventReporter;
use crate::session::SpendMetric;

/// 加载成功的广告
pub struct LoadedAd {
    pub unit: Box<dyn AdUnit>,
    pub served: ServedBid,
    pub load_latency: Duration,
}

impl fmt::Debug for LoadedAd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedAd")
            .field("bid_id", &self.served.bid.id)
            .field("network", &self.unit.network())
            .field("price", &self.served.bid.price)
            .finish()
    }
}

/// 广告位事件，替代弱引用回调
/// 调用方只会看到成功或者一个不区分原因的失败。
#[derive(Debug)]
pub enum AdEvent {
    Loaded(LoadedAd),
    FailedToLoad,
}

/// **广告位加载器**
/// 生命周期和广告位绑定：`destroy` 或 drop 后，进行中的加载结果被丢弃，不会再发送任何事件。
pub struct PlacementLoader {
    placement_id: String,
    waterfall: Arc<BidWaterfall>,
    ctx: BiddingContext,
    reporter: EventReporter,
    events: mpsc::Sender<AdEvent>,
    cancel: CancellationToken,
    shown_since_load: Arc<AtomicBool>,
}

impl PlacementLoader {
    pub fn new(
        placement: Placement,
        ctx: BiddingContext,
        reporter: EventReporter,
    ) -> (Self, mpsc::Receiver<AdEvent>) {
        let (events, receiver) = mpsc::channel(8);
        let loader = Self {
            placement_id: placement.placement_id.clone(),
            waterfall: Arc::new(BidWaterfall::new(placement, ctx.clone())),
            ctx,
            reporter,
            events,
            cancel: CancellationToken::new(),
            shown_since_load: Arc::new(AtomicBool::new(false)),
        };
        (loader, receiver)
    }

    pub fn waterfall(&self) -> &BidWaterfall {
        &self.waterfall
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 异步加载一个广告，结果通过事件通道返回
    pub fn load(&self) -> JoinHandle<()> {
        let waterfall = self.waterfall.clone();
        let ctx = self.ctx.clone();
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        // 上一个广告展示过，本次必须重新竞价
        let success_win = self.shown_since_load.swap(false, Ordering::SeqCst);

        tokio::spawn(async move {
            let placement_id = waterfall.placement().placement_id.clone();
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(placement_id = %placement_id, "placement destroyed, dropping load");
                    return;
                }
                outcome = load_once(&waterfall, &ctx, success_win) => outcome,
            };

            let event = match outcome {
                Some((unit, served)) => {
                    let load_latency = started.elapsed();
                    if let Some(session) = &ctx.session {
                        session.record_load_latency(&placement_id, load_latency);
                    }
                    info!(placement_id = %placement_id, bid_id = %served.bid.id, network = %unit.network(), "ad loaded");
                    AdEvent::Loaded(LoadedAd { unit, served, load_latency })
                }
                None => {
                    if let Some(session) = &ctx.session {
                        session.record_load_failure(&placement_id);
                    }
                    AdEvent::FailedToLoad
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(placement_id = %placement_id, "placement destroyed, dropping load result");
                }
                sent = events.send(event) => {
                    if sent.is_err() {
                        debug!(placement_id = %placement_id, "event receiver gone");
                    }
                }
            }
        })
    }

    /// 广告展示：上报 impression / win，触发 nurl、burl，记录花费
    pub fn report_shown(&self, ad: &LoadedAd) {
        if self.is_destroyed() {
            return;
        }
        let bid = &ad.served.bid;
        self.reporter.impression(&bid.id);
        self.reporter.win(&bid.id);
        if let Some(nurl) = &bid.nurl {
            self.reporter.price_macro_notify(bid.price, nurl);
        }
        if let Some(burl) = &bid.burl {
            self.reporter.price_macro_notify(bid.price, burl);
        }
        if let Some(session) = &self.ctx.session {
            session.record_impression(&self.placement_id);
            session.record_spend(SpendMetric {
                placement_id: self.placement_id.clone(),
                network: bid.ext.adapter.clone(),
                bid_id: bid.id.clone(),
                price: bid.price,
                recorded_at: Utc::now(),
            });
        }
        self.shown_since_load.store(true, Ordering::SeqCst);
    }

    pub fn report_clicked(&self, ad: &LoadedAd) {
        if self.is_destroyed() {
            return;
        }
        self.reporter.click(&ad.served.bid.id);
        if let Some(session) = &self.ctx.session {
            session.record_click(&self.placement_id);
        }
    }

    pub fn report_closed(&self) {
        if let Some(session) = &self.ctx.session {
            session.record_close(&self.placement_id);
        }
    }

    pub fn report_show_failed(&self) {
        if let Some(session) = &self.ctx.session {
            session.record_show_failure(&self.placement_id);
        }
    }

    /// 销毁广告位，取消所有进行中的加载
    pub fn destroy(&self) {
        if !self.cancel.is_cancelled() {
            info!(placement_id = %self.placement_id, "placement destroyed");
        }
        self.cancel.cancel();
    }
}

impl Drop for PlacementLoader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 取 bid -> 找到对应网络的工厂 -> 构建广告单元
/// 当前 bid 无法构建时继续取队列里的下一个，直到队列耗尽或竞价失败。
async fn load_once(
    waterfall: &BidWaterfall,
    ctx: &BiddingContext,
    success_win: bool,
) -> Option<(Box<dyn AdUnit>, ServedBid)> {
    let placement = waterfall.placement();
    let mut force_auction = success_win;
    loop {
        let served = match waterfall.request_bid(force_auction).await {
            Ok(served) => served,
            Err(e) => {
                warn!(placement_id = %placement.placement_id, reason = e.reason(), error = %e, "no bid to load");
                return None;
            }
        };
        force_auction = false;

        if let Some(unit) = build_unit(placement, ctx, &served) {
            return Some((unit, served));
        }
        if waterfall.state() != WaterfallState::QueueHasBids {
            return None;
        }
        debug!(placement_id = %placement.placement_id, bid_id = %served.bid.id, "skipping unbuildable bid, trying next in queue");
    }
}

fn build_unit(placement: &Placement, ctx: &BiddingContext, served: &ServedBid) -> Option<Box<dyn AdUnit>> {
    let bid = &served.bid;
    let Some(network) = bid.network() else {
        warn!(placement_id = %placement.placement_id, adapter = %bid.ext.adapter, "bid from unknown network");
        return None;
    };
    if !ctx.readiness.is_usable(network) {
        warn!(placement_id = %placement.placement_id, network = %network, "network not initialized");
        return None;
    }
    let Some(factory) = ctx.factories.factory_for(network, placement.ad_type) else {
        warn!(placement_id = %placement.placement_id, network = %network, ad_type = %placement.ad_type, "no factory for ad type");
        return None;
    };

    let unit = factory.create(AdUnitBundle {
        ad_id: placement.placement_id.clone(),
        bid_id: bid.id.clone(),
        adm: bid.adm.clone().unwrap_or_default(),
        extras: bid.ext.adapter_extras.clone(),
        show_close_button: placement.show_close_button,
    });
    if unit.is_none() {
        warn!(placement_id = %placement.placement_id, network = %network, "adapter could not build ad unit");
    }
    unit
}
