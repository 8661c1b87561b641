// src/bidding/waterfall.rs

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bidding::context::BiddingContext;
use crate::bidding::request_builder::BidRequestParams;
use crate::bidding::tokens::aggregate_tokens;
use crate::error::BiddingError;
use crate::logging::AuctionLog;
use crate::model::placements::Placement;
use crate::openrtb::response::Bid;

/// 瀑布流状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterfallState {
    Idle,
    AuctionInFlight,
    QueueHasBids,
    QueueExhausted,
}

/// 耗时来源：新竞价实测，或者复用队列（记为 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencySource {
    Fresh,
    Reused,
}

/// 交给调用方的 bid
#[derive(Debug, Clone)]
pub struct ServedBid {
    pub bid: Bid,
    pub request_id: String,
    pub latency: Duration,
    pub latency_source: LatencySource,
}

#[derive(Default)]
struct Queue {
    request_id: String,
    bids: VecDeque<Bid>,
}

/// **广告位的竞价瀑布流**
/// 每个广告位独占一个，保存最近一次竞价的排序结果。
/// `request_bid` 用异步锁串行化，第二次调用会等第一次结束。
pub struct BidWaterfall {
    placement: Placement,
    ctx: BiddingContext,
    queue: tokio::sync::Mutex<Queue>,
    state: Arc<Mutex<WaterfallState>>,
}

impl BidWaterfall {
    pub fn new(placement: Placement, ctx: BiddingContext) -> Self {
        Self {
            placement,
            ctx,
            queue: tokio::sync::Mutex::new(Queue::default()),
            state: Arc::new(Mutex::new(WaterfallState::Idle)),
        }
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn state(&self) -> WaterfallState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 已胜出过（展示成功）或队列为空时发起新竞价，否则直接弹出队列里的下一个 bid
    pub async fn request_bid(&self, success_win: bool) -> Result<ServedBid, BiddingError> {
        let mut queue = self.queue.lock().await;

        if !success_win {
            if let Some(bid) = queue.bids.pop_front() {
                self.set_state(if queue.bids.is_empty() {
                    WaterfallState::QueueExhausted
                } else {
                    WaterfallState::QueueHasBids
                });
                if let Some(session) = &self.ctx.session {
                    session.record_bid_latency(&self.placement.placement_id, Duration::ZERO);
                }
                return Ok(ServedBid {
                    bid,
                    request_id: queue.request_id.clone(),
                    latency: Duration::ZERO,
                    latency_source: LatencySource::Reused,
                });
            }
        }

        queue.bids.clear();
        self.set_state(WaterfallState::AuctionInFlight);
        // future 被取消时回到 QueueExhausted
        let mut guard = InFlightGuard { state: self.state.clone(), armed: true };

        let result = self.run_auction().await;
        guard.armed = false;

        match result {
            Ok((request_id, mut bids, latency)) => {
                let Some(first) = bids.pop_front() else {
                    self.set_state(WaterfallState::QueueExhausted);
                    return Err(BiddingError::NoBid {
                        placement_id: self.placement.placement_id.clone(),
                    });
                };
                queue.request_id = request_id.clone();
                queue.bids = bids;
                self.set_state(if queue.bids.is_empty() {
                    WaterfallState::QueueExhausted
                } else {
                    WaterfallState::QueueHasBids
                });
                Ok(ServedBid {
                    bid: first,
                    request_id,
                    latency,
                    latency_source: LatencySource::Fresh,
                })
            }
            Err(e) => {
                self.set_state(WaterfallState::QueueExhausted);
                Err(e)
            }
        }
    }

    /// 同 `request_bid`，但广告位销毁时立即返回 `Cancelled`，未完成的结果直接丢弃
    pub async fn request_bid_until(
        &self,
        success_win: bool,
        cancel: &CancellationToken,
    ) -> Result<ServedBid, BiddingError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BiddingError::Cancelled),
            result = self.request_bid(success_win) => result,
        }
    }

    /// token 聚合 -> 构建请求 -> CDP 增强 -> 竞价
    async fn run_auction(&self) -> Result<(String, VecDeque<Bid>, Duration), BiddingError> {
        let placement_id = self.placement.placement_id.as_str();
        let tokens = aggregate_tokens(&self.ctx.factories.token_sources()).await;
        let token_networks: Vec<String> = tokens.keys().map(|n| n.to_string()).collect();

        let request = self.ctx.builder.create_bid_request(BidRequestParams {
            ad_unit_id: placement_id.to_string(),
            stored_impression_id: Uuid::new_v4().to_string(),
            ad_type: self.placement.ad_type,
            deal_id: self.placement.deal_id.clone(),
            floor: self.placement.floor,
            publisher_id: self.ctx.publisher_id.clone(),
            user_id: self.ctx.user_id.clone(),
            adapter_tokens: tokens,
            native_requirements: self.placement.native.clone(),
        });
        let (request, enrichment) = self.ctx.client.enrich(request).await;

        let mut log = AuctionLog::new(placement_id, &request.id);
        log.token_networks = token_networks;
        log.enrichment = enrichment;

        let start = Instant::now();
        let response = self.ctx.client.start_auction(&request).await;
        let latency = start.elapsed();
        log.latency_ms = latency.as_millis();

        let result = match response {
            Ok(response) => {
                let bids: VecDeque<Bid> = response.into_ranked_bids().into();
                if let Some(session) = &self.ctx.session {
                    session.record_bid_latency(placement_id, latency);
                }
                match bids.front() {
                    Some(top) => {
                        log.set_winner(&top.ext.adapter, top.price, bids.len());
                        info!(
                            placement_id,
                            request_id = %request.id,
                            bids = bids.len(),
                            winner = %top.ext.adapter,
                            price = top.price,
                            latency_ms = latency.as_millis() as u64,
                            "auction completed"
                        );
                    }
                    None => {
                        log.set_failure("no_bid");
                        info!(placement_id, request_id = %request.id, "auction returned no bids");
                    }
                }
                Ok((request.id.clone(), bids, latency))
            }
            Err(e) => {
                let err = BiddingError::from(e);
                log.set_failure(err.reason());
                warn!(placement_id, request_id = %request.id, error = %err, "auction failed");
                Err(err)
            }
        };

        if let Some(logger) = &self.ctx.runtime_logger {
            logger.log_auction(&log).await;
        }
        result
    }

    fn set_state(&self, state: WaterfallState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

struct InFlightGuard {
    state: Arc<Mutex<WaterfallState>>,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.armed {
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) = WaterfallState::QueueExhausted;
        }
    }
}
