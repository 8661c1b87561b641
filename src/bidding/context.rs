// src/bidding/context.rs

use std::sync::Arc;

use crate::adapters::{AdNetworkFactories, NetworkReadiness};
use crate::bidding::auction_client::AuctionClient;
use crate::bidding::request_builder::BidRequestBuilder;
use crate::logging::RuntimeLogger;
use crate::session::SessionHandle;

/// 竞价核心依赖的共享对象，由宿主在初始化时显式创建并传入
#[derive(Clone)]
pub struct BiddingContext {
    pub publisher_id: String,
    pub user_id: String,
    pub builder: Arc<BidRequestBuilder>,
    pub client: Arc<AuctionClient>,
    pub factories: Arc<AdNetworkFactories>,
    pub readiness: Arc<NetworkReadiness>,
    pub session: Option<SessionHandle>,
    pub runtime_logger: Option<Arc<RuntimeLogger>>,
}

impl BiddingContext {
    pub fn new(
        publisher_id: &str,
        user_id: &str,
        builder: BidRequestBuilder,
        client: AuctionClient,
        factories: AdNetworkFactories,
    ) -> Self {
        Self {
            publisher_id: publisher_id.to_string(),
            user_id: user_id.to_string(),
            builder: Arc::new(builder),
            client: Arc::new(client),
            factories: Arc::new(factories),
            readiness: Arc::new(NetworkReadiness::default()),
            session: None,
            runtime_logger: None,
        }
    }

    pub fn with_readiness(mut self, readiness: NetworkReadiness) -> Self {
        self.readiness = Arc::new(readiness);
        self
    }

    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_runtime_logger(mut self, logger: Arc<RuntimeLogger>) -> Self {
        self.runtime_logger = Some(logger);
        self
    }
}
