#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mediation_bidder::adapters::{
    initialize_networks, AdNetworkFactories, AdUnit, AdUnitBundle, AdUnitFactory, AdapterCatalog,
    AdapterRegistration, BidTokenSource, NetworkId, NetworkInitializer,
};
use mediation_bidder::bidding::{AuctionClient, BidRequestBuilder, BiddingContext};
use mediation_bidder::error::{AdapterError, TokenSourceError};
use mediation_bidder::http_client::RetryingHttpClient;
use mediation_bidder::mock_server::MockBackend;
use mediation_bidder::model::placements::AdType;
use mediation_bidder::model::privacy::PrivacySettings;
use mediation_bidder::model::targeting::{AppInfo, Targeting};
use mediation_bidder::openrtb::request::TokenBundle;
use mediation_bidder::reporting::EventReporter;

#[derive(Debug)]
pub struct TestUnit {
    pub network: NetworkId,
    pub ad_type: AdType,
    pub bid_id: String,
}

impl AdUnit for TestUnit {
    fn network(&self) -> NetworkId {
        self.network
    }
    fn ad_type(&self) -> AdType {
        self.ad_type
    }
    fn bid_id(&self) -> &str {
        &self.bid_id
    }
}

pub struct TestNetwork {
    pub network: NetworkId,
    pub init_ok: bool,
    pub token_ok: bool,
}

#[async_trait]
impl NetworkInitializer for TestNetwork {
    async fn initialize(
        &self,
        _params: &HashMap<String, String>,
        _privacy: &PrivacySettings,
    ) -> Result<(), AdapterError> {
        if self.init_ok {
            Ok(())
        } else {
            Err(AdapterError { network: self.network, reason: "init refused".to_string() })
        }
    }
}

#[async_trait]
impl BidTokenSource for TestNetwork {
    async fn token(&self) -> Result<TokenBundle, TokenSourceError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.token_ok {
            Ok(TokenBundle::from([("token".to_string(), format!("{}-token", self.network))]))
        } else {
            Err(TokenSourceError { network: self.network, reason: "no token".to_string() })
        }
    }
}

pub struct TestFactory(pub NetworkId, pub AdType);

impl AdUnitFactory for TestFactory {
    fn create(&self, bundle: AdUnitBundle) -> Option<Box<dyn AdUnit>> {
        Some(Box::new(TestUnit { network: self.0, ad_type: self.1, bid_id: bundle.bid_id }))
    }
}

/// 每个网络：(network, 初始化是否成功, token 是否成功, 支持的广告类型)
pub fn catalog(networks: &[(NetworkId, bool, bool, &[AdType])]) -> AdapterCatalog {
    let mut catalog = AdapterCatalog::new();
    for (network, init_ok, token_ok, ad_types) in networks {
        let test = Arc::new(TestNetwork { network: *network, init_ok: *init_ok, token_ok: *token_ok });
        let mut registration = AdapterRegistration::new()
            .with_initializer(test.clone())
            .with_token_source(test);
        for ad_type in ad_types.iter() {
            registration = registration.with_factory(*ad_type, Arc::new(TestFactory(*network, *ad_type)));
        }
        catalog.register_adapter(*network, registration);
    }
    catalog
}

pub fn default_catalog() -> AdapterCatalog {
    let all: &[AdType] = &[AdType::Banner, AdType::Interstitial, AdType::Rewarded, AdType::Native];
    catalog(&[
        (NetworkId::AppLovin, true, true, all),
        (NetworkId::UnityAds, true, true, all),
    ])
}

pub async fn context(auction_url: &str, cdp_url: &str, catalog: &AdapterCatalog) -> BiddingContext {
    let factories = AdNetworkFactories::resolve(catalog);
    let readiness = initialize_networks(&factories, &HashMap::new(), &PrivacySettings::default()).await;
    BiddingContext::new(
        "pub-test",
        "user-test",
        BidRequestBuilder::new(
            AppInfo { bundle: "com.example.test".to_string(), ..Default::default() },
            PrivacySettings::default().with_consent(true),
            Targeting::default().with_param("tier", "gold"),
        ),
        AuctionClient::new(auction_url, cdp_url, Duration::from_secs(2)),
        factories,
    )
    .with_readiness(readiness)
}

pub fn reporter(backend: &MockBackend) -> EventReporter {
    let http = Arc::new(RetryingHttpClient::new(3, Duration::from_millis(10), Duration::from_secs(1)));
    EventReporter::new(http, &backend.track_url())
}
