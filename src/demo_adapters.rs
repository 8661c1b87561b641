// src/demo_adapters.rs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use mediation_bidder::adapters::{
    AdUnit, AdUnitBundle, AdUnitFactory, AdapterCatalog, AdapterRegistration, BidTokenSource,
    NetworkId, NetworkInitializer,
};
use mediation_bidder::error::{AdapterError, TokenSourceError};
use mediation_bidder::model::placements::AdType;
use mediation_bidder::model::privacy::PrivacySettings;
use mediation_bidder::openrtb::request::TokenBundle;

/// demo 用的广告单元，只打印日志
#[derive(Debug)]
pub struct DemoAdUnit {
    network: NetworkId,
    ad_type: AdType,
    bid_id: String,
}

impl AdUnit for DemoAdUnit {
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

struct DemoNetwork {
    network: NetworkId,
    /// 需要用户授权才能初始化
    requires_consent: bool,
}

#[async_trait]
impl NetworkInitializer for DemoNetwork {
    async fn initialize(
        &self,
        params: &HashMap<String, String>,
        privacy: &PrivacySettings,
    ) -> Result<(), AdapterError> {
        if self.requires_consent && privacy.consent != Some(true) {
            return Err(AdapterError { network: self.network, reason: "consent required".to_string() });
        }
        tracing::debug!(network = %self.network, params = params.len(), "demo network initialized");
        Ok(())
    }
}

#[async_trait]
impl BidTokenSource for DemoNetwork {
    async fn token(&self) -> Result<TokenBundle, TokenSourceError> {
        Ok(TokenBundle::from([("bidder_token".to_string(), Uuid::new_v4().simple().to_string())]))
    }
}

struct DemoFactory(NetworkId, AdType);

impl AdUnitFactory for DemoFactory {
    fn create(&self, bundle: AdUnitBundle) -> Option<Box<dyn AdUnit>> {
        if bundle.adm.is_empty() {
            return None;
        }
        Some(Box::new(DemoAdUnit {
            network: self.0,
            ad_type: self.1,
            bid_id: bundle.bid_id,
        }))
    }
}

/// 注册 demo 网络；Meta 不支持激励视频，用来演示部分可用
pub fn catalog() -> AdapterCatalog {
    let mut catalog = AdapterCatalog::new();
    for (network, requires_consent) in [
        (NetworkId::AppLovin, false),
        (NetworkId::UnityAds, false),
        (NetworkId::Meta, true),
    ] {
        let demo = Arc::new(DemoNetwork { network, requires_consent });
        let mut registration = AdapterRegistration::new()
            .with_initializer(demo.clone())
            .with_token_source(demo);
        for ad_type in [AdType::Banner, AdType::Interstitial, AdType::Rewarded, AdType::Native] {
            if network == NetworkId::Meta && ad_type == AdType::Rewarded {
                continue;
            }
            registration = registration.with_factory(ad_type, Arc::new(DemoFactory(network, ad_type)));
        }
        catalog.register_adapter(network, registration);
    }
    catalog
}
