// src/adapters/registry.rs

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::NetworkId;
use crate::error::{AdapterError, TokenSourceError};
use crate::model::placements::AdType;
use crate::model::privacy::PrivacySettings;
use crate::openrtb::request::TokenBundle;

/// 广告网络初始化器
#[async_trait]
pub trait NetworkInitializer: Send + Sync {
    async fn initialize(
        &self,
        params: &HashMap<String, String>,
        privacy: &PrivacySettings,
    ) -> Result<(), AdapterError>;
}

/// bidder token 来源
#[async_trait]
pub trait BidTokenSource: Send + Sync {
    async fn token(&self) -> Result<TokenBundle, TokenSourceError>;
}

/// 广告网络构建出的可渲染广告单元
pub trait AdUnit: Send + Sync + Debug {
    fn network(&self) -> NetworkId;
    fn ad_type(&self) -> AdType;
    fn bid_id(&self) -> &str;
}

/// 构建广告单元所需的数据
#[derive(Debug, Clone, PartialEq)]
pub struct AdUnitBundle {
    pub ad_id: String,
    pub bid_id: String,
    pub adm: String,
    pub extras: BTreeMap<String, Value>,
    pub show_close_button: Option<bool>,
}

/// 广告单元工厂，无法构建时返回 None
pub trait AdUnitFactory: Send + Sync {
    fn create(&self, bundle: AdUnitBundle) -> Option<Box<dyn AdUnit>>;
}

/// 单个网络注册的能力，任意一项都可以缺省
#[derive(Clone, Default)]
pub struct AdapterRegistration {
    pub initializer: Option<Arc<dyn NetworkInitializer>>,
    pub token_source: Option<Arc<dyn BidTokenSource>>,
    pub banner: Option<Arc<dyn AdUnitFactory>>,
    pub interstitial: Option<Arc<dyn AdUnitFactory>>,
    pub rewarded: Option<Arc<dyn AdUnitFactory>>,
    pub native: Option<Arc<dyn AdUnitFactory>>,
}

impl AdapterRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initializer(mut self, initializer: Arc<dyn NetworkInitializer>) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn with_token_source(mut self, source: Arc<dyn BidTokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn with_factory(mut self, ad_type: AdType, factory: Arc<dyn AdUnitFactory>) -> Self {
        match ad_type {
            AdType::Banner => self.banner = Some(factory),
            AdType::Interstitial => self.interstitial = Some(factory),
            AdType::Rewarded => self.rewarded = Some(factory),
            AdType::Native => self.native = Some(factory),
        }
        self
    }

    fn factory(&self, ad_type: AdType) -> Option<&Arc<dyn AdUnitFactory>> {
        match ad_type {
            AdType::Banner => self.banner.as_ref(),
            AdType::Interstitial => self.interstitial.as_ref(),
            AdType::Rewarded => self.rewarded.as_ref(),
            AdType::Native => self.native.as_ref(),
        }
    }

    fn slot_names(&self) -> Vec<&'static str> {
        let slots = [
            ("initializer", self.initializer.is_some()),
            ("token_source", self.token_source.is_some()),
            ("banner", self.banner.is_some()),
            ("interstitial", self.interstitial.is_some()),
            ("rewarded", self.rewarded.is_some()),
            ("native", self.native.is_some()),
        ];
        slots.iter().filter(|(_, present)| *present).map(|(name, _)| *name).collect()
    }

    fn is_empty(&self) -> bool {
        self.slot_names().is_empty()
    }
}

/// 宿主应用启动时收集各个网络模块的注册
#[derive(Clone, Default)]
pub struct AdapterCatalog {
    entries: HashMap<NetworkId, AdapterRegistration>,
}

impl AdapterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个网络，重复注册时覆盖之前的
    pub fn register_adapter(&mut self, network: NetworkId, registration: AdapterRegistration) {
        if self.entries.insert(network, registration).is_some() {
            warn!(network = %network, "adapter registered twice, keeping the latest registration");
        }
    }

    fn lookup(&self, network: NetworkId) -> Option<&AdapterRegistration> {
        self.entries.get(&network)
    }
}

/// **广告网络工厂注册表**
/// 启动时构建一次，之后只读，可以被多个任务并发读取。
#[derive(Clone, Default)]
pub struct AdNetworkFactories {
    networks: BTreeMap<NetworkId, AdapterRegistration>,
}

impl AdNetworkFactories {
    /// 扫描所有已知网络，同步执行，无 I/O
    pub fn resolve(catalog: &AdapterCatalog) -> Self {
        let mut networks = BTreeMap::new();
        for network in NetworkId::ALL {
            match catalog.lookup(network) {
                Some(registration) if !registration.is_empty() => {
                    debug!(network = %network, slots = ?registration.slot_names(), "adapter resolved");
                    networks.insert(network, registration.clone());
                }
                _ => debug!(network = %network, "adapter not linked"),
            }
        }
        info!(available = networks.len(), "ad network factories resolved");
        Self { networks }
    }

    /// 至少有一个能力可用
    pub fn is_available(&self, network: NetworkId) -> bool {
        self.networks.contains_key(&network)
    }

    pub fn available_networks(&self) -> Vec<NetworkId> {
        self.networks.keys().copied().collect()
    }

    pub fn factory_for(&self, network: NetworkId, ad_type: AdType) -> Option<Arc<dyn AdUnitFactory>> {
        self.networks.get(&network)?.factory(ad_type).cloned()
    }

    pub fn initializer(&self, network: NetworkId) -> Option<Arc<dyn NetworkInitializer>> {
        self.networks.get(&network)?.initializer.clone()
    }

    /// 所有注册了 token 来源的网络
    pub fn token_sources(&self) -> HashMap<NetworkId, Arc<dyn BidTokenSource>> {
        self.networks
            .iter()
            .filter_map(|(network, reg)| reg.token_source.clone().map(|source| (*network, source)))
            .collect()
    }
}

/// 初始化结果：只有初始化成功的网络才是完全可用的
#[derive(Debug, Clone, Default)]
pub struct NetworkReadiness {
    ready: HashSet<NetworkId>,
    failed: HashMap<NetworkId, String>,
}

impl NetworkReadiness {
    pub fn is_usable(&self, network: NetworkId) -> bool {
        self.ready.contains(&network)
    }

    pub fn ready_networks(&self) -> Vec<NetworkId> {
        let mut networks: Vec<NetworkId> = self.ready.iter().copied().collect();
        networks.sort();
        networks
    }

    pub fn failure(&self, network: NetworkId) -> Option<&str> {
        self.failed.get(&network).map(String::as_str)
    }
}

/// 并发初始化所有带 initializer 的网络
pub async fn initialize_networks(
    factories: &AdNetworkFactories,
    params: &HashMap<NetworkId, HashMap<String, String>>,
    privacy: &PrivacySettings,
) -> NetworkReadiness {
    let empty = HashMap::new();
    let tasks = factories.networks.iter().filter_map(|(network, reg)| {
        let initializer = reg.initializer.clone()?;
        let network_params = params.get(network).unwrap_or(&empty);
        let network = *network;
        Some(async move { (network, initializer.initialize(network_params, privacy).await) })
    });

    let mut readiness = NetworkReadiness::default();
    for (network, result) in join_all(tasks).await {
        match result {
            Ok(()) => {
                info!(network = %network, "ad network initialized");
                readiness.ready.insert(network);
            }
            Err(e) => {
                warn!(network = %network, error = %e, "ad network failed to initialize");
                readiness.failed.insert(network, e.reason);
            }
        }
    }
    readiness
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestUnit {
        network: NetworkId,
        ad_type: AdType,
        bid_id: String,
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

    struct TestFactory(NetworkId, AdType);

    impl AdUnitFactory for TestFactory {
        fn create(&self, bundle: AdUnitBundle) -> Option<Box<dyn AdUnit>> {
            Some(Box::new(TestUnit { network: self.0, ad_type: self.1, bid_id: bundle.bid_id }))
        }
    }

    struct TestInitializer {
        ok: bool,
        network: NetworkId,
    }

    #[async_trait]
    impl NetworkInitializer for TestInitializer {
        async fn initialize(
            &self,
            params: &HashMap<String, String>,
            privacy: &PrivacySettings,
        ) -> Result<(), AdapterError> {
            if self.ok && params.contains_key("app_id") && privacy.consent == Some(true) {
                Ok(())
            } else {
                Err(AdapterError { network: self.network, reason: "rejected".to_string() })
            }
        }
    }

    fn catalog() -> AdapterCatalog {
        let mut catalog = AdapterCatalog::new();
        catalog.register_adapter(
            NetworkId::AppLovin,
            AdapterRegistration::new()
                .with_initializer(Arc::new(TestInitializer { ok: true, network: NetworkId::AppLovin }))
                .with_factory(AdType::Interstitial, Arc::new(TestFactory(NetworkId::AppLovin, AdType::Interstitial))),
        );
        catalog.register_adapter(
            NetworkId::Meta,
            AdapterRegistration::new()
                .with_initializer(Arc::new(TestInitializer { ok: false, network: NetworkId::Meta }))
                .with_factory(AdType::Banner, Arc::new(TestFactory(NetworkId::Meta, AdType::Banner))),
        );
        catalog.register_adapter(NetworkId::Vungle, AdapterRegistration::new());
        catalog
    }

    #[test]
    fn partial_availability_is_recorded_per_slot() {
        let factories = AdNetworkFactories::resolve(&catalog());

        assert!(factories.is_available(NetworkId::AppLovin));
        assert!(factories.factory_for(NetworkId::AppLovin, AdType::Interstitial).is_some());
        assert!(factories.factory_for(NetworkId::AppLovin, AdType::Native).is_none());
        // 没有任何能力的注册视为不可用
        assert!(!factories.is_available(NetworkId::Vungle));
        assert!(!factories.is_available(NetworkId::Pangle));
        assert_eq!(factories.available_networks(), vec![NetworkId::AppLovin, NetworkId::Meta]);
        assert!(factories.token_sources().is_empty());
    }

    #[test]
    fn factory_builds_unit_from_bundle() {
        let factories = AdNetworkFactories::resolve(&catalog());
        let factory = factories.factory_for(NetworkId::Meta, AdType::Banner).unwrap();
        let unit = factory
            .create(AdUnitBundle {
                ad_id: "home".to_string(),
                bid_id: "bid-9".to_string(),
                adm: "<html/>".to_string(),
                extras: BTreeMap::new(),
                show_close_button: None,
            })
            .unwrap();
        assert_eq!(unit.bid_id(), "bid-9");
        assert_eq!(unit.network(), NetworkId::Meta);
    }

    #[tokio::test]
    async fn only_successful_initializers_are_usable() {
        let factories = AdNetworkFactories::resolve(&catalog());
        let mut params = HashMap::new();
        for network in [NetworkId::AppLovin, NetworkId::Meta] {
            params.insert(network, HashMap::from([("app_id".to_string(), "42".to_string())]));
        }
        let privacy = PrivacySettings::default().with_consent(true);

        let readiness = initialize_networks(&factories, &params, &privacy).await;
        assert!(readiness.is_usable(NetworkId::AppLovin));
        assert!(!readiness.is_usable(NetworkId::Meta));
        assert_eq!(readiness.failure(NetworkId::Meta), Some("rejected"));
        assert_eq!(readiness.ready_networks(), vec![NetworkId::AppLovin]);
    }
}
