pub mod network;
pub mod registry;

pub use network::NetworkId;
pub use registry::{
    initialize_networks, AdNetworkFactories, AdUnit, AdUnitBundle, AdUnitFactory,
    AdapterCatalog, AdapterRegistration, BidTokenSource, NetworkInitializer, NetworkReadiness,
};
