pub mod auction_client;
pub mod context;
pub mod placement;
pub mod request_builder;
pub mod tokens;
pub mod waterfall;

pub use auction_client::{AuctionClient, EnrichmentOutcome};
pub use context::BiddingContext;
pub use placement::{AdEvent, LoadedAd, PlacementLoader};
pub use request_builder::{BidRequestBuilder, BidRequestParams};
pub use tokens::aggregate_tokens;
pub use waterfall::{BidWaterfall, LatencySource, ServedBid, WaterfallState};
