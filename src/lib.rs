// src/lib.rs

pub mod adapters;
pub mod bidding;
pub mod config;
pub mod error;
pub mod http_client;
pub mod logging;
#[cfg(feature = "mock")]
pub mod mock_server;
pub mod model;
pub mod openrtb;
pub mod reporting;
pub mod session;

pub use bidding::{AdEvent, BidWaterfall, BiddingContext, PlacementLoader, ServedBid};
pub use error::BiddingError;
