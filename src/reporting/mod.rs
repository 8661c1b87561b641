pub mod event_reporter;

pub use event_reporter::{EventReporter, TrackingEvent, AUCTION_PRICE_MACRO, PAYLOAD_MACRO, TIMESTAMP_MACRO};
