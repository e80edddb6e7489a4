//! Market data sources

pub mod messages;
pub mod replay;
pub mod websocket;

pub use messages::{parse_frame, FeedMessage, SubscribeMessage};
pub use replay::{read_events, JsonlHistory, ReplayFeed};
pub use websocket::WebSocketFeed;
