//! Eventually-consistent mirror of broker positions

mod cache;

pub use cache::PositionCache;
