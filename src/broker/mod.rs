//! Broker-side collaborators

mod paper;

pub use paper::{Fill, PaperBroker};
