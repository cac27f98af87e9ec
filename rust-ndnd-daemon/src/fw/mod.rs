//! Forwarding: the pipelines and the pluggable strategies.

pub mod access;
pub mod asf;
pub mod best_route;
pub mod forwarder;
pub mod multicast;
pub mod self_learning;
pub mod strategy;
pub mod strategy_info;
pub mod unsolicited_data_policy;

pub use forwarder::{Forwarder, ForwarderCounters};
pub use strategy::{Strategy, StrategyRegistry};
