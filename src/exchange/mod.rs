//! Exchange connectivity: REST history fetch and a self-reconnecting
//! WebSocket trade subscription.

mod client;
mod wire;

pub use client::ExchangeClient;
