//! Persistence: a pooled SQLite connection plus the kline and trade stores
//! layered on top of it.

mod klines;
mod pool;
mod trades;

pub use klines::KlineStore;
pub use pool::{SqlitePool, init_schema, open_pool};
pub use trades::TradeStore;
