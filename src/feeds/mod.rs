pub mod crypto_ws;

pub use crypto_ws::{CryptoFeedConfig, CryptoTickerFeed};
