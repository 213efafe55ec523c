pub mod dispatcher;
pub mod format;
pub mod rate_limit;
pub mod transport;

pub use dispatcher::{AlertDispatcher, DispatcherConfig};
pub use rate_limit::SignalRateLimiter;
pub use transport::{AlertTransport, LogTransport, TelegramTransport, TransportError};
