pub mod kucoin;
pub mod messages;
pub mod traits;

pub use kucoin::KucoinClient;
pub use traits::ExchangeClient;
