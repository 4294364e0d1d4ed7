pub mod base;
pub mod yahoo;

pub use base::{MoverSource, PriceHistorySource};
pub use yahoo::YahooClient;
