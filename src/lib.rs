// 公开导出的模块，供外部使用
pub mod calendar;
pub mod config;
pub mod errors;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod store;
pub mod util;

// 重新导出常用类型，方便使用
pub use calendar::{Clock, FixedClock, MarketOracle, NyseCalendar, ReferenceZone, SystemClock};
pub use config::Config;
pub use errors::{MoversError, Result};
pub use models::mover::{MoverItem, MoverRecord};
pub use models::tracking::DayObservation;
pub use services::DataService;
pub use store::{MoverStore, TrackerStore};
