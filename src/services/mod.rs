pub mod acquisition;
pub mod data_service;
pub mod report;
pub mod tracker;

pub use acquisition::{AcquireOutcome, MoverAcquisition};
pub use data_service::{DataService, RunSummary, StoreStatus};
pub use tracker::SubsequentTracker;
