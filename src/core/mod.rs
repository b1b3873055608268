pub mod advisor;
pub mod benchmarks;
pub mod cohort;
pub mod dashboard;
pub mod data_quality;
pub mod health;
pub mod planner;
pub mod reports;
pub mod roadmap;
pub mod runway;
pub mod scenarios;
pub mod tracker;
pub mod unit_economics;
pub mod variance;

pub use crate::domain::ports::{Analyst, Storage};
pub use crate::utils::error::Result;
pub use dashboard::Dashboard;
pub use unit_economics::MetricsSnapshot;
