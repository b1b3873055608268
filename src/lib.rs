pub mod analyst;
pub mod config;
pub mod core;
pub mod domain;
pub mod export;
pub mod storage;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use analyst::{AnalystClient, LocalAnalyst};
pub use config::AppConfig;
pub use core::Dashboard;
pub use storage::{LocalStorage, SqliteStore};
pub use utils::error::{MetricsError, Result};
