pub mod config;

pub use config::{load_config, with_run_date, AppConfig, StrategyKind};
