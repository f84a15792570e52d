pub mod compare_prices;
pub mod config;
pub mod price_data;
pub mod scraping;
pub mod utilities;

pub use compare_prices::{run_price_report, ComparisonRunner, RunSummary};
pub use price_data::{Absence, ComparisonRow, PriceResult, SkuEntry};
