pub mod extract_price;
pub mod fetch_page;
pub mod price_strategies;

pub use extract_price::PriceExtractor;
pub use fetch_page::{FetchPage, PageClient};
pub use price_strategies::PriceStrategy;
