use anyhow::Result;
use colored::Colorize;

use crate::config::config::AppConfig;
use crate::price_data::{Absence, PriceResult};
use crate::scraping::fetch_page::{FetchPage, PageClient};
use crate::scraping::price_strategies::{strategies_from_config, PriceStrategy};

/// Fetches a product page and runs the price strategies in order.
pub struct PriceExtractor<F: FetchPage = PageClient> {
    fetcher: F,
    strategies: Vec<PriceStrategy>,
}

impl PriceExtractor<PageClient> {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fetcher = PageClient::new(&config.http)?;
        let strategies = strategies_from_config(&config.extraction)?;
        Ok(PriceExtractor::new(fetcher, strategies))
    }
}

impl<F: FetchPage> PriceExtractor<F> {
    pub fn new(fetcher: F, strategies: Vec<PriceStrategy>) -> Self {
        PriceExtractor { fetcher, strategies }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Never fails: every problem becomes an [`Absence`], reported on stderr.
    pub async fn extract(&self, url: Option<&str>) -> PriceResult {
        let url = match url.map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return PriceResult::Absent(Absence::NotConfigured),
        };

        let html = match self.fetcher.fetch_page(url).await {
            Ok(html) => html,
            Err(e) => {
                eprintln!("{}", format!("fetch failed: {} ({:#})", url, e).red());
                return PriceResult::Absent(Absence::FetchFailed);
            }
        };

        match self.extract_from_html(&html) {
            Some(price) => PriceResult::Found(price),
            None => {
                eprintln!("{}", format!("price not found in HTML: {}", url).yellow());
                PriceResult::Absent(Absence::PriceNotFound)
            }
        }
    }

    /// First price recognised by any strategy, in configured order.
    pub fn extract_from_html(&self, html: &str) -> Option<u64> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.try_extract(html))
    }
}
