use anyhow::{anyhow, Context, Result};
use regex::Regex;
use scraper::{Html, Selector};

use crate::config::config::{ExtractionConfig, StrategyKind};

/// Quoted `"price"` key followed by a 4 to 11 digit value, optionally quoted.
const EMBEDDED_PRICE_PATTERN: &str = r#""price"\s*:\s*"?(\d{4,11})"?"#;
const META_PRICE_SELECTOR: &str = r#"meta[property="product:price:amount"]"#;

/// One way of recovering a price from a fetched page.
pub enum PriceStrategy {
    /// Price field in machine-generated data embedded in the raw body.
    EmbeddedData(Regex),
    /// `product:price:amount` meta tag.
    MetaTag(Selector),
    /// Text of the visible price element matched by a site-specific selector.
    RenderedMarkup(Selector),
}

impl PriceStrategy {
    pub fn embedded_data() -> Result<Self> {
        let regex = Regex::new(EMBEDDED_PRICE_PATTERN).context("Failed to compile price regex")?;
        Ok(PriceStrategy::EmbeddedData(regex))
    }

    pub fn meta_tag() -> Result<Self> {
        Ok(PriceStrategy::MetaTag(parse_selector(META_PRICE_SELECTOR)?))
    }

    pub fn rendered_markup(selector: &str) -> Result<Self> {
        Ok(PriceStrategy::RenderedMarkup(parse_selector(selector)?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PriceStrategy::EmbeddedData(_) => "embedded_data",
            PriceStrategy::MetaTag(_) => "meta_tag",
            PriceStrategy::RenderedMarkup(_) => "rendered_markup",
        }
    }

    /// Returns the price if this strategy recognises one in `html`.
    pub fn try_extract(&self, html: &str) -> Option<u64> {
        match self {
            PriceStrategy::EmbeddedData(regex) => regex
                .captures(html)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok()),
            PriceStrategy::MetaTag(selector) => {
                let document = Html::parse_document(html);
                let price = document
                    .select(selector)
                    .find_map(|meta| meta.value().attr("content"))
                    .and_then(|content| {
                        let content = content.trim().replace(',', "");
                        let integer = content.split('.').next().unwrap_or_default();
                        if !integer.is_empty() && integer.bytes().all(|b| b.is_ascii_digit()) {
                            integer.parse::<u64>().ok()
                        } else {
                            None
                        }
                    });
                price
            }
            PriceStrategy::RenderedMarkup(selector) => {
                let document = Html::parse_document(html);
                let text: String = document
                    .select(selector)
                    .flat_map(|element| element.text())
                    .collect();
                parse_digits(&text)
            }
        }
    }
}

/// Builds the strategy list in configured order.
pub fn strategies_from_config(config: &ExtractionConfig) -> Result<Vec<PriceStrategy>> {
    config
        .strategies
        .iter()
        .map(|kind| match kind {
            StrategyKind::EmbeddedData => PriceStrategy::embedded_data(),
            StrategyKind::MetaTag => PriceStrategy::meta_tag(),
            StrategyKind::RenderedMarkup => PriceStrategy::rendered_markup(&config.price_selector),
        })
        .collect()
}

/// Strips everything but ASCII digits and parses the rest as base 10.
/// Text without any digit yields `None`, never zero.
pub fn parse_digits(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Invalid price selector {}: {:?}", selector, e))
}
