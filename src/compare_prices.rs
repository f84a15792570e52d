use std::collections::HashMap;

use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use futures::stream::{self, Stream, StreamExt};

use crate::config::config::{with_run_date, AppConfig};
use crate::price_data::{Absence, ComparisonRow, PriceResult, SkuEntry};
use crate::scraping::extract_price::PriceExtractor;
use crate::scraping::fetch_page::FetchPage;
use crate::utilities::csv_reader::read_sku_mapping;
use crate::utilities::csv_writer::write_report;
use crate::utilities::percent_diff::percent_diff;
use crate::utilities::rate_limiter::{Clock, RateLimiter};

/// Turns SKU entries into comparison rows, one URL fetch at a time.
pub struct ComparisonRunner<F: FetchPage, C: Clock> {
    extractor: PriceExtractor<F>,
    limiter: RateLimiter<C>,
    labels: Vec<String>,
    reference: String,
    max_attempts: u32,
}

impl<F: FetchPage, C: Clock> ComparisonRunner<F, C> {
    pub fn new(
        extractor: PriceExtractor<F>,
        limiter: RateLimiter<C>,
        labels: Vec<String>,
        reference: String,
    ) -> Self {
        ComparisonRunner {
            extractor,
            limiter,
            labels,
            reference,
            max_attempts: 1,
        }
    }

    /// Attempts per URL; only fetch failures are retried.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn extractor(&self) -> &PriceExtractor<F> {
        &self.extractor
    }

    pub fn limiter(&self) -> &RateLimiter<C> {
        &self.limiter
    }

    /// Lazily yields one row per entry, in input order.
    ///
    /// Nothing is fetched until the stream is polled; calling `run` again starts over.
    pub fn run<'a>(&'a mut self, entries: &'a [SkuEntry]) -> impl Stream<Item = ComparisonRow> + 'a {
        stream::unfold((self, entries.iter()), |(runner, mut entries)| async move {
            let entry = entries.next()?;
            let row = runner.compare_entry(entry).await;
            Some((row, (runner, entries)))
        })
    }

    pub async fn compare_entry(&mut self, entry: &SkuEntry) -> ComparisonRow {
        let labels = self.labels.clone();
        let mut prices = Vec::with_capacity(labels.len());
        for label in labels {
            let result = self.fetch_price(entry.url(&label)).await;
            prices.push((label, result));
        }

        let reference_price = prices
            .iter()
            .find(|(label, _)| *label == self.reference)
            .map(|(_, price)| *price)
            .unwrap_or(PriceResult::Absent(Absence::NotConfigured));

        let diffs = prices
            .iter()
            .filter(|(label, _)| *label != self.reference)
            .map(|(label, price)| (label.clone(), percent_diff(&reference_price, price)))
            .collect();

        ComparisonRow {
            sku_code: entry.sku_code.clone(),
            prices,
            diffs,
        }
    }

    async fn fetch_price(&mut self, url: Option<&str>) -> PriceResult {
        let url = match url.map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return PriceResult::Absent(Absence::NotConfigured),
        };

        let mut attempt = 1;
        loop {
            self.limiter.throttle().await;
            let result = self.extractor.extract(Some(url)).await;
            if result != PriceResult::Absent(Absence::FetchFailed) || attempt >= self.max_attempts {
                return result;
            }
            attempt += 1;
            println!(
                "{}",
                format!("Retrying {} (attempt {}/{})", url, attempt, self.max_attempts).yellow()
            );
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub prices_found: usize,
    pub absences: HashMap<Absence, usize>,
}

impl RunSummary {
    pub fn from_rows(rows: &[ComparisonRow]) -> Self {
        let mut summary = RunSummary {
            rows: rows.len(),
            ..RunSummary::default()
        };
        for (_, price) in rows.iter().flat_map(|row| row.prices.iter()) {
            match price.absence() {
                None => summary.prices_found += 1,
                Some(absence) => *summary.absences.entry(absence).or_insert(0) += 1,
            }
        }
        summary
    }

    pub fn absent(&self, absence: Absence) -> usize {
        self.absences.get(&absence).copied().unwrap_or(0)
    }
}

/// Reads the mapping table, compares every SKU and writes the report once at the end.
pub async fn run_price_report<F: FetchPage, C: Clock>(
    config: &AppConfig,
    extractor: PriceExtractor<F>,
    limiter: RateLimiter<C>,
    report_path: &str,
    max: Option<usize>,
) -> Result<RunSummary> {
    let mapping = read_sku_mapping(&config.file.source_data, &config.sources, max).await?;
    println!(
        "Loaded {} SKUs from {} (sources: {})",
        mapping.entries.len(),
        config.file.source_data,
        mapping.labels.join(", ")
    );

    let mut runner = ComparisonRunner::new(
        extractor,
        limiter,
        mapping.labels.clone(),
        mapping.reference.clone(),
    )
    .with_max_attempts(config.rate_limit.max_attempts);

    let rows: Vec<ComparisonRow> = runner.run(&mapping.entries).collect().await;

    write_report(
        report_path,
        &mapping.labels,
        &mapping.reference,
        &rows,
        config.file.delimiter as u8,
    )?;
    println!("{}", format!("{} written", report_path).green());

    Ok(RunSummary::from_rows(&rows))
}

/// Resolves `{date}` in a report path template to today's local date.
pub fn todays_report_path(template: &str) -> String {
    with_run_date(template, &Local::now().format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::extract_price::tests::{default_strategies, FakeFetcher};
    use crate::utilities::rate_limiter::tests::FakeClock;
    use tokio::time::Duration;

    const EMBEDDED: &str = r#"<script>{"price":150000}</script>"#;
    const MARKUP: &str = r#"<div data-testid="lblPDPDetailProductPrice">Rp 135.000</div>"#;

    fn labels() -> Vec<String> {
        vec!["our_url".to_string(), "compA_url".to_string(), "compB_url".to_string()]
    }

    fn entry(sku: &str, urls: [Option<&str>; 3]) -> SkuEntry {
        SkuEntry {
            sku_code: sku.to_string(),
            urls: labels()
                .into_iter()
                .zip(urls)
                .map(|(label, url)| (label, url.map(str::to_string)))
                .collect(),
        }
    }

    fn runner(fetcher: FakeFetcher) -> ComparisonRunner<FakeFetcher, FakeClock> {
        ComparisonRunner::new(
            PriceExtractor::new(fetcher, default_strategies()),
            RateLimiter::with_clock(FakeClock::new(), Duration::from_millis(1000), 0),
            labels(),
            "our_url".to_string(),
        )
    }

    fn fetcher() -> FakeFetcher {
        FakeFetcher::default()
            .with_page("https://our.test/1", EMBEDDED)
            .with_page("https://a.test/1", MARKUP)
            .with_page("https://b.test/1", "<p>sold out</p>")
    }

    #[tokio::test]
    async fn builds_rows_with_prices_and_diffs() {
        let entries = vec![
            entry("EMPTY", [None, None, None]),
            entry(
                "HLM-01",
                [Some("https://our.test/1"), Some("https://a.test/1"), Some("https://b.test/1")],
            ),
        ];
        let mut runner = runner(fetcher());
        let rows: Vec<_> = runner.run(&entries).collect().await;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].to_record(), vec!["EMPTY", "", "", "", "", ""]);
        assert_eq!(
            rows[1].to_record(),
            vec!["HLM-01", "150000", "135000", "", "11.1", ""]
        );
        assert_eq!(
            rows[1].price("compB_url"),
            Some(&PriceResult::Absent(Absence::PriceNotFound))
        );
    }

    #[tokio::test]
    async fn throttles_only_real_fetches() {
        let entries = vec![
            entry("A", [Some("https://our.test/1"), None, Some("https://b.test/1")]),
            entry("B", [None, None, None]),
            entry("C", [Some("https://our.test/1"), None, None]),
        ];
        let mut runner = runner(fetcher());
        let _rows: Vec<_> = runner.run(&entries).collect().await;

        assert_eq!(runner.extractor().fetcher().calls.borrow().len(), 3);
        // first fetch goes straight out, the two following wait
        assert_eq!(runner.limiter().clock().sleeps.borrow().len(), 2);
    }

    #[tokio::test]
    async fn failures_stay_within_their_row() {
        let entries = vec![
            entry("BROKEN", [Some("https://down.test/x"), Some("https://down.test/y"), None]),
            entry("OK", [Some("https://our.test/1"), Some("https://a.test/1"), None]),
        ];
        let mut runner = runner(fetcher());
        let rows: Vec<_> = runner.run(&entries).collect().await;

        assert_eq!(
            rows[0].price("our_url"),
            Some(&PriceResult::Absent(Absence::FetchFailed))
        );
        assert_eq!(rows[0].diff("compA_url"), None);
        assert_eq!(rows[1].diff("compA_url"), Some("11.1"));
    }

    #[tokio::test]
    async fn retries_fetch_failures_only() {
        let entries = vec![entry(
            "R",
            [Some("https://down.test/x"), Some("https://b.test/1"), None],
        )];
        let mut runner = runner(fetcher()).with_max_attempts(3);
        let rows: Vec<_> = runner.run(&entries).collect().await;

        let calls = runner.extractor().fetcher().calls.borrow().clone();
        assert_eq!(
            calls,
            vec![
                "https://down.test/x",
                "https://down.test/x",
                "https://down.test/x",
                "https://b.test/1"
            ]
        );
        assert_eq!(rows[0].price("our_url"), Some(&PriceResult::Absent(Absence::FetchFailed)));
    }

    #[tokio::test]
    async fn rerun_yields_identical_rows_in_input_order() {
        let entries = vec![
            entry("Z", [Some("https://our.test/1"), Some("https://a.test/1"), None]),
            entry("A", [None, Some("https://a.test/1"), None]),
            entry("M", [Some("https://our.test/1"), None, Some("https://b.test/1")]),
        ];
        let mut runner = runner(fetcher());
        let first: Vec<_> = runner.run(&entries).collect().await;
        let second: Vec<_> = runner.run(&entries).collect().await;

        assert_eq!(first, second);
        let skus: Vec<_> = first.iter().map(|r| r.sku_code.as_str()).collect();
        assert_eq!(skus, vec!["Z", "A", "M"]);
    }

    #[tokio::test]
    async fn stream_is_lazy() {
        let entries = vec![entry("A", [Some("https://our.test/1"), None, None])];
        let mut runner = runner(fetcher());
        {
            let _stream = runner.run(&entries);
        }
        assert!(runner.extractor().fetcher().calls.borrow().is_empty());
    }

    #[test]
    fn report_path_gets_todays_date() {
        let before = Local::now().format("%Y-%m-%d").to_string();
        let path = todays_report_path("reports/prices-{date}.csv");
        let after = Local::now().format("%Y-%m-%d").to_string();
        // either side of midnight
        assert!(
            path == format!("reports/prices-{}.csv", before)
                || path == format!("reports/prices-{}.csv", after)
        );
        assert_eq!(todays_report_path("today.csv"), "today.csv");
    }

    #[test]
    fn summary_counts_each_absence_kind() {
        let rows = vec![ComparisonRow {
            sku_code: "S".to_string(),
            prices: vec![
                ("a".to_string(), PriceResult::Found(1000)),
                ("b".to_string(), PriceResult::Absent(Absence::FetchFailed)),
                ("c".to_string(), PriceResult::Absent(Absence::NotConfigured)),
                ("d".to_string(), PriceResult::Absent(Absence::NotConfigured)),
            ],
            diffs: Vec::new(),
        }];
        let summary = RunSummary::from_rows(&rows);
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.prices_found, 1);
        assert_eq!(summary.absent(Absence::FetchFailed), 1);
        assert_eq!(summary.absent(Absence::NotConfigured), 2);
        assert_eq!(summary.absent(Absence::PriceNotFound), 0);
    }
}
