use std::fmt;

/// Why a price cell has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Absence {
    /// No URL in the mapping cell, so nothing was fetched.
    NotConfigured,
    /// Network error, timeout, too many redirects or a non-success status.
    FetchFailed,
    /// The page was fetched but no strategy recognised a price in it.
    PriceNotFound,
}

impl fmt::Display for Absence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Absence::NotConfigured => write!(f, "not configured"),
            Absence::FetchFailed => write!(f, "fetch failed"),
            Absence::PriceNotFound => write!(f, "price not found"),
        }
    }
}

/// Outcome of extracting one price, in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceResult {
    Found(u64),
    Absent(Absence),
}

impl PriceResult {
    pub fn price(&self) -> Option<u64> {
        match self {
            PriceResult::Found(price) => Some(*price),
            PriceResult::Absent(_) => None,
        }
    }

    pub fn absence(&self) -> Option<Absence> {
        match self {
            PriceResult::Found(_) => None,
            PriceResult::Absent(absence) => Some(*absence),
        }
    }

    /// Report cell: the integer price, or an empty string for every kind of absence.
    pub fn to_cell(&self) -> String {
        self.price().map(|p| p.to_string()).unwrap_or_default()
    }
}

/// One row of the mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkuEntry {
    pub sku_code: String,
    /// Source label to URL, in configured label order. `None` for an empty cell.
    pub urls: Vec<(String, Option<String>)>,
}

impl SkuEntry {
    pub fn url(&self, label: &str) -> Option<&str> {
        self.urls
            .iter()
            .find(|(l, _)| l == label)
            .and_then(|(_, url)| url.as_deref())
    }
}

/// One row of the report, built from exactly one [`SkuEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRow {
    pub sku_code: String,
    /// One result per source label, same order as the entry.
    pub prices: Vec<(String, PriceResult)>,
    /// Reference versus each non-reference label, same relative order.
    pub diffs: Vec<(String, Option<String>)>,
}

impl ComparisonRow {
    pub fn price(&self, label: &str) -> Option<&PriceResult> {
        self.prices.iter().find(|(l, _)| l == label).map(|(_, p)| p)
    }

    pub fn diff(&self, label: &str) -> Option<&str> {
        self.diffs
            .iter()
            .find(|(l, _)| l == label)
            .and_then(|(_, d)| d.as_deref())
    }

    /// Report record: sku, one price cell per label, one diff cell per non-reference label.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(1 + self.prices.len() + self.diffs.len());
        record.push(self.sku_code.clone());
        record.extend(self.prices.iter().map(|(_, p)| p.to_cell()));
        record.extend(self.diffs.iter().map(|(_, d)| d.clone().unwrap_or_default()));
        record
    }
}
