use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

/// Extraction strategies that can be listed in `extraction.strategies`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    EmbeddedData,
    MetaTag,
    RenderedMarkup,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub file: FileConfig,
    pub http: HttpConfig,
    pub rate_limit: RateLimitConfig,
    pub extraction: ExtractionConfig,
    pub sources: SourcesConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FileConfig {
    pub source_data: String,
    /// `{date}` is replaced by the local run date.
    pub report_data: String,
    pub delimiter: char,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub max_redirects: usize,
    pub user_agent: String,
    pub accept_language: String,
    pub referer: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub interval_ms: u64,
    pub jitter_ms: u64,
    pub max_attempts: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ExtractionConfig {
    pub strategies: Vec<StrategyKind>,
    pub price_selector: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    /// URL columns in output order. Detected from the mapping header when empty.
    pub labels: Vec<String>,
    pub reference: String,
    pub meta_columns: Vec<String>,
    pub status_column: Option<String>,
    pub track_value: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            source_data: "sku_map.csv".to_string(),
            report_data: "today.csv".to_string(),
            delimiter: ',',
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_ms: 15_000,
            max_redirects: 5,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "id-ID,id;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            referer: "https://www.tokopedia.com/".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            interval_ms: 1000,
            jitter_ms: 0,
            max_attempts: 1,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            strategies: vec![StrategyKind::EmbeddedData, StrategyKind::RenderedMarkup],
            price_selector: r#"[data-testid="lblPDPDetailProductPrice"]"#.to_string(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            labels: Vec::new(),
            reference: "our_url".to_string(),
            meta_columns: ["category", "brand", "note", "status"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            status_column: None,
            track_value: "track".to_string(),
        }
    }
}

impl AppConfig {
    /// Checks the options that cannot be caught by deserialization alone.
    /// Label checks that depend on the mapping header happen when it is read.
    pub fn validate(&self) -> Result<()> {
        if self.sources.reference.trim().is_empty() {
            bail!("sources.reference must name the reference URL column");
        }
        if !self.sources.labels.is_empty() && !self.sources.labels.contains(&self.sources.reference) {
            bail!(
                "sources.reference '{}' is not one of sources.labels {:?}",
                self.sources.reference,
                self.sources.labels
            );
        }
        if self.extraction.strategies.is_empty() {
            bail!("extraction.strategies must list at least one strategy");
        }
        if self.rate_limit.max_attempts == 0 {
            bail!("rate_limit.max_attempts must be at least 1");
        }
        if !self.file.delimiter.is_ascii() {
            bail!("file.delimiter must be a single ASCII character");
        }
        Ok(())
    }

    /// Report path with the `{date}` placeholder resolved.
    pub fn report_path(&self, date: &str) -> String {
        with_run_date(&self.file.report_data, date)
    }
}

/// Replaces every `{date}` in a report path template.
pub fn with_run_date(template: &str, date: &str) -> String {
    template.replace("{date}", date)
}

/// Loads the settings file, then `APP_*` environment overrides on top of it.
pub fn load_config(path: &str) -> Result<AppConfig> {
    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .add_source(Environment::with_prefix("APP").prefix_separator("_").separator("__"))
        .build()
        .with_context(|| format!("Failed to read settings from {}", path))?;

    let config: AppConfig = settings
        .try_deserialize()
        .with_context(|| format!("Failed to parse settings from {}", path))?;
    config.validate()?;

    Ok(config)
}
