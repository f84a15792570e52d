use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use futures::StreamExt;
use tokio::fs::File as AsyncFile;
use tokio::io::BufReader;

use crate::config::config::SourcesConfig;
use crate::price_data::SkuEntry;

pub const SKU_COLUMN: &str = "sku_code";

/// Mapping table as read for one run.
#[derive(Debug, Clone)]
pub struct SkuMapping {
    /// Source labels in output order.
    pub labels: Vec<String>,
    pub reference: String,
    pub entries: Vec<SkuEntry>,
}

/// Sets up CSV file reading.
///
/// # Arguments
/// * `source_path` - The path to the source CSV file.
///
/// # Returns a Result containing the CSV reader if successful, or an error if not.
async fn setup_csv_reader(source_path: &str) -> Result<AsyncReader<BufReader<AsyncFile>>> {
    let file = AsyncFile::open(source_path)
        .await
        .with_context(|| format!("Failed to open mapping table {}", source_path))?;
    let reader = BufReader::new(file);
    let csv_reader = AsyncReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv_async::Trim::All)
        .create_reader(reader);

    Ok(csv_reader)
}

/// Reads the SKU mapping table.
///
/// Labels come from `sources.labels`, or from the header when none are configured
/// (every column except `sku_code` and the meta columns). `max` keeps only the
/// first tracked rows.
pub async fn read_sku_mapping(
    source_path: &str,
    sources: &SourcesConfig,
    max: Option<usize>,
) -> Result<SkuMapping> {
    let mut csv_reader = setup_csv_reader(source_path).await?;
    let headers = csv_reader
        .headers()
        .await
        .with_context(|| format!("Failed to read header of {}", source_path))?
        .clone();

    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    let column_index = |name: &str| columns.iter().position(|c| c == name);

    let sku_index = column_index(SKU_COLUMN)
        .with_context(|| format!("Column '{}' not found in {}", SKU_COLUMN, source_path))?;

    let labels = resolve_labels(&columns, sources)?;
    let label_indices = labels
        .iter()
        .map(|label| {
            column_index(label.as_str())
                .map(|i| (label.clone(), i))
                .with_context(|| format!("Source column '{}' not found in {}", label, source_path))
        })
        .collect::<Result<Vec<_>>>()?;

    let status_index = match &sources.status_column {
        Some(column) if !column.is_empty() => Some(
            column_index(column.as_str())
                .with_context(|| format!("Status column '{}' not found in {}", column, source_path))?,
        ),
        _ => None,
    };

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    let mut records = csv_reader.records();
    let mut line = 1;

    while let Some(record) = records.next().await {
        line += 1;
        if max.is_some_and(|max| entries.len() >= max) {
            break;
        }

        let record: StringRecord =
            record.with_context(|| format!("Failed to read CSV record at line {} of {}", line, source_path))?;

        if let Some(index) = status_index {
            let status = record.get(index).unwrap_or_default();
            if !status.eq_ignore_ascii_case(&sources.track_value) {
                continue;
            }
        }

        let sku_code = record.get(sku_index).unwrap_or_default().to_string();
        if sku_code.is_empty() {
            println!("{}", format!("Skipping line {}: empty {}", line, SKU_COLUMN).yellow());
            continue;
        }
        if !seen.insert(sku_code.clone()) {
            println!("{}", format!("Duplicate SKU {} at line {}", sku_code, line).yellow());
        }

        let urls = label_indices
            .iter()
            .map(|(label, index)| {
                let url = record
                    .get(*index)
                    .filter(|cell| !cell.is_empty())
                    .map(str::to_string);
                (label.clone(), url)
            })
            .collect();

        entries.push(SkuEntry { sku_code, urls });
    }

    Ok(SkuMapping {
        labels,
        reference: sources.reference.clone(),
        entries,
    })
}

fn resolve_labels(columns: &[String], sources: &SourcesConfig) -> Result<Vec<String>> {
    let labels: Vec<String> = if sources.labels.is_empty() {
        columns
            .iter()
            .filter(|c| c.as_str() != SKU_COLUMN)
            .filter(|c| !sources.meta_columns.iter().any(|m| m == *c))
            .filter(|c| sources.status_column.as_deref() != Some(c.as_str()))
            .cloned()
            .collect()
    } else {
        sources.labels.clone()
    };

    if labels.is_empty() {
        bail!("No source URL columns configured or detected");
    }
    if !labels.contains(&sources.reference) {
        bail!(
            "Reference column '{}' not found among source columns {:?}",
            sources.reference,
            labels
        );
    }

    Ok(labels)
}
