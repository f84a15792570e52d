use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;
use tempfile::NamedTempFile;

use crate::price_data::ComparisonRow;
use crate::utilities::csv_reader::SKU_COLUMN;

/// Header row: sku, `<label>_price` per label, `<label>_diff_pct` per non-reference label.
pub fn report_headers(labels: &[String], reference: &str) -> Vec<String> {
    let mut headers = vec![SKU_COLUMN.to_string()];
    headers.extend(labels.iter().map(|label| format!("{}_price", label)));
    headers.extend(
        labels
            .iter()
            .filter(|label| label.as_str() != reference)
            .map(|label| format!("{}_diff_pct", label)),
    );
    headers
}

/// Writes the whole report next to `report_path`, then renames it into place,
/// so readers never see a partial file.
pub fn write_report(
    report_path: &str,
    labels: &[String],
    reference: &str,
    rows: &[ComparisonRow],
    delimiter: u8,
) -> Result<()> {
    let target = Path::new(report_path);
    let directory = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp_file = NamedTempFile::new_in(directory)
        .with_context(|| format!("Failed to create temporary report in {}", directory.display()))?;

    {
        let mut csv_writer = WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(temp_file.as_file());

        csv_writer
            .write_record(report_headers(labels, reference))
            .context("Failed to write report header")?;
        for row in rows {
            csv_writer
                .write_record(row.to_record())
                .with_context(|| format!("Failed to write report row for {}", row.sku_code))?;
        }
        csv_writer.flush().context("Failed to flush report")?;
    }

    temp_file
        .persist(target)
        .with_context(|| format!("Failed to write report {}", report_path))?;

    Ok(())
}
