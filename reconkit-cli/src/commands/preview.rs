//! Preview command - header and first rows of a delimited file

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use super::get_context;
use crate::output;
use reconkit_core::config::{delimiter_byte, parse_delimiter};
use reconkit_core::services::{column_total, preview};
use reconkit_core::CsvFileSource;

pub fn run(file: &Path, rows: usize, delimiter: Option<&str>, amount: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let defaults = &ctx.config.defaults;

    let delimiter = match delimiter {
        Some(d) => parse_delimiter(d)?,
        None => delimiter_byte(defaults.delimiter)?,
    };
    let source = CsvFileSource::new(file).with_delimiter(delimiter);

    let table = preview(&source, rows).with_context(|| format!("Failed to preview {}", file.display()))?;
    let total = match amount {
        Some(column) => Some(column_total(&source, column, &defaults.load_options().amount)?),
        None => None,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "preview": table,
                "amountColumn": amount,
                "amountTotal": total,
            }))?
        );
        return Ok(());
    }

    println!("{} {}", "Source:".bold(), table.source);
    println!("{} {}", "Columns:".bold(), table.headers.join(", "));
    if table.rows.is_empty() {
        output::warning("No data rows.");
    } else {
        println!("{}", output::rows_table(&table.headers, &table.rows, rows));
    }

    if let (Some(column), Some(total)) = (amount, total) {
        println!();
        output::info(&format!(
            "Total of '{}': {} ({} row(s))",
            column,
            output::format_total(&total),
            total.parsed
        ));
        if total.unparsed > 0 {
            output::warning(&format!("{} value(s) in '{}' could not be parsed", total.unparsed, column));
        }
    }

    Ok(())
}
