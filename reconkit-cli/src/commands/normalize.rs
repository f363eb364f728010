//! Normalize command - parse one value the way the loader would

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use reconkit_core::services::{normalize_amount, normalize_date};
use reconkit_core::{DateOrder, NumberFormat};

#[derive(Subcommand)]
pub enum NormalizeCommands {
    /// Parse an amount such as "$1,234.56" or "(100.00)"
    Amount {
        value: String,
        /// standard (1,234.56) or european (1.234,56)
        #[arg(long)]
        number_format: Option<NumberFormat>,
        /// Extra currency symbol to strip (repeatable)
        #[arg(long)]
        currency: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse a date such as "03/04/2024" or "2024-04-03"
    Date {
        value: String,
        /// Preferred order for ambiguous dates: dmy, mdy or iso
        #[arg(long)]
        date_order: Option<DateOrder>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn report(json: bool, input: &str, parsed: std::result::Result<String, String>) -> Result<()> {
    if json {
        let body = match &parsed {
            Ok(value) => serde_json::json!({ "input": input, "value": value }),
            Err(error) => serde_json::json!({ "input": input, "error": error }),
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        match &parsed {
            Ok(value) => println!("{} {} {}", input, "→".dimmed(), value.green()),
            Err(error) => println!("{} {} {}", input, "→".dimmed(), error.red()),
        }
    }

    // A value that does not parse is a failed command
    if let Err(error) = parsed {
        anyhow::bail!(error);
    }
    Ok(())
}

pub fn run(command: NormalizeCommands) -> Result<()> {
    let ctx = get_context()?;
    let mut options = ctx.config.defaults.load_options();

    match command {
        NormalizeCommands::Amount {
            value,
            number_format,
            currency,
            json,
        } => {
            if let Some(format) = number_format {
                options.amount.number_format = format;
            }
            options.amount.currency_symbols.extend(currency);
            let parsed = normalize_amount(&value, &options.amount)
                .map(|d| d.to_string())
                .map_err(|e| e.to_string());
            report(json, &value, parsed)
        }
        NormalizeCommands::Date {
            value,
            date_order,
            json,
        } => {
            let order = date_order.unwrap_or(options.date_order);
            let parsed = normalize_date(&value, order)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .map_err(|e| e.to_string());
            report(json, &value, parsed)
        }
    }
}
