//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

use reconkit_core::{AmountTotal, Category, ReconSummary, ResultTable};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Column total for display; a sum past the Decimal range shows as "overflow"
pub fn format_total(total: &AmountTotal) -> String {
    match total.total {
        Some(value) => value.to_string(),
        None => "overflow".to_string(),
    }
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Header plus rows as a styled table, showing at most `limit` rows
pub fn rows_table(headers: &[String], rows: &[Vec<String>], limit: usize) -> Table {
    let mut table = create_table();
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    for row in rows.iter().take(limit) {
        table.add_row(row);
    }
    table
}

fn category_color(category: Category) -> Color {
    match category {
        Category::ExactMatches => Color::Green,
        Category::DateNotes => Color::Yellow,
        Category::AmountVariances => Color::Magenta,
        Category::MissingInB | Category::MissingInA => Color::Red,
    }
}

/// One line per category with its count
pub fn summary_table(summary: &ReconSummary) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Category", "Rows"]);
    for category in Category::ALL {
        table.add_row(vec![
            Cell::new(category.label()).fg(category_color(category)),
            Cell::new(summary.count(category)),
        ]);
    }
    table
}

/// Print one result table with a title line and a "more rows" hint
pub fn print_result_table(table: &ResultTable, limit: usize) {
    let category = Category::from_table_name(&table.name);
    let title = category.map(|c| c.label()).unwrap_or(table.name.as_str());
    println!();
    println!("{} ({})", title.bold(), table.rows.len());
    if table.rows.is_empty() {
        println!("  {}", "none".dimmed());
        return;
    }
    println!("{}", rows_table(&table.headers, &table.rows, limit));
    if table.rows.len() > limit {
        println!("  {}", format!("... {} more row(s)", table.rows.len() - limit).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_format_total() {
        let mut total = AmountTotal::default();
        total.add(Decimal::new(1050, 2));
        assert_eq!(format_total(&total), "10.50");
        total.add(Decimal::MAX);
        assert_eq!(format_total(&total), "overflow");
    }
}
