//! Reconcile command - match two delimited files and report or export the tables

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;

use super::get_context;
use crate::output;
use reconkit_core::config::{delimiter_byte, parse_delimiter, Defaults, ReconProfile};
use reconkit_core::services::{export_all, export_combined, load, ExportedFile};
use reconkit_core::{
    Category, CsvFileSource, DateOrder, LoadOptions, NumberFormat, ReconRequest, SideSchema, ToleranceConfig,
};

const COMBINED_FILE_NAME: &str = "reconciliation_combined.csv";

#[derive(Args)]
pub struct ReconcileArgs {
    /// Source A (the side you trust, e.g. the ledger)
    #[arg(required_unless_present = "list_profiles")]
    pub file_a: Option<PathBuf>,
    /// Source B (e.g. the bank statement)
    #[arg(required_unless_present = "list_profiles")]
    pub file_b: Option<PathBuf>,

    /// Key column (both sides unless --key-b is given)
    #[arg(long)]
    pub key: Option<String>,
    /// Key column in B
    #[arg(long)]
    pub key_b: Option<String>,
    /// Date column (both sides)
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub date_a: Option<String>,
    #[arg(long)]
    pub date_b: Option<String>,
    /// Amount column (both sides)
    #[arg(long)]
    pub amount: Option<String>,
    #[arg(long)]
    pub amount_a: Option<String>,
    #[arg(long)]
    pub amount_b: Option<String>,
    /// Description column (both sides, optional)
    #[arg(long)]
    pub desc: Option<String>,
    #[arg(long)]
    pub desc_a: Option<String>,
    #[arg(long)]
    pub desc_b: Option<String>,

    /// Largest amount difference still counted as a match (e.g. 0.01)
    #[arg(long)]
    pub tolerance: Option<Decimal>,
    /// Preferred order for ambiguous dates: dmy, mdy or iso
    #[arg(long)]
    pub date_order: Option<DateOrder>,
    /// standard (1,234.56) or european (1.234,56)
    #[arg(long)]
    pub number_format: Option<NumberFormat>,
    /// Field delimiter for input and exported files (e.g. ",", ";", "tab")
    #[arg(long)]
    pub delimiter: Option<String>,
    /// Worker threads for matching
    #[arg(long)]
    pub workers: Option<usize>,

    /// Write the result tables to this directory
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
    /// Write one combined file instead of one file per table
    #[arg(long, requires = "output")]
    pub combined: bool,
    /// Overwrite existing files without asking
    #[arg(long, short = 'f')]
    pub force: bool,
    /// Rows of each table to print
    #[arg(long, default_value_t = 5)]
    pub show: usize,

    /// Use a saved profile for columns and options
    #[arg(long)]
    pub profile: Option<String>,
    /// Save the columns and options of this run as a profile
    #[arg(long)]
    pub save_profile: Option<String>,
    /// List saved profiles and exit
    #[arg(long)]
    pub list_profiles: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Column assignments and options after applying CLI > profile > defaults
#[derive(Debug, PartialEq)]
struct Resolved {
    side_a: SideSchema,
    side_b: SideSchema,
    options: LoadOptions,
    tolerance: Decimal,
    delimiter: u8,
    workers: usize,
}

fn first(candidates: &[Option<&String>]) -> Option<String> {
    candidates.iter().flatten().next().map(|s| s.to_string())
}

fn required(candidates: &[Option<&String>], flag: &str) -> Result<String> {
    match first(candidates) {
        Some(column) => Ok(column),
        None => bail!("Missing column: pass {} or use --profile", flag),
    }
}

fn resolve(args: &ReconcileArgs, profile: Option<&ReconProfile>, defaults: &Defaults) -> Result<Resolved> {
    let pa = profile.map(|p| &p.side_a);
    let pb = profile.map(|p| &p.side_b);

    let key_a = required(&[args.key.as_ref(), pa.map(|s| &s.key_column)], "--key")?;
    let key_b = first(&[args.key_b.as_ref(), args.key.as_ref(), pb.map(|s| &s.key_column)])
        .unwrap_or_else(|| key_a.clone());

    let mut side_a = SideSchema::new(
        key_a,
        required(&[args.date_a.as_ref(), args.date.as_ref(), pa.map(|s| &s.date_column)], "--date or --date-a")?,
        required(
            &[args.amount_a.as_ref(), args.amount.as_ref(), pa.map(|s| &s.amount_column)],
            "--amount or --amount-a",
        )?,
    );
    side_a.description_column = first(&[
        args.desc_a.as_ref(),
        args.desc.as_ref(),
        pa.and_then(|s| s.description_column.as_ref()),
    ]);

    let mut side_b = SideSchema::new(
        key_b,
        required(&[args.date_b.as_ref(), args.date.as_ref(), pb.map(|s| &s.date_column)], "--date or --date-b")?,
        required(
            &[args.amount_b.as_ref(), args.amount.as_ref(), pb.map(|s| &s.amount_column)],
            "--amount or --amount-b",
        )?,
    );
    side_b.description_column = first(&[
        args.desc_b.as_ref(),
        args.desc.as_ref(),
        pb.and_then(|s| s.description_column.as_ref()),
    ]);

    let mut options = defaults.load_options();
    if let Some(order) = args.date_order.or(profile.and_then(|p| p.date_order)) {
        options.date_order = order;
    }
    if let Some(format) = args.number_format.or(profile.and_then(|p| p.number_format)) {
        options.amount.number_format = format;
    }

    let tolerance = args
        .tolerance
        .or(profile.and_then(|p| p.amount_tolerance))
        .unwrap_or(defaults.amount_tolerance);

    let delimiter = match (&args.delimiter, profile.and_then(|p| p.delimiter)) {
        (Some(d), _) => parse_delimiter(d)?,
        (None, Some(c)) => delimiter_byte(c)?,
        (None, None) => delimiter_byte(defaults.delimiter)?,
    };

    Ok(Resolved {
        side_a,
        side_b,
        options,
        tolerance,
        delimiter,
        workers: args.workers.unwrap_or(defaults.workers),
    })
}

fn spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Ask before overwriting; `--force` and `--json` never prompt
fn confirm_overwrite(existing: &[PathBuf], force: bool, json: bool) -> Result<bool> {
    if existing.is_empty() || force || json {
        return Ok(true);
    }
    let prompt = if existing.len() == 1 {
        format!("Overwrite {}?", existing[0].display())
    } else {
        format!("Overwrite {} existing files?", existing.len())
    };
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

fn existing_exports(dir: &Path, combined: bool) -> Vec<PathBuf> {
    let candidates: Vec<PathBuf> = if combined {
        vec![dir.join(COMBINED_FILE_NAME)]
    } else {
        Category::ALL.iter().map(|c| dir.join(c.file_name())).collect()
    };
    candidates.into_iter().filter(|p| p.exists()).collect()
}

fn list_profiles(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let names = ctx.config.profile_names();

    if json {
        let profiles: serde_json::Map<String, serde_json::Value> = names
            .iter()
            .filter_map(|name| {
                let profile = ctx.config.profile(name)?;
                Some((name.to_string(), serde_json::to_value(profile).ok()?))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    if names.is_empty() {
        println!("No saved profiles.");
        return Ok(());
    }

    println!("Saved reconciliation profiles:");
    for name in names {
        let Some(profile) = ctx.config.profile(name) else {
            continue;
        };
        println!();
        println!("  {}", name.green());
        for (label, side) in [("A", &profile.side_a), ("B", &profile.side_b)] {
            println!(
                "    {}: key={} date={} amount={}{}",
                label,
                side.key_column,
                side.date_column,
                side.amount_column,
                side.description_column
                    .as_deref()
                    .map(|d| format!(" description={}", d))
                    .unwrap_or_default()
            );
        }
        if let Some(tolerance) = profile.amount_tolerance {
            println!("    Tolerance: {}", tolerance);
        }
        if let Some(order) = profile.date_order {
            println!("    Date order: {}", order);
        }
        if let Some(format) = profile.number_format {
            println!("    Number format: {}", format);
        }
    }
    Ok(())
}

pub fn run(args: ReconcileArgs) -> Result<()> {
    if args.list_profiles {
        return list_profiles(args.json);
    }

    let (Some(file_a), Some(file_b)) = (args.file_a.as_deref(), args.file_b.as_deref()) else {
        bail!("Both source files are required");
    };

    let mut ctx = get_context()?;
    let profile = match &args.profile {
        Some(name) => Some(
            ctx.config
                .profile(name)
                .cloned()
                .with_context(|| format!("Profile '{}' not found", name))?,
        ),
        None => None,
    };
    let resolved = resolve(&args, profile.as_ref(), &ctx.config.defaults)?;

    let request = ReconRequest::new(resolved.side_a.clone(), resolved.side_b.clone())
        .with_options(resolved.options.clone())
        .with_tolerance(ToleranceConfig::new(resolved.tolerance)?)
        .with_workers(resolved.workers);

    let source_a = CsvFileSource::new(file_a).with_delimiter(resolved.delimiter);
    let source_b = CsvFileSource::new(file_b).with_delimiter(resolved.delimiter);

    let progress = spinner(args.json);
    progress.set_message(format!("Loading {}", file_a.display()));
    let a = load(&source_a, &request.side_a, &request.options_a)
        .with_context(|| format!("Failed to load {}", file_a.display()))?;
    progress.set_message(format!("Loading {}", file_b.display()));
    let b = load(&source_b, &request.side_b, &request.options_b)
        .with_context(|| format!("Failed to load {}", file_b.display()))?;

    progress.set_message(format!("Reconciling {} x {} rows", a.len(), b.len()));
    let handle = request.engine().spawn(Arc::new(a), Arc::new(b));
    let joined = handle.join();
    progress.finish_and_clear();
    let result = joined.context("Reconciliation failed")?;

    if let Some(name) = &args.save_profile {
        let profile = ReconProfile {
            side_a: resolved.side_a.clone(),
            side_b: resolved.side_b.clone(),
            amount_tolerance: Some(resolved.tolerance),
            date_order: Some(resolved.options.date_order),
            number_format: Some(resolved.options.amount.number_format),
            delimiter: Some(resolved.delimiter as char),
        };
        ctx.config.upsert_profile(name.as_str(), profile)?;
        ctx.save_config()?;
        if !args.json {
            output::success(&format!("Saved profile '{}'", name));
        }
    }

    let mut files: Vec<ExportedFile> = Vec::new();
    let mut combined_path: Option<PathBuf> = None;
    if let Some(dir) = &args.output {
        let existing = existing_exports(dir, args.combined);
        if !confirm_overwrite(&existing, args.force, args.json)? {
            println!("Export cancelled.");
        } else if args.combined {
            let path = dir.join(COMBINED_FILE_NAME);
            export_combined(&result, &path, resolved.delimiter)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            combined_path = Some(path);
        } else {
            files = export_all(&result, dir, resolved.delimiter)
                .with_context(|| format!("Failed to export to {}", dir.display()))?;
        }
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "meta": result.meta,
                "summary": result.summary,
                "fingerprint": result.fingerprint(),
                "files": files,
                "combined": combined_path,
            }))?
        );
        return Ok(());
    }

    let summary = &result.summary;
    println!(
        "{} {} ({} rows) vs {} ({} rows)",
        "Reconciled".bold(),
        result.meta.source_a,
        summary.rows_a,
        result.meta.source_b,
        summary.rows_b
    );
    println!("{}", output::summary_table(summary));
    println!(
        "Totals: A {}  B {}  tolerance {}",
        output::format_total(&summary.total_a),
        output::format_total(&summary.total_b),
        result.meta.amount_tolerance
    );

    let unparseable = summary.unparseable_a + summary.unparseable_b;
    if unparseable > 0 {
        output::warning(&format!(
            "{} row(s) had unparseable amounts or dates (A: {}, B: {})",
            unparseable, summary.unparseable_a, summary.unparseable_b
        ));
    }
    let unkeyed = summary.unkeyed_a + summary.unkeyed_b;
    if unkeyed > 0 {
        output::warning(&format!(
            "{} row(s) had an empty key (A: {}, B: {})",
            unkeyed, summary.unkeyed_a, summary.unkeyed_b
        ));
    }

    if args.show > 0 {
        for table in result.tables() {
            output::print_result_table(&table, args.show);
        }
    }

    println!();
    if let Some(path) = combined_path {
        output::success(&format!("Wrote {}", path.display()));
    }
    for file in &files {
        output::success(&format!("Wrote {} ({} rows)", file.path.display(), file.rows));
    }
    output::info(&format!("Fingerprint: {}", result.fingerprint()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::str::FromStr;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ReconcileArgs,
    }

    fn parse(argv: &[&str]) -> ReconcileArgs {
        let mut full = vec!["rk"];
        full.extend_from_slice(argv);
        TestCli::parse_from(full).args
    }

    #[test]
    fn test_shared_columns_apply_to_both_sides() {
        let args = parse(&["a.csv", "b.csv", "--key", "ref", "--date", "date", "--amount", "amount"]);
        let resolved = resolve(&args, None, &Defaults::default()).unwrap();
        assert_eq!(resolved.side_a, SideSchema::new("ref", "date", "amount"));
        assert_eq!(resolved.side_b, SideSchema::new("ref", "date", "amount"));
        assert_eq!(resolved.tolerance, Decimal::ZERO);
        assert_eq!(resolved.delimiter, b',');
        assert_eq!(resolved.workers, 1);
    }

    #[test]
    fn test_side_specific_columns_win() {
        let args = parse(&[
            "a.csv", "b.csv", "--key", "ref", "--key-b", "invoice", "--date", "date", "--date-b", "posted",
            "--amount-a", "debit", "--amount-b", "total", "--desc-a", "memo",
        ]);
        let resolved = resolve(&args, None, &Defaults::default()).unwrap();
        assert_eq!(resolved.side_a, SideSchema::new("ref", "date", "debit").with_description("memo"));
        assert_eq!(resolved.side_b, SideSchema::new("invoice", "posted", "total"));
    }

    #[test]
    fn test_missing_amount_column_is_an_error() {
        let args = parse(&["a.csv", "b.csv", "--key", "ref", "--date", "date"]);
        let err = resolve(&args, None, &Defaults::default()).unwrap_err();
        assert!(err.to_string().contains("--amount"));
    }

    #[test]
    fn test_cli_overrides_profile_overrides_defaults() {
        let mut profile = ReconProfile::new(
            SideSchema::new("Reference", "Date", "Amount"),
            SideSchema::new("Invoice", "Posted", "Total"),
        );
        profile.amount_tolerance = Some(Decimal::from_str("0.05").unwrap());
        profile.date_order = Some(DateOrder::Mdy);
        profile.delimiter = Some(';');

        let defaults = Defaults {
            workers: 4,
            ..Defaults::default()
        };

        let args = parse(&["a.csv", "b.csv", "--amount-b", "Net", "--tolerance", "0.01"]);
        let resolved = resolve(&args, Some(&profile), &defaults).unwrap();

        assert_eq!(resolved.side_a, SideSchema::new("Reference", "Date", "Amount"));
        assert_eq!(resolved.side_b, SideSchema::new("Invoice", "Posted", "Net"));
        assert_eq!(resolved.tolerance, Decimal::from_str("0.01").unwrap());
        assert_eq!(resolved.options.date_order, DateOrder::Mdy);
        assert_eq!(resolved.options.amount.number_format, NumberFormat::Standard);
        assert_eq!(resolved.delimiter, b';');
        assert_eq!(resolved.workers, 4);
    }

    #[test]
    fn test_list_profiles_needs_no_files() {
        let args = parse(&["--list-profiles"]);
        assert!(args.list_profiles);
        assert!(args.file_a.is_none());
    }

    #[test]
    fn test_existing_exports() {
        let dir = tempfile::tempdir().unwrap();
        assert!(existing_exports(dir.path(), false).is_empty());

        std::fs::write(dir.path().join(Category::MissingInA.file_name()), "x").unwrap();
        assert_eq!(existing_exports(dir.path(), false).len(), 1);
        assert!(existing_exports(dir.path(), true).is_empty());

        // --force skips the prompt
        assert!(confirm_overwrite(&existing_exports(dir.path(), false), true, false).unwrap());
    }
}
