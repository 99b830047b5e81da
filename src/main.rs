// Address Sorter - CLI
// Load a CSV/XLSX export, run the ROE rule engine, write the
// categorized workbook

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use address_sorter::{
    file_fingerprint, insert_run, load_records, setup_database, sort_addresses, write_workbook,
    RunSummary, SorterConfig,
};

struct Options {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    db: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")
        .context("Failed to configure logging")?
        .start()
        .context("Failed to start logging")?;

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Some(options) => options,
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    run(&options)
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut positional: Vec<&String> = Vec::new();
    let mut config = None;
    let mut db = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(iter.next()?)),
            "--db" => db = Some(PathBuf::from(iter.next()?)),
            _ if arg.starts_with("--") => return None,
            _ => positional.push(arg),
        }
    }

    let input = PathBuf::from(positional.first()?);
    let output = positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| derive_output(&input));

    Some(Options {
        input,
        output,
        config,
        db,
    })
}

/// "input.csv" -> "input_sorted.xlsx", next to the input
fn derive_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}_sorted.xlsx", stem))
}

fn print_usage() {
    eprintln!("Usage: address-sorter <input_file> [output_file] [--config rules.json] [--db runs.db]");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  address-sorter input.csv output.xlsx");
    eprintln!("  address-sorter input.xlsx");
    eprintln!("  address-sorter input.csv --db runs.db");
}

fn run(options: &Options) -> Result<()> {
    println!("🏠 Address Sorter v{}", address_sorter::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = match &options.config {
        Some(path) => {
            let config = SorterConfig::from_file(path)?;
            println!("✓ Loaded config from {:?}", path);
            config
        }
        None => SorterConfig::default(),
    };

    // 1. Load input
    println!("\n📂 Loading {:?}...", options.input);
    let records = load_records(&options.input)?;
    println!("✓ Loaded {} addresses", records.len());

    // 2. Sort and deduplicate
    println!("\n⚖️  Processing ROE deduplication...");
    let result = sort_addresses(&records, &config);

    println!("\nUnit Count Summary:");
    for line in &result.summary {
        println!("  {}: {}", line.label, line.count);
    }
    println!("  Flagged for Review: {}", result.flagged.len());

    // 3. Write workbook
    println!("\n💾 Saving workbook...");
    write_workbook(&result, &options.output)?;
    println!("✓ Saved to {:?}", options.output);

    // 4. Record the run (optional)
    if let Some(db_path) = &options.db {
        let conn = rusqlite::Connection::open(db_path)
            .with_context(|| format!("Failed to open run database: {:?}", db_path))?;
        setup_database(&conn)?;

        let hash = file_fingerprint(&options.input)?;
        let source = options.input.to_string_lossy().to_string();
        let run = RunSummary::from_result(&source, &hash, &result);
        insert_run(&conn, &run, &result.flagged)?;
        println!("✓ Recorded run {} in {:?}", run.id, db_path);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🎉 Processing complete");

    Ok(())
}
