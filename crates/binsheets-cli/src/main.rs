//! binsheets CLI - inspect, check and recalculate .xls workbooks

use anyhow::{bail, Context, Result};
use binsheets::biff::{self, records};
use binsheets::prelude::*;
use binsheets::{CellAddress, SanityChecker, WorkbookSettings};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bsheets")]
#[command(author, version, about = "Inspect, check and recalculate Excel 97-2003 workbooks")]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a workbook
    Info {
        /// Input .xls file
        input: PathBuf,
    },

    /// List all sheets with their visibility
    Sheets {
        /// Input .xls file
        input: PathBuf,
    },

    /// Print a sheet's cells as tab-separated, formatted text
    Cat {
        /// Input .xls file
        input: PathBuf,

        /// Sheet index (0-based, default: 0)
        #[arg(short, long, default_value = "0")]
        sheet: usize,
    },

    /// Dump the BIFF record stream
    Records {
        /// Input .xls file
        input: PathBuf,
    },

    /// Validate the record structure; exits non-zero on violations
    Check {
        /// Input .xls file
        input: PathBuf,
    },

    /// Recalculate and print formula results
    Eval {
        /// Input .xls file
        input: PathBuf,

        /// Sheet index (0-based, default: every sheet)
        #[arg(short, long)]
        sheet: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(log_level(cli.verbose))
        .init();

    match cli.command {
        Commands::Info { input } => show_info(&input),
        Commands::Sheets { input } => list_sheets(&input),
        Commands::Cat { input, sheet } => cat_sheet(&input, sheet),
        Commands::Records { input } => dump_records(&input),
        Commands::Check { input } => check(&input),
        Commands::Eval { input, sheet } => eval(&input, sheet),
    }
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn open(input: &Path) -> Result<Workbook> {
    Workbook::open(input).with_context(|| format!("Failed to open '{}'", input.display()))
}

fn workbook_stream(input: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read '{}'", input.display()))?;
    XlsReader::extract_stream(&bytes)
        .with_context(|| format!("'{}' holds no BIFF8 workbook stream", input.display()))
}

fn date_system(settings: &WorkbookSettings) -> &'static str {
    if settings.date_1904 {
        "1904"
    } else {
        "1900"
    }
}

fn show_info(input: &Path) -> Result<()> {
    let workbook = open(input)?;

    println!("File: {}", input.display());
    println!("Sheets: {}", workbook.sheet_count());
    println!("Date system: {}", date_system(workbook.settings()));
    println!("Codepage: {}", workbook.settings().codepage);

    for (i, sheet) in workbook.worksheets().enumerate() {
        println!();
        println!("  Sheet {}: \"{}\"", i, sheet.name());
        match sheet.used_range() {
            Some(range) => println!("    Used range: {}", range.to_a1_string()),
            None => println!("    Used range: empty"),
        }
        println!("    Cells: {}", sheet.cell_count());
        println!("    Formulas: {}", sheet.formula_cells().count());
        if sheet.comment_count() > 0 {
            println!("    Comments: {}", sheet.comment_count());
        }
        if let Some(patriarch) = sheet.drawing_patriarch() {
            println!("    Shapes: {}", patriarch.total_shape_count());
        }
    }

    if !workbook.named_ranges().is_empty() {
        println!();
        println!("Names:");
        for name in workbook.named_ranges().iter() {
            let scope = match name.scope.sheet() {
                Some(idx) => format!(" (sheet {})", idx),
                None => String::new(),
            };
            println!("  {}{} = {}", name.name, scope, name.refers_to);
        }
    }

    Ok(())
}

fn visibility_label(visibility: SheetVisibility) -> &'static str {
    match visibility {
        SheetVisibility::Visible => "visible",
        SheetVisibility::Hidden => "hidden",
        SheetVisibility::VeryHidden => "very hidden",
    }
}

fn list_sheets(input: &Path) -> Result<()> {
    let workbook = open(input)?;
    let active = workbook.active_sheet();

    for (i, sheet) in workbook.worksheets().enumerate() {
        let marker = if i == active { "*" } else { "" };
        println!(
            "{}\t{}\t{}{}",
            i,
            sheet.name(),
            visibility_label(sheet.visibility()),
            marker
        );
    }

    Ok(())
}

fn cat_sheet(input: &Path, sheet_idx: usize) -> Result<()> {
    let workbook = open(input)?;
    let sheet = workbook
        .worksheet(sheet_idx)
        .with_context(|| format!("Sheet index {} not found", sheet_idx))?;
    let Some(range) = sheet.used_range() else {
        log::warn!("sheet '{}' is empty", sheet.name());
        return Ok(());
    };

    let formatter = DataFormatter::new();
    let mut out = io::stdout().lock();
    for row in 0..=range.end.row {
        let line: Vec<String> = (0..=range.end.col)
            .map(|col| formatter.format_cell(&workbook, sheet_idx, row, col))
            .collect();
        writeln!(out, "{}", line.join("\t")).context("Failed to write to stdout")?;
    }

    Ok(())
}

fn dump_records(input: &Path) -> Result<()> {
    let stream = workbook_stream(input)?;
    let all = biff::read_all_records(&stream, false).context("Failed to parse records")?;

    let mut out = io::stdout().lock();
    for rec in &all {
        let continues = if rec.continue_offsets.is_empty() {
            String::new()
        } else {
            format!(" (+{} CONTINUE)", rec.continue_offsets.len())
        };
        writeln!(
            out,
            "{:08X}  {:04X}  {:<14} {:>6}{}",
            rec.stream_offset,
            rec.record_type,
            records::record_name(rec.record_type).unwrap_or("?"),
            rec.data.len(),
            continues
        )
        .context("Failed to write to stdout")?;
    }
    log::info!("{} records", all.len());

    Ok(())
}

fn check(input: &Path) -> Result<()> {
    let stream = workbook_stream(input)?;
    let violations = SanityChecker::check_stream(&stream).context("Failed to parse records")?;
    if violations.is_empty() {
        println!("{}: OK", input.display());
        return Ok(());
    }
    for violation in &violations {
        println!("{}", violation);
    }
    bail!(
        "{}: {} structural violation(s)",
        input.display(),
        violations.len()
    )
}

fn eval(input: &Path, sheet: Option<usize>) -> Result<()> {
    let mut workbook = open(input)?;
    let stats = workbook
        .calculate()
        .context("Failed to calculate formulas")?;
    log::info!(
        "calculated {} formulas ({} errors, {} circular)",
        stats.cells_calculated,
        stats.errors,
        stats.circular_references
    );

    let formatter = DataFormatter::new();
    let mut out = io::stdout().lock();
    for (idx, ws) in workbook.worksheets().enumerate() {
        if sheet.map_or(false, |s| s != idx) {
            continue;
        }
        for (row, col, text) in ws.formula_cells() {
            writeln!(
                out,
                "{}!{}\t={}\t{}",
                ws.name(),
                CellAddress::new(row, col).to_a1_string(),
                text,
                formatter.format_cell(&workbook, idx, row, col)
            )
            .context("Failed to write to stdout")?;
        }
    }

    Ok(())
}
