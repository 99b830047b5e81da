// 📗 Workbook Export - Write the categorized output workbook
// One sheet per category plus the review and summary sheets; empty
// sheets are skipped

use crate::aggregator::{CategoryResult, RoeRow};
use crate::engine::FlagEntry;
use crate::record::AddressRecord;
use anyhow::{Context, Result};
use log::info;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;

/// Record columns in output order
const RECORD_COLUMNS: [&str; 10] = [
    "ID",
    "Street Address",
    "Unit Number",
    "Building Type",
    "Subname",
    "City",
    "Zip",
    "Plus 4 Code",
    "Zone",
    "Street Name",
];

// ============================================================================
// WORKBOOK
// ============================================================================

/// Write the full result workbook:
/// All, Public, Commercial, ROE, Competitive, Other, Remove,
/// Flagged for Review, Unit Count
pub fn write_workbook(result: &CategoryResult, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    write_record_sheet(&mut workbook, "All", &result.all, &header)?;
    write_record_sheet(&mut workbook, "Public", &result.public, &header)?;
    write_record_sheet(&mut workbook, "Commercial", &result.commercial, &header)?;
    write_roe_sheet(&mut workbook, &result.roe, &header)?;
    write_record_sheet(&mut workbook, "Competitive", &result.competitive, &header)?;
    write_record_sheet(&mut workbook, "Other", &result.other, &header)?;
    write_record_sheet(&mut workbook, "Remove", &result.remove, &header)?;
    write_flagged_sheet(&mut workbook, &result.flagged, &header)?;
    write_summary_sheet(&mut workbook, result, &header)?;

    workbook
        .save(path)
        .with_context(|| format!("Failed to save workbook: {:?}", path))?;

    info!("saved workbook to {:?}", path);
    Ok(())
}

// ============================================================================
// SHEETS
// ============================================================================

fn write_record_sheet(
    workbook: &mut Workbook,
    name: &str,
    records: &[AddressRecord],
    header: &Format,
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let worksheet = add_sheet(workbook, name)?;
    write_header_row(worksheet, &RECORD_COLUMNS, 0, header)?;

    for (index, record) in records.iter().enumerate() {
        write_record_cells(worksheet, index as u32 + 1, 0, record)?;
    }

    Ok(())
}

fn write_roe_sheet(workbook: &mut Workbook, rows: &[RoeRow], header: &Format) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let worksheet = add_sheet(workbook, "ROE")?;

    // Leading Unit Count column, then the record columns
    worksheet
        .write_string_with_format(0, 0, "Unit Count", header)
        .context("Failed to write ROE header")?;
    write_header_row(worksheet, &RECORD_COLUMNS, 1, header)?;

    for (index, row) in rows.iter().enumerate() {
        let sheet_row = index as u32 + 1;
        match row {
            // Spacer rows stay blank
            RoeRow::Spacer => {}
            RoeRow::Entry(entry) => {
                if let Some(count) = entry.community_unit_count {
                    worksheet
                        .write_number(sheet_row, 0, count as f64)
                        .context("Failed to write unit count")?;
                }
                write_record_cells(worksheet, sheet_row, 1, &entry.record)?;
            }
        }
    }

    Ok(())
}

fn write_flagged_sheet(
    workbook: &mut Workbook,
    flagged: &[FlagEntry],
    header: &Format,
) -> Result<()> {
    if flagged.is_empty() {
        return Ok(());
    }

    let worksheet = add_sheet(workbook, "Flagged for Review")?;
    write_header_row(worksheet, &RECORD_COLUMNS, 0, header)?;
    let reason_col = RECORD_COLUMNS.len() as u16;
    worksheet
        .write_string_with_format(0, reason_col, "Reason", header)
        .context("Failed to write Reason header")?;

    for (index, entry) in flagged.iter().enumerate() {
        let sheet_row = index as u32 + 1;
        write_record_cells(worksheet, sheet_row, 0, &entry.record)?;
        worksheet
            .write_string(sheet_row, reason_col, &entry.reason)
            .context("Failed to write flag reason")?;
    }

    Ok(())
}

fn write_summary_sheet(
    workbook: &mut Workbook,
    result: &CategoryResult,
    header: &Format,
) -> Result<()> {
    let worksheet = add_sheet(workbook, "Unit Count")?;
    worksheet
        .write_string_with_format(0, 0, "Category", header)
        .context("Failed to write summary header")?;
    worksheet
        .write_string_with_format(0, 1, "Count", header)
        .context("Failed to write summary header")?;

    for (index, line) in result.summary.iter().enumerate() {
        let sheet_row = index as u32 + 1;
        worksheet
            .write_string(sheet_row, 0, &line.label)
            .context("Failed to write summary label")?;
        worksheet
            .write_number(sheet_row, 1, line.count as f64)
            .context("Failed to write summary count")?;
    }

    Ok(())
}

// ============================================================================
// CELL HELPERS
// ============================================================================

fn add_sheet<'a>(workbook: &'a mut Workbook, name: &str) -> Result<&'a mut Worksheet> {
    let worksheet = workbook
        .add_worksheet()
        .set_name(name)
        .with_context(|| format!("Failed to create sheet '{}'", name))?;

    // Street/community columns need room; the rest fit the default
    worksheet
        .set_column_width(1, 24)
        .and_then(|ws| ws.set_column_width(4, 22))
        .and_then(|ws| ws.set_column_width(9, 20))
        .with_context(|| format!("Failed to size columns on '{}'", name))?;

    Ok(worksheet)
}

fn write_header_row(
    worksheet: &mut Worksheet,
    columns: &[&str],
    start_col: u16,
    header: &Format,
) -> Result<()> {
    for (offset, column) in columns.iter().enumerate() {
        worksheet
            .write_string_with_format(0, start_col + offset as u16, *column, header)
            .with_context(|| format!("Failed to write header '{}'", column))?;
    }
    Ok(())
}

fn write_record_cells(
    worksheet: &mut Worksheet,
    row: u32,
    start_col: u16,
    record: &AddressRecord,
) -> Result<()> {
    let category_name = record.category.name();
    let values: [Option<&str>; 10] = [
        Some(record.id.as_str()),
        Some(record.street_address.as_str()),
        record.unit_number.as_deref(),
        Some(category_name),
        Some(record.subname.as_str()),
        record.city.as_deref(),
        record.zip.as_deref(),
        record.plus4.as_deref(),
        record.zone.as_deref(),
        record.street_name.as_deref(),
    ];

    for (offset, value) in values.iter().enumerate() {
        if let Some(text) = value {
            worksheet
                .write_string(row, start_col + offset as u16, *text)
                .with_context(|| format!("Failed to write record '{}'", record.id))?;
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
