// 📂 Ingestion - Load address records from CSV and Excel
// Validates required columns, normalizes blanks, and assigns nothing:
// identity comes from the source data's ID column

use crate::record::{AddressRecord, BuildingCategory, NO_SUBNAME};
use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use log::info;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Columns every input file must carry
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "ID",
    "Street Address",
    "Unit Number",
    "Building Type",
    "Subname",
];

// ============================================================================
// RAW ROW
// ============================================================================

/// One row as it appears in the source file, before validation
#[derive(Debug, Default, Deserialize)]
struct RawRow {
    #[serde(rename = "ID", default)]
    id: Option<String>,

    #[serde(rename = "Street Address", default)]
    street_address: Option<String>,

    #[serde(rename = "Unit Number", default)]
    unit_number: Option<String>,

    #[serde(rename = "Building Type", default)]
    building_type: Option<String>,

    #[serde(rename = "Subname", default)]
    subname: Option<String>,

    #[serde(rename = "City", default)]
    city: Option<String>,

    #[serde(rename = "Zip", default)]
    zip: Option<String>,

    #[serde(rename = "Plus 4 Code", default)]
    plus4: Option<String>,

    #[serde(rename = "Zone", default)]
    zone: Option<String>,

    #[serde(rename = "Street Name", default)]
    street_name: Option<String>,
}

// ============================================================================
// LOADERS
// ============================================================================

/// Load records from a CSV or Excel file, dispatching on the extension
pub fn load_records(path: &Path) -> Result<Vec<AddressRecord>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    let records = match extension.as_str() {
        "csv" => load_csv(path)?,
        "xlsx" => load_xlsx(path)?,
        _ => bail!("Input file must be CSV or Excel (.xlsx): {:?}", path),
    };

    info!("loaded {} addresses from {:?}", records.len(), path);
    Ok(records)
}

/// Load records from a CSV file
pub fn load_csv(path: &Path) -> Result<Vec<AddressRecord>> {
    let mut reader = csv::Reader::from_path(path).context("Failed to open CSV file")?;

    // Required columns up front, so a wrong file fails with one clear
    // message instead of a per-row error
    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();
    let present: HashSet<&str> = headers.iter().map(|h| h.trim()).collect();
    check_required_columns(&present)?;

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        // Row 1 is the header
        let row_number = index + 2;
        let raw: RawRow = result.with_context(|| format!("Failed to read CSV row {}", row_number))?;
        records.push(build_record(raw, row_number, &mut seen_ids)?);
    }

    Ok(records)
}

/// Load records from the first sheet of an Excel workbook
pub fn load_xlsx(path: &Path) -> Result<Vec<AddressRecord>> {
    let mut workbook = open_workbook_auto(path).context("Failed to open Excel file")?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first_sheet = match sheet_names.first() {
        Some(name) => name.clone(),
        None => bail!("Excel file contains no sheets"),
    };

    let range = workbook
        .worksheet_range(&first_sheet)
        .with_context(|| format!("Failed to read sheet '{}'", first_sheet))?;

    let mut rows = range.rows();
    let header_row = match rows.next() {
        Some(row) => row,
        None => bail!("Sheet '{}' is empty", first_sheet),
    };

    // Map column name -> position
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (position, cell) in header_row.iter().enumerate() {
        if let Some(name) = cell_to_string(cell) {
            columns.entry(name).or_insert(position);
        }
    }
    let present: HashSet<&str> = columns.keys().map(|k| k.as_str()).collect();
    check_required_columns(&present)?;

    let cell_at = |row: &[Data], name: &str| -> Option<String> {
        columns
            .get(name)
            .and_then(|&position| row.get(position))
            .and_then(cell_to_string)
    };

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (index, row) in rows.enumerate() {
        // Row 1 is the header
        let row_number = index + 2;

        // Skip fully blank rows (trailing padding is common in
        // hand-edited workbooks)
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }

        let raw = RawRow {
            id: cell_at(row, "ID"),
            street_address: cell_at(row, "Street Address"),
            unit_number: cell_at(row, "Unit Number"),
            building_type: cell_at(row, "Building Type"),
            subname: cell_at(row, "Subname"),
            city: cell_at(row, "City"),
            zip: cell_at(row, "Zip"),
            plus4: cell_at(row, "Plus 4 Code"),
            zone: cell_at(row, "Zone"),
            street_name: cell_at(row, "Street Name"),
        };
        records.push(build_record(raw, row_number, &mut seen_ids)?);
    }

    Ok(records)
}

// ============================================================================
// VALIDATION
// ============================================================================

fn check_required_columns(present: &HashSet<&str>) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !present.contains(col))
        .collect();

    if !missing.is_empty() {
        bail!("Missing required columns: {}", missing.join(", "));
    }
    Ok(())
}

/// Validate one raw row and produce the immutable record
fn build_record(
    raw: RawRow,
    row_number: usize,
    seen_ids: &mut HashSet<String>,
) -> Result<AddressRecord> {
    let id = match clean(raw.id) {
        Some(id) => id,
        None => bail!("Row {}: missing ID", row_number),
    };
    if !seen_ids.insert(id.clone()) {
        bail!("Row {}: duplicate ID '{}'", row_number, id);
    }

    let street_address = match clean(raw.street_address) {
        Some(street) => street,
        None => bail!("Row {}: missing Street Address", row_number),
    };

    let category = match clean(raw.building_type) {
        Some(value) => match BuildingCategory::parse(&value) {
            Some(category) => category,
            None => bail!("Row {}: unknown Building Type '{}'", row_number, value),
        },
        None => bail!("Row {}: missing Building Type", row_number),
    };

    let subname = clean(raw.subname).unwrap_or_else(|| NO_SUBNAME.to_string());

    Ok(AddressRecord {
        id,
        street_address,
        unit_number: clean(raw.unit_number),
        category,
        subname,
        city: clean(raw.city),
        zip: clean(raw.zip),
        plus4: clean(raw.plus4),
        zone: clean(raw.zone),
        street_name: clean(raw.street_name),
    })
}

/// Trim and drop empty values: `Some` always holds non-empty text
fn clean(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Convert a spreadsheet cell to its text form. Whole floats render
/// without the trailing ".0" so numeric ID and ZIP columns survive the
/// round trip through Excel's number typing.
fn cell_to_string(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Error(_) => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ============================================================================
// TESTS
// ============================================================================
