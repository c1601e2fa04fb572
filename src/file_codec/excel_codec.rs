//! Spreadsheet codec (first sheet only)

use crate::error::{IngestError, Result};
use crate::table::{Table, Value};
use crate::type_mapper::DomainType;
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};
use std::path::Path;

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Hidden sheet recording each column's domain type, so a workbook written
/// here reads back with the same types.
const TYPES_SHEET: &str = "_column_types";

/// Largest magnitude an f64 holds exactly; bigger ints are stored as text.
const MAX_EXACT_INT: u64 = 1 << 53;

pub fn read(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IngestError::file_read(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::file_read(path, "workbook has no sheets"))?
        .map_err(|e| IngestError::file_read(path, e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok(Table::default()),
    };

    let mut table = Table::new(headers);
    for row in rows {
        table.push_row(row.iter().map(cell_to_value).collect())?;
    }

    let declared = if workbook.sheet_names().iter().any(|name| name == TYPES_SHEET) {
        let types = workbook
            .worksheet_range(TYPES_SHEET)
            .map_err(|e| IngestError::file_read(path, e))?;
        Some(declared_types(&types, table.columns()))
    } else {
        None
    };

    match declared {
        Some(declared) => apply_declared_types(&mut table, &declared),
        None => integral_floats_to_ints(&mut table),
    }
    Ok(table)
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::String(cell.to_string())),
        Data::DurationIso(s) => Value::String(s.clone()),
    }
}

/// Types sheet layout: column names on row 0, type names on row 1
fn declared_types(range: &Range<Data>, columns: &[String]) -> Vec<Option<DomainType>> {
    let mut rows = range.rows();
    let names: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    let types: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();

    columns
        .iter()
        .map(|column| {
            names
                .iter()
                .position(|n| n == column)
                .and_then(|idx| types.get(idx))
                .map(|t| DomainType::from_name(t))
        })
        .collect()
}

fn apply_declared_types(table: &mut Table, declared: &[Option<DomainType>]) {
    for (index, domain_type) in declared.iter().enumerate() {
        match domain_type {
            Some(DomainType::Int64) => table.map_column(index, |v| match v {
                Value::Float(f) if f.fract() == 0.0 => Value::Int(*f as i64),
                Value::String(s) => s.parse().map(Value::Int).unwrap_or_else(|_| v.clone()),
                other => other.clone(),
            }),
            // numbers in a text column were whole-number cells before writing
            Some(DomainType::Other) => table.map_column(index, |v| match v {
                Value::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT as f64 => {
                    Value::Int(*f as i64)
                }
                other => other.clone(),
            }),
            _ => {}
        }
    }
}

/// Spreadsheets from elsewhere store every number as a float; columns
/// holding only whole numbers come back as integers.
fn integral_floats_to_ints(table: &mut Table) {
    for index in 0..table.column_count() {
        let mut any = false;
        let all_whole = table.column_values(index).all(|v| match v {
            Value::Null => true,
            Value::Float(f) => {
                any = true;
                f.fract() == 0.0 && f.abs() < i64::MAX as f64
            }
            _ => false,
        });
        if any && all_whole {
            table.map_column(index, |v| match v {
                Value::Float(f) => Value::Int(*f as i64),
                other => other.clone(),
            });
        }
    }
}

pub fn write(table: &Table, path: &Path) -> Result<()> {
    write_workbook(table, path).map_err(|e| IngestError::file_write(path, e))
}

fn cell_index(row: usize, col: usize) -> std::result::Result<(u32, u16), XlsxError> {
    let row = u32::try_from(row).map_err(|_| XlsxError::RowColumnLimitError)?;
    let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
    Ok((row, col))
}

fn write_workbook(table: &Table, path: &Path) -> std::result::Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);

    {
        let worksheet = workbook.add_worksheet();

        for (col, name) in table.columns().iter().enumerate() {
            let (r, c) = cell_index(0, col)?;
            worksheet.write_string(r, c, name)?;
        }

        for (idx, row) in table.rows().iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                let (r, c) = cell_index(idx + 1, col)?;
                match value {
                    Value::Null => {}
                    Value::Bool(b) => {
                        worksheet.write_boolean(r, c, *b)?;
                    }
                    Value::Int(i) if i.unsigned_abs() > MAX_EXACT_INT => {
                        worksheet.write_string(r, c, &i.to_string())?;
                    }
                    Value::Int(i) => {
                        worksheet.write_number(r, c, *i as f64)?;
                    }
                    Value::Float(f) if f.is_finite() => {
                        worksheet.write_number(r, c, *f)?;
                    }
                    Value::Float(_) => {}
                    Value::String(s) => {
                        worksheet.write_string(r, c, s)?;
                    }
                    Value::Timestamp(ts) => match to_excel_datetime(ts) {
                        Some(dt) => {
                            worksheet.write_datetime_with_format(r, c, &dt, &datetime_format)?;
                        }
                        // outside Excel's 1900..9999 range
                        None => {
                            worksheet.write_string(r, c, &value.to_string())?;
                        }
                    },
                }
            }
        }
    }

    let types = workbook.add_worksheet();
    types.set_name(TYPES_SHEET)?;
    types.set_hidden(true);
    for (col, (name, domain_type)) in table.columns().iter().zip(table.domain_types()).enumerate() {
        let (_, c) = cell_index(0, col)?;
        types.write_string(0, c, name)?;
        types.write_string(1, c, &domain_type.to_string())?;
    }

    workbook.save(path)
}

fn to_excel_datetime(ts: &NaiveDateTime) -> Option<ExcelDateTime> {
    let year = u16::try_from(ts.year()).ok()?;
    let seconds = ts.second() as f64 + ts.nanosecond() as f64 / 1e9;
    ExcelDateTime::from_ymd(year, ts.month() as u8, ts.day() as u8)
        .and_then(|d| d.and_hms(ts.hour() as u16, ts.minute() as u8, seconds))
        .ok()
}
