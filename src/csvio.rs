use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::columns::ColumnSet;
use crate::domain::GridError;
use crate::record::{Dataset, ID_FIELD, Record, Value};

/// Result of parsing a csv file: the schema taken from the header and the rows.
#[derive(Debug)]
pub struct Imported {
    pub columns: ColumnSet,
    pub records: Dataset,
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(input: &str) -> PathBuf {
    match shellexpand::full(input) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            debug!("Could not expand {input}: {e}");
            PathBuf::from(input)
        }
    }
}

pub fn read_file(path: &Path) -> Result<Vec<u8>, GridError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GridError::FileNotFound,
        ErrorKind::PermissionDenied => GridError::PermissionDenied,
        _ => GridError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(GridError::LoadingFailed("Not a file!".into()));
    }
    debug!("Reading {} ({} bytes)", path.display(), metadata.len());
    Ok(fs::read(path)?)
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), GridError> {
    fs::write(path, bytes).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => GridError::PermissionDenied,
        _ => GridError::IoError(e),
    })
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

// Columns polars inferred as numeric become numbers, everything else
// (booleans and dates included) stays text.
fn load_column(column: &Column) -> Result<Vec<Value>, PolarsError> {
    if is_numeric_type(column.dtype()) {
        let col = column.cast(&DataType::Float64)?;
        Ok(col
            .f64()?
            .into_iter()
            .map(|v| v.map(Value::Number).unwrap_or(Value::Absent))
            .collect())
    } else {
        let col = column.cast(&DataType::String)?;
        Ok(col
            .str()?
            .into_iter()
            .map(|v| match v {
                Some(s) if !s.is_empty() => Value::Text(s.to_string()),
                _ => Value::Absent,
            })
            .collect())
    }
}

// Ids from the file are kept only if every row has a unique non-negative integer.
fn parse_ids(values: &[Value]) -> Option<Vec<u64>> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .iter()
        .map(|v| match v {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => {
                let id = *n as u64;
                seen.insert(id).then_some(id)
            }
            _ => None,
        })
        .collect()
}

fn unused_name(names: &[String], base: &str) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while names.iter().any(|name| *name == candidate) {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    candidate
}

pub fn parse_csv(bytes: Vec<u8>) -> Result<Imported, GridError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(GridError::NoRows);
    }
    let start_time = Instant::now();

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    if df.height() == 0 {
        return Err(GridError::NoRows);
    }

    let mut names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    for idx in 0..names.len() {
        if names[idx].trim().is_empty() {
            names[idx] = unused_name(&names, &format!("column_{}", idx + 1));
        }
    }

    // Each column is converted in its own task.
    let data: Vec<Vec<Value>> = df
        .get_columns()
        .par_iter()
        .map(load_column)
        .collect::<Result<_, _>>()?;

    let id_column = names.iter().position(|name| name == ID_FIELD);
    let ids = match id_column.map(|idx| (idx, parse_ids(&data[idx]))) {
        Some((_, Some(ids))) => ids,
        Some((idx, None)) => {
            // Rejected ids stay visible as a regular column.
            names[idx] = unused_name(&names, "id_original");
            info!("Column \"{ID_FIELD}\" is not a unique id, kept as \"{}\"", names[idx]);
            (1..=df.height() as u64).collect()
        }
        None => (1..=df.height() as u64).collect(),
    };

    let columns = ColumnSet::from_header(names.iter().map(String::as_str));
    let records = ids
        .into_iter()
        .enumerate()
        .map(|(row, id)| {
            let mut record = Record::new(id);
            for column in columns.iter() {
                if let Some(cidx) = names.iter().position(|n| *n == column.id) {
                    record.set(column.id.clone(), data[cidx][row].clone());
                }
            }
            record
        })
        .collect::<Dataset>();

    info!(
        "Parsed {} rows with {} columns in {}ms",
        records.len(),
        columns.len(),
        start_time.elapsed().as_millis()
    );
    Ok(Imported { columns, records })
}

/// Serializes the records as csv, `id` first, then the columns in display order.
pub fn write_csv(records: &Dataset, columns: &ColumnSet) -> Result<Vec<u8>, GridError> {
    let mut frame_columns: Vec<Column> = Vec::with_capacity(columns.len() + 1);
    let ids: Vec<u64> = records.iter().map(Record::id).collect();
    frame_columns.push(Column::new(ID_FIELD.into(), ids));

    for def in columns.iter() {
        let data: Vec<Option<String>> = records
            .iter()
            .map(|r| match r.get(&def.id) {
                Value::Absent => None,
                v => Some(v.to_string()),
            })
            .collect();
        frame_columns.push(Column::new(def.id.as_str().into(), data));
    }

    let mut df = DataFrame::new(frame_columns)?;
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df)?;
    Ok(buf)
}
