//! Tab-delimited magnetometer file ingest.
//!
//! This module is responsible for turning an instrument export into a
//! `Recording` the pipeline can reduce.
//!
//! File shape:
//! - free-form preamble lines
//! - one header line, the first line containing `Timestamp`
//! - tab-separated numeric rows
//!
//! Design goals:
//! - **Header-driven column mapping** with an explicit override
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no reduction logic here

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::domain::{ColumnMapping, HeaderLayout, Recording, Sweep};
use crate::error::AppError;

/// Header line marker.
const HEADER_MARKER: &str = "Timestamp";

/// Column name patterns of the standard export, in column order.
pub const STANDARD_HEADERS: [&str; 7] = [
    "XXX_",
    "Field_",
    "XXX_T_",
    "HtrPwr_",
    "Voltmeter_",
    "Lockin_V_",
    "Timestamp",
];

/// Column name patterns of the semi-standard export, in column order.
pub const SEMI_STANDARD_HEADERS: [&str; 6] = [
    "Field_001",
    "loadCell_001",
    "temperature_001",
    "angle_001",
    "pickupCoil_001",
    "Timestamp_001",
];

/// Number of indices an explicit mapping must supply.
pub const EXPLICIT_COLUMN_COUNT: usize = 7;

/// Whether `line` is the header line of an instrument export.
pub fn is_header_line(line: &str) -> bool {
    line.contains(HEADER_MARKER)
}

/// Rotator encoder counts → degrees.
pub fn encoder_to_degrees(raw: f64) -> f64 {
    2.7 * raw / 360.0
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Header line plus parsed numeric rows.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    /// 1-based line number of the header line.
    pub header_line: usize,
    /// `(line, values)` for every row that parsed.
    pub rows: Vec<(usize, Vec<f64>)>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Ingest output: recording + how it was mapped + row diagnostics.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub recording: Recording,
    pub mapping: ColumnMapping,
    pub headers: Vec<String>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a data file and map its columns.
///
/// `explicit` holds 1-based column indices in the order
/// angle, field, temperature, heater power, pickup coil, load cell, time.
pub fn load_recording(path: &Path, explicit: Option<&[usize]>) -> Result<IngestedData, AppError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::new(2, format!("Failed to read data file '{}': {e}", path.display()))
    })?;
    let data = ingest_text(&text, explicit)?;
    info!(
        "loaded {}: {} layout, {} of {} rows used",
        path.display(),
        data.mapping.layout.display_name(),
        data.rows_used,
        data.rows_read
    );
    Ok(data)
}

/// Ingest from in-memory file contents.
pub fn ingest_text(text: &str, explicit: Option<&[usize]>) -> Result<IngestedData, AppError> {
    let table = read_table(text)?;
    let mapping = resolve_mapping(&table.headers, explicit)?;
    let (recording, width_errors) = build_recording(&table, &mapping)?;

    let mut row_errors = table.row_errors;
    row_errors.extend(width_errors);
    row_errors.sort_by_key(|e| e.line);
    for e in row_errors.iter().take(5) {
        warn!("line {}: {}", e.line, e.message);
    }

    Ok(IngestedData {
        rows_used: recording.sweep.len(),
        rows_read: table.rows_read,
        recording,
        mapping,
        headers: table.headers,
        row_errors,
    })
}

/// Locate the header line and parse the numeric body.
pub fn read_table(text: &str) -> Result<RawTable, AppError> {
    let mut offset = 0usize;
    let mut header = None;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        offset += line.len();
        if is_header_line(line) {
            header = Some((idx + 1, line));
            break;
        }
    }
    let Some((header_line, line)) = header else {
        return Err(AppError::new(
            2,
            format!("No header line containing `{HEADER_MARKER}` found."),
        ));
    };

    let headers: Vec<String> = line
        .trim()
        .split('\t')
        .map(|h| h.trim().to_string())
        .collect();
    debug!("header line {header_line}: {headers:?}");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text[offset..].as_bytes());

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for result in reader.records() {
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| header_line + p.line() as usize)
                    .unwrap_or(header_line + rows_read);
                row_errors.push(RowError {
                    line,
                    message: format!("parse error: {e}"),
                });
                continue;
            }
        };
        let line = record
            .position()
            .map(|p| header_line + p.line() as usize)
            .unwrap_or(header_line + rows_read);

        // Exports often end rows with a trailing tab.
        let mut fields: Vec<&str> = record.iter().collect();
        while fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }

        match parse_fields(&fields) {
            Ok(values) => rows.push((line, values)),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    Ok(RawTable {
        headers,
        header_line,
        rows,
        row_errors,
        rows_read,
    })
}

fn parse_fields(fields: &[&str]) -> Result<Vec<f64>, String> {
    fields
        .iter()
        .enumerate()
        .map(|(col, s)| {
            s.parse::<f64>()
                .map_err(|_| format!("column {}: `{s}` is not a number", col + 1))
        })
        .collect()
}

/// Decide which column holds which channel.
///
/// An explicit mapping wins; otherwise the standard layout is tried before the
/// semi-standard one.
///
/// The semi-standard export has no heater column. Older reduction scripts
/// filled heater power from column 2 there, which is the temperature channel;
/// this mapping leaves `heater_power` empty instead.
pub fn resolve_mapping(
    headers: &[String],
    explicit: Option<&[usize]>,
) -> Result<ColumnMapping, AppError> {
    if let Some(indices) = explicit {
        return explicit_mapping(indices);
    }
    if matches_layout(headers, &STANDARD_HEADERS) {
        return Ok(ColumnMapping {
            layout: HeaderLayout::Standard,
            angle: 0,
            field: 1,
            temperature: 2,
            heater_power: Some(3),
            pickup_coil: 4,
            load_cell: 5,
            time: 6,
        });
    }
    if matches_layout(headers, &SEMI_STANDARD_HEADERS) {
        return Ok(ColumnMapping {
            layout: HeaderLayout::SemiStandard,
            angle: 3,
            field: 0,
            temperature: 2,
            heater_power: None,
            pickup_coil: 4,
            load_cell: 1,
            time: 5,
        });
    }

    Err(AppError::new(
        2,
        format!(
            "Unrecognized column headers: {}. Map them explicitly with \
             `--columns angle,field,temperature,heater,pickup,load,time` (1-based).",
            headers.join(" | ")
        ),
    ))
}

/// Header `i` must contain pattern `i`, compared pairwise over the shorter list.
fn matches_layout(headers: &[String], patterns: &[&str]) -> bool {
    !headers.is_empty()
        && patterns
            .iter()
            .zip(headers.iter())
            .all(|(pat, h)| h.contains(pat))
}

/// Convert 1-based user indices into a zero-based mapping.
pub fn explicit_mapping(indices: &[usize]) -> Result<ColumnMapping, AppError> {
    if indices.len() != EXPLICIT_COLUMN_COUNT {
        return Err(AppError::new(
            2,
            format!(
                "`--columns` needs {EXPLICIT_COLUMN_COUNT} indices (angle,field,temperature,heater,pickup,load,time), got {}.",
                indices.len()
            ),
        ));
    }
    if let Some(pos) = indices.iter().position(|&i| i == 0) {
        return Err(AppError::new(
            2,
            format!("`--columns` indices are 1-based; entry {} is 0.", pos + 1),
        ));
    }
    let z = |k: usize| indices[k] - 1;
    Ok(ColumnMapping {
        layout: HeaderLayout::Explicit,
        angle: z(0),
        field: z(1),
        temperature: z(2),
        heater_power: Some(z(3)),
        pickup_coil: z(4),
        load_cell: z(5),
        time: z(6),
    })
}

/// Pull channels out of the parsed rows.
///
/// Rows too short for the mapping are skipped and reported.
pub fn build_recording(
    table: &RawTable,
    mapping: &ColumnMapping,
) -> Result<(Recording, Vec<RowError>), AppError> {
    let needed = mapping.max_column() + 1;
    let mut errors = Vec::new();

    let n = table.rows.len();
    let mut sweep = Sweep {
        angle: Vec::with_capacity(n),
        load: Vec::with_capacity(n),
        field: Vec::with_capacity(n),
        time: Vec::with_capacity(n),
    };
    let mut temperature = Vec::with_capacity(n);
    let mut pickup_coil = Vec::with_capacity(n);
    let mut heater_power = mapping.heater_power.map(|_| Vec::with_capacity(n));

    for (line, row) in &table.rows {
        if row.len() < needed {
            errors.push(RowError {
                line: *line,
                message: format!("expected at least {needed} columns, found {}", row.len()),
            });
            continue;
        }
        sweep.angle.push(encoder_to_degrees(row[mapping.angle]));
        sweep.field.push(row[mapping.field]);
        sweep.load.push(row[mapping.load_cell]);
        sweep.time.push(row[mapping.time]);
        temperature.push(row[mapping.temperature]);
        pickup_coil.push(encoder_to_degrees(row[mapping.pickup_coil]));
        if let (Some(col), Some(values)) = (mapping.heater_power, heater_power.as_mut()) {
            values.push(row[col]);
        }
    }

    if sweep.is_empty() {
        return Err(AppError::new(2, "No valid data rows remain after parsing."));
    }

    Ok((
        Recording {
            sweep,
            temperature,
            pickup_coil,
            heater_power,
        },
        errors,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} vs {expected:?}");
        }
    }

    const STANDARD_FILE: &str = "\
Instrument: torque rig
Operator: lab
XXX_001\tField_001\tXXX_T_001\tHtrPwr_001\tVoltmeter_001\tLockin_V_001\tTimestamp
0\t1.0\t77.0\t0.1\t0\t0.50\t0.0
360\t1.0\t77.1\t0.1\t360\t0.52\t0.5\t
720\t1.1\t77.2\t0.1\t720\t0.55\t1.0
";

    #[test]
    fn standard_layout_is_detected_and_scaled() {
        let data = ingest_text(STANDARD_FILE, None).unwrap();
        assert_eq!(data.mapping.layout, HeaderLayout::Standard);
        assert_eq!(data.rows_used, 3);
        assert!(data.row_errors.is_empty());

        let sweep = &data.recording.sweep;
        assert_close(&sweep.angle, &[0.0, 2.7, 5.4]);
        assert_eq!(sweep.load, vec![0.50, 0.52, 0.55]);
        assert_eq!(sweep.field, vec![1.0, 1.0, 1.1]);
        assert_eq!(sweep.time, vec![0.0, 0.5, 1.0]);
        assert_close(&data.recording.pickup_coil, &[0.0, 2.7, 5.4]);
        assert_eq!(data.recording.heater_power.as_deref(), Some(&[0.1, 0.1, 0.1][..]));
    }

    #[test]
    fn semi_standard_layout_has_no_heater_channel() {
        let text = "\
Field_001\tloadCell_001\ttemperature_001\tangle_001\tpickupCoil_001\tTimestamp_001
1.0\t0.25\t4.2\t360\t360\t10.0
1.0\t0.26\t4.2\t720\t720\t10.5
";
        let data = ingest_text(text, None).unwrap();
        assert_eq!(data.mapping.layout, HeaderLayout::SemiStandard);
        assert_close(&data.recording.sweep.angle, &[2.7, 5.4]);
        assert_eq!(data.recording.sweep.load, vec![0.25, 0.26]);
        assert_eq!(data.recording.temperature, vec![4.2, 4.2]);
        assert!(data.recording.heater_power.is_none());
    }

    #[test]
    fn unknown_headers_require_explicit_mapping() {
        let text = "a\tb\tc\tTimestamp\n1\t2\t3\t4\n";
        let err = ingest_text(text, None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("--columns"));

        // angle=3, field=2, temperature=1, heater=1, pickup=3, load=2, time=4
        let data = ingest_text(text, Some(&[3, 2, 1, 1, 3, 2, 4])).unwrap();
        assert_eq!(data.mapping.layout, HeaderLayout::Explicit);
        assert_eq!(data.mapping.angle, 2);
        assert_eq!(data.recording.sweep.load, vec![2.0]);
        assert_eq!(data.recording.sweep.time, vec![4.0]);
    }

    #[test]
    fn explicit_mapping_rejects_zero_and_wrong_length() {
        assert!(explicit_mapping(&[1, 2, 3]).is_err());
        assert!(explicit_mapping(&[1, 2, 3, 0, 5, 6, 7]).is_err());
        let m = explicit_mapping(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(m.time, 6);
        assert_eq!(m.heater_power, Some(3));
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let text = "\
XXX_\tField_\tXXX_T_\tHtrPwr_\tVoltmeter_\tLockin_V_\tTimestamp
0\t1\t2\t3\t4\t5\t6
0\t1\tNaN?\t3\t4\t5\t6
0\t1\t2

360\t1\t2\t3\t4\t5\t7
";
        let data = ingest_text(text, None).unwrap();
        assert_eq!(data.rows_used, 2);
        assert_eq!(data.row_errors.len(), 2);
        assert_eq!(data.row_errors[0].line, 3);
        assert_eq!(data.row_errors[1].line, 4);
    }

    #[test]
    fn missing_header_line_is_an_error() {
        let err = read_table("1\t2\t3\n4\t5\t6\n").unwrap_err();
        assert!(err.to_string().contains("Timestamp"));
    }

    #[test]
    fn header_only_file_has_no_rows() {
        let text = "XXX_\tField_\tXXX_T_\tHtrPwr_\tVoltmeter_\tLockin_V_\tTimestamp\n";
        let err = ingest_text(text, None).unwrap_err();
        assert!(err.to_string().contains("No valid data rows"));
    }
}
