//! Upload ingestion and validation.
//!
//! Turns raw upload bytes into a Polars [`DataFrame`]: strict UTF-8 decode,
//! field-delimiter detection (`;` preferred over `,`, whole-content sniff as
//! a last resort), CSV parse from an in-memory cursor, and header
//! normalisation. Validation then checks that the three required feature
//! columns exist.
//!
//! Headers are trimmed and lowercased after parsing, so `Margin_low` or a
//! padded ` length ` still validate. Both upload flows (prediction and
//! monitoring) share this path.

use crate::error::{PipelineError, Result};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use tracing::debug;

/// Columns every upload must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 3] = ["margin_low", "margin_up", "length"];

/// Decode upload bytes as UTF-8 text.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Determine the field delimiter of delimited text.
///
/// Semicolon wins if the header line contains one, then comma; when neither
/// appears in the header the whole content is sniffed by frequency.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if header.contains(';') {
        return b';';
    }
    if header.contains(',') {
        return b',';
    }
    let semicolons = text.matches(';').count();
    let commas = text.matches(',').count();
    if semicolons >= commas { b';' } else { b',' }
}

/// Parse delimited text into a tabular frame with normalised headers.
pub fn read_frame(text: &str) -> Result<DataFrame> {
    if text.trim().is_empty() {
        return Err(PipelineError::Parse("empty upload".to_string()));
    }

    let delimiter = detect_delimiter(text);
    debug!("parsing upload with delimiter {:?}", delimiter as char);

    let mut df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_separator(delimiter))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes()))
        .finish()
        .map_err(|e| PipelineError::Parse(e.to_string()))?;

    normalise_headers(&mut df)?;
    Ok(df)
}

/// Decode and parse raw upload bytes in one step.
pub fn parse_upload(bytes: &[u8]) -> Result<DataFrame> {
    let text = decode_text(bytes)?;
    read_frame(&text)
}

/// Trim and lowercase every column name.
fn normalise_headers(df: &mut DataFrame) -> Result<()> {
    let renames: Vec<(String, String)> = df
        .get_column_names()
        .iter()
        .filter_map(|name| {
            let normalised = name.trim().to_lowercase();
            (normalised != name.as_str()).then(|| (name.to_string(), normalised))
        })
        .collect();

    for (old, new) in renames {
        df.rename(&old, new.into())
            .map_err(|e| PipelineError::Parse(e.to_string()))?;
    }
    Ok(())
}

/// Verify the three required columns exist.
///
/// Returns [`PipelineError::MissingColumns`] naming every absent column;
/// callers must not attempt inference after this fails.
pub fn check_required_columns(df: &DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !names.iter().any(|n| n == *required))
        .map(|required| required.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumns(missing))
    }
}
