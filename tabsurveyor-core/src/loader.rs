//! Delimited file loading.
//!
//! The file content is decoded with the first candidate encoding that
//! accepts it, then handed to the `csv` reader. The first row becomes the
//! schema and every later row one record. Values stay raw text; numeric
//! coercion is left to the consumers.

use std::borrow::Cow;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{LoaderConfig, TextEncoding};
use crate::error::{PipelineError, Result};
use crate::model::{Dataset, Record, Schema};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Loads a comma-delimited file trying `encodings` in order.
pub fn load(path: impl AsRef<Path>, encodings: &[TextEncoding]) -> Result<Dataset> {
    let config = LoaderConfig::new().with_encodings(encodings.to_vec());
    load_with(path, &config)
}

/// Loads a delimited file according to `config`.
///
/// # Errors
/// * `NotFound` if the path is not a file
/// * `Encoding` if no candidate encoding decodes the content
/// * `Format` if the header is missing or invalid, or a row has the wrong
///   number of columns (the message names the 1-based line)
pub fn load_with(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Dataset> {
    let path = path.as_ref();
    let content = read_decoded(path, config)?;
    let mut rows = parse_rows(&content, config)?.into_iter();

    let (header_line, header) = rows
        .next()
        .ok_or_else(|| PipelineError::format("File has no header row"))?;
    let schema = Schema::new(&header).map_err(|e| match e {
        PipelineError::Format { message } => {
            PipelineError::format(format!("line {}: {}", header_line, message))
        }
        other => other,
    })?;

    let mut records = Vec::new();
    for (line, cells) in rows {
        if cells.len() != schema.len() {
            return Err(PipelineError::format(format!(
                "line {}: expected {} columns but found {}",
                line,
                schema.len(),
                cells.len()
            )));
        }
        records.push(Record::from_cells(cells));
    }

    let name = dataset_name(path);
    let dataset = Dataset::new(name, schema, records)?;
    info!(
        "Loaded {} records with {} fields from {}",
        dataset.len(),
        dataset.schema().len(),
        path.display()
    );
    Ok(dataset)
}

/// Reads only the header row of a delimited file.
pub fn read_headers(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Schema> {
    let path = path.as_ref();
    let content = read_decoded(path, config)?;
    let mut reader = csv_reader(&content, config)?;
    let mut record = csv::StringRecord::new();

    loop {
        let more = reader
            .read_record(&mut record)
            .map_err(|e| PipelineError::format(format!("Malformed header: {}", e)))?;
        if !more {
            return Err(PipelineError::format("File has no header row"));
        }
        if !is_blank_row(&record) {
            return Schema::new(record.iter());
        }
    }
}

/// Dataset identifier derived from the file stem.
pub fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_decoded(path: &Path, config: &LoaderConfig) -> Result<String> {
    config.validate()?;
    if !path.is_file() {
        return Err(PipelineError::not_found(path));
    }
    let bytes = std::fs::read(path)
        .map_err(|e| PipelineError::io(format!("Failed to read {}", path.display()), e))?;

    for encoding in &config.encodings {
        if let Some(text) = decode(&bytes, *encoding) {
            if *encoding != TextEncoding::Utf8 {
                warn!(
                    "{} is not valid UTF-8; decoded as {}",
                    path.display(),
                    encoding.label()
                );
            } else {
                debug!("Decoded {} as {}", path.display(), encoding.label());
            }
            return Ok(text.into_owned());
        }
        debug!("{} did not decode as {}", path.display(), encoding.label());
    }

    Err(PipelineError::Encoding {
        path: path.to_path_buf(),
        tried: config
            .encodings
            .iter()
            .map(|e| e.label().to_string())
            .collect(),
    })
}

fn decode(bytes: &[u8], encoding: TextEncoding) -> Option<Cow<'_, str>> {
    match encoding {
        TextEncoding::Utf8 => {
            let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(body)
        }
        TextEncoding::Latin1 => {
            let (text, had_errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            (!had_errors).then_some(text)
        }
    }
}

fn csv_reader<'a>(content: &'a str, config: &LoaderConfig) -> Result<csv::Reader<&'a [u8]>> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(config.delimiter_byte()?)
        .from_reader(content.as_bytes()))
}

/// Parses every non-blank row, paired with its 1-based line number.
fn parse_rows(content: &str, config: &LoaderConfig) -> Result<Vec<(u64, Vec<String>)>> {
    let mut reader = csv_reader(content, config)?;
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map_or(0, csv::Position::line);
            PipelineError::format(format!("line {}: {}", line, e))
        })?;
        if is_blank_row(&record) {
            continue;
        }
        let line = record.position().map_or(0, csv::Position::line);
        rows.push((line, record.iter().map(str::to_string).collect()));
    }

    Ok(rows)
}

/// A line holding nothing but whitespace.
fn is_blank_row(record: &csv::StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(|f| f.trim().is_empty())
}
