// Primitives for reading and writing CSV files.

use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::Path;

use log::{debug, warn};
use snafu::ResultExt;

use part_lookup::{CellValue, Table};

use crate::enrich::io_common::{looks_like_html, write_atomically};
use crate::enrich::{
    EnrichResult, HtmlPageSnafu, OpeningFileSnafu, WritingCsvSnafu, WritingOutputSnafu,
};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Reads a CSV file with a header row.
///
/// The encoding (UTF-8 with or without BOM, or Windows-1252) and the delimiter
/// are detected. Rows that cannot be parsed are skipped with a warning. Rows
/// longer than the header are cut to its width, shorter ones are padded with
/// empty cells.
pub fn read_csv_table(path: &Path) -> EnrichResult<Table> {
    let path_str = path.display().to_string();
    let bytes = fs::read(path).context(OpeningFileSnafu { path: &path_str })?;
    if looks_like_html(&bytes) {
        return HtmlPageSnafu { path: path_str }.fail();
    }
    let content = decode(&bytes);
    let delimiter = sniff_delimiter(&content);
    debug!(
        "read_csv_table: {:?}: delimiter {:?}",
        path,
        delimiter as char
    );
    Ok(parse_table(&content, delimiter, &path_str))
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            // Spreadsheet exports on Windows
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded
        }
    }
}

/// Picks the delimiter giving the most consistent number of fields (more
/// than one) over the first lines.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b',', b';', b'\t', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;
    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }
    best
}

fn parse_table(content: &str, delimiter: u8, path: &str) -> Table {
    let mut records = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes())
        .into_records();

    let header: Vec<String> = match records.next() {
        Some(Ok(r)) => r.iter().map(|s| s.trim().to_string()).collect(),
        _ => return Table::default(),
    };
    let width = header.len();
    let mut table = Table::new(header);
    let mut skipped: u64 = 0;
    for (idx, record_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let record = match record_r {
            Ok(r) => r,
            Err(e) => {
                warn!("{}: skipping line {}: {}", path, lineno, e);
                skipped += 1;
                continue;
            }
        };
        // Extra fields are dropped, the row itself is kept. A trailing
        // delimiter only adds empty fields.
        if record.iter().skip(width).any(|f| !f.trim().is_empty()) {
            warn!(
                "{}: line {}: {} fields, expected {}. The extra fields are ignored.",
                path,
                lineno,
                record.len(),
                width
            );
        }
        let mut row: Vec<CellValue> = record.iter().take(width).map(CellValue::from).collect();
        row.resize(width, CellValue::Empty);
        table.rows.push(row);
    }
    debug!(
        "parse_table: {}: {} rows, {} skipped",
        path,
        table.num_rows(),
        skipped
    );
    table
}

/// Writes a table as a comma-separated UTF-8 file with a byte order mark.
pub fn write_csv_table(path: &Path, table: &Table) -> EnrichResult<()> {
    let path_str = path.display().to_string();
    write_atomically(path, |w| {
        w.write_all(UTF8_BOM)
            .context(WritingOutputSnafu { path: &path_str })?;
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(w);
        wtr.write_record(&table.header)
            .context(WritingCsvSnafu { path: &path_str })?;
        for row in table.rows.iter() {
            wtr.write_record(row.iter().map(|c| c.render()))
                .context(WritingCsvSnafu { path: &path_str })?;
        }
        wtr.flush().context(WritingOutputSnafu { path: &path_str })?;
        Ok(())
    })
}
