use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tempfile::NamedTempFile;

use crate::enrich::{io_csv, io_excel};
use crate::enrich::{EnrichResult, HtmlPageSnafu, UnsupportedFormatSnafu, WritingOutputSnafu};
use part_lookup::Table;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

/// The format of a table file, from its extension.
pub fn table_format(path: &Path) -> Option<TableFormat> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "csv" => Some(TableFormat::Csv),
        "xlsx" => Some(TableFormat::Xlsx),
        _ => None,
    }
}

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Relative paths of a config file are read from the directory of that file.
pub fn resolve_path(base: Option<&Path>, p: &str) -> PathBuf {
    let path = PathBuf::from(p);
    match base {
        Some(b) if path.is_relative() => b.join(path),
        _ => path,
    }
}

/// True if the start of the content looks like an HTML page.
///
/// Download links that fail tend to save an error page under the expected
/// file name.
pub fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(500)];
    let head = String::from_utf8_lossy(head).to_lowercase();
    head.contains("<html") || head.contains("<!doctype")
}

pub fn read_table(path: &Path, worksheet: Option<&str>) -> EnrichResult<Table> {
    let path_str = path.display().to_string();
    match table_format(path) {
        Some(TableFormat::Csv) => io_csv::read_csv_table(path),
        Some(TableFormat::Xlsx) => {
            // An xlsx file is a zip archive. Anything else fails to open anyway,
            // but an HTML page deserves a clearer message.
            let head = read_head(path)?;
            if looks_like_html(&head) {
                return HtmlPageSnafu { path: path_str }.fail();
            }
            io_excel::read_excel_table(path, worksheet)
        }
        None => UnsupportedFormatSnafu { path: path_str }.fail(),
    }
}

fn read_head(path: &Path) -> EnrichResult<Vec<u8>> {
    use std::io::Read;
    let path_str = path.display().to_string();
    let file = fs::File::open(path).context(crate::enrich::OpeningFileSnafu { path: &path_str })?;
    let mut head = Vec::new();
    file.take(500)
        .read_to_end(&mut head)
        .context(crate::enrich::OpeningFileSnafu { path: path_str })?;
    Ok(head)
}

/// Writes a file in one step: the content goes to a temporary file in the
/// same directory, which is then renamed. A failure leaves no partial file.
pub fn write_atomically<F>(path: &Path, write_content: F) -> EnrichResult<()>
where
    F: FnOnce(&mut dyn Write) -> EnrichResult<()>,
{
    let path_str = path.display().to_string();
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).context(WritingOutputSnafu { path: &path_str })?;
    write_content(tmp.as_file_mut())?;
    tmp.as_file_mut()
        .flush()
        .context(WritingOutputSnafu { path: &path_str })?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .context(WritingOutputSnafu { path: path_str })?;
    Ok(())
}
