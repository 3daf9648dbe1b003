use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::debug;
use snafu::{OptionExt, ResultExt};

use std::path::Path;

use part_lookup::{CellValue, Table};

use crate::enrich::{
    EmptyExcelSnafu, EnrichResult, MissingWorksheetSnafu, OpeningExcelSnafu,
};

/// Reads a worksheet of an Excel file: the first row is the header.
///
/// Without a worksheet name, the first worksheet of the workbook is used.
pub fn read_excel_table(path: &Path, worksheet: Option<&str>) -> EnrichResult<Table> {
    let wrange = get_range(path, worksheet)?;
    let mut rows = wrange.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(header_name).collect(),
        None => return Ok(Table::default()),
    };
    debug!("read_excel_table: header: {:?}", header);
    let width = header.len();
    let mut table = Table::new(header);
    for row in rows {
        let mut cells: Vec<CellValue> = row.iter().take(width).map(cell_value).collect();
        cells.resize(width, CellValue::Empty);
        table.rows.push(cells);
    }
    debug!("read_excel_table: {:?}: {} rows", path, table.num_rows());
    Ok(table)
}

fn get_range(path: &Path, worksheet: Option<&str>) -> EnrichResult<Range<DataType>> {
    let path_str = path.display().to_string();
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        path, worksheet
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path: &path_str })?;

    match worksheet {
        // A worksheet name was provided, use it.
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu {
                path: &path_str,
                name,
            })?
            .context(OpeningExcelSnafu { path: path_str }),
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path: &path_str })?
            .context(OpeningExcelSnafu { path: path_str }),
    }
}

/// Converts a spreadsheet cell.
///
/// Numbers keep their numeric type; a phone number stored as a number must not
/// go through a text form such as `9.876543210E9`.
pub fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(s) if s.is_empty() => CellValue::Empty,
        DataType::String(s) => CellValue::Text(s.clone()),
        DataType::Int(i) => CellValue::Int(*i),
        DataType::Float(f) => CellValue::Float(*f),
        DataType::DateTime(f) => CellValue::Float(*f),
        DataType::Bool(b) => CellValue::Text(b.to_string()),
        // Formula errors (#N/A, #REF!, ...) and empty cells
        _ => CellValue::Empty,
    }
}

fn header_name(cell: &DataType) -> String {
    cell_value(cell).render().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::EnrichError;
    use calamine::CellErrorType;
    use rust_xlsxwriter::Workbook;
    use std::fs;
    use tempfile::tempdir;

    // Two worksheets: a cover sheet first, then the voter list.
    fn write_workbook(path: &Path) {
        let mut workbook = Workbook::new();
        let cover = workbook.add_worksheet();
        cover.set_name("Cover").unwrap();
        cover.write_string(0, 0, "Constituency").unwrap();
        cover.write_string(1, 0, "Kharagpur").unwrap();

        let voters = workbook.add_worksheet();
        voters.set_name("Voters").unwrap();
        voters.write_string(0, 0, "SL").unwrap();
        voters.write_string(0, 1, "MOBILE_NO").unwrap();
        voters.write_string(0, 2, "PART_NO").unwrap();
        voters.write_number(1, 0, 1.0).unwrap();
        voters.write_number(1, 1, 7908938513.0).unwrap();
        voters.write_number(1, 2, 12.0).unwrap();
        voters.write_number(2, 0, 2.0).unwrap();
        voters.write_string(2, 1, "+91 98765 43210").unwrap();
        voters.write_string(2, 2, "P7").unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn cells() {
        assert_eq!(
            cell_value(&DataType::Float(7908938513.0)),
            CellValue::Float(7908938513.0)
        );
        assert_eq!(cell_value(&DataType::Int(12)), CellValue::Int(12));
        assert_eq!(
            cell_value(&DataType::String("P001".to_string())),
            CellValue::Text("P001".to_string())
        );
        assert_eq!(cell_value(&DataType::String("".to_string())), CellValue::Empty);
        assert_eq!(cell_value(&DataType::Empty), CellValue::Empty);
        assert_eq!(
            cell_value(&DataType::Error(CellErrorType::NA)),
            CellValue::Empty
        );
        assert_eq!(
            cell_value(&DataType::Bool(true)),
            CellValue::Text("true".to_string())
        );
    }

    #[test]
    fn numeric_headers() {
        assert_eq!(header_name(&DataType::Float(2024.0)), "2024");
        assert_eq!(header_name(&DataType::String(" PART_NO ".to_string())), "PART_NO");
    }

    #[test]
    fn not_a_workbook() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("ac001.xlsx");
        fs::write(&p, "PHONE,PART_NO\n").unwrap();
        assert!(matches!(
            read_excel_table(&p, None),
            Err(EnrichError::OpeningExcel { .. })
        ));
    }

    #[test]
    fn worksheet_selection() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("ac223.xlsx");
        write_workbook(&p);

        let first = read_excel_table(&p, None).unwrap();
        assert_eq!(first.header, vec!["Constituency"]);
        assert_eq!(first.rows, vec![vec![CellValue::Text("Kharagpur".to_string())]]);

        let voters = read_excel_table(&p, Some("Voters")).unwrap();
        assert_eq!(voters.header, vec!["SL", "MOBILE_NO", "PART_NO"]);
        assert_eq!(voters.num_rows(), 2);
        assert_eq!(voters.cell(0, 1), &CellValue::Float(7908938513.0));
        assert_eq!(voters.cell(1, 2), &CellValue::Text("P7".to_string()));

        assert!(matches!(
            read_excel_table(&p, Some("Missing")),
            Err(EnrichError::MissingWorksheet { .. })
        ));
    }

    #[test]
    fn numeric_phones_from_a_workbook() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("ac223.xlsx");
        write_workbook(&p);
        let table = read_excel_table(&p, Some("Voters")).unwrap();
        let mapping = part_lookup::master::build_mapping(&table).unwrap();
        assert_eq!(mapping.len(), 2);
        let k = part_lookup::phone::normalize_str("7908938513").unwrap();
        assert_eq!(mapping.get(&k), Some("12"));
        let k = part_lookup::phone::normalize_str("9876543210").unwrap();
        assert_eq!(mapping.get(&k), Some("P7"));
    }
}
