use log::debug;

use crate::config::*;
use crate::phone::normalize;

/// Substrings that identify the phone column of a master data file, by priority.
pub const PHONE_COLUMN_CANDIDATES: &[&str] = &["phone", "mobile", "contact", "tel"];

/// Substrings that identify the part number column of a master data file, by priority.
pub const PART_NO_COLUMN_CANDIDATES: &[&str] =
    &["partno", "part_no", "partnumber", "partnum", "part"];

/// The positions of the columns used to build a mapping.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct MasterColumns {
    pub phone: usize,
    pub part_no: usize,
}

/// Lowercases a header name and drops its separators (`Part No` -> `partno`).
pub fn header_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect()
}

/// Finds the column for a list of candidates.
///
/// Candidates are tried in order; for each one the first header containing it
/// wins. A header matches if either its lowercase form or its separator-free
/// form contains the candidate.
pub fn find_column(header: &[String], candidates: &[&str]) -> Option<usize> {
    let keys: Vec<(String, String)> = header
        .iter()
        .map(|h| (h.trim().to_lowercase(), header_key(h)))
        .collect();
    candidates.iter().find_map(|cand| {
        keys.iter()
            .position(|(lower, key)| lower.contains(cand) || key.contains(cand))
    })
}

pub fn discover_columns(header: &[String]) -> Result<MasterColumns, LookupError> {
    if header.is_empty() {
        return Err(LookupError::EmptyTable);
    }
    let phone =
        find_column(header, PHONE_COLUMN_CANDIDATES).ok_or_else(|| LookupError::MissingColumn {
            role: ColumnRole::Phone,
            header: header.to_vec(),
        })?;
    let part_no = find_column(header, PART_NO_COLUMN_CANDIDATES).ok_or_else(|| {
        LookupError::MissingColumn {
            role: ColumnRole::PartNo,
            header: header.to_vec(),
        }
    })?;
    debug!(
        "discover_columns: phone: {:?} part number: {:?}",
        header[phone], header[part_no]
    );
    Ok(MasterColumns { phone, part_no })
}

/// Builds the phone to part number mapping of a master data table.
///
/// Rows without a usable phone number or without a part number are skipped.
/// Rows are read in file order and the first occurrence of a phone key wins.
pub fn build_mapping(table: &Table) -> Result<MasterMapping, LookupError> {
    let cols = discover_columns(&table.header)?;
    let mut mapping = MasterMapping::new();
    let mut skipped_phone: u64 = 0;
    let mut skipped_part: u64 = 0;
    for (idx, row) in table.rows.iter().enumerate() {
        let key = match row.get(cols.phone).and_then(normalize) {
            Some(k) => k,
            None => {
                skipped_phone += 1;
                continue;
            }
        };
        let part_no = match row.get(cols.part_no) {
            Some(c) if !c.is_blank() => c.render().trim().to_string(),
            _ => {
                skipped_part += 1;
                continue;
            }
        };
        if idx < 5 {
            debug!("build_mapping: sample: {} -> {}", key, part_no);
        }
        mapping.insert(key, part_no);
    }
    debug!(
        "build_mapping: rows: {} keys: {} duplicates: {} no phone: {} no part number: {}",
        table.num_rows(),
        mapping.len(),
        mapping.duplicates(),
        skipped_phone,
        skipped_part
    );
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::normalize_str;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn table(names: &[&str], rows: Vec<Vec<CellValue>>) -> Table {
        Table {
            header: header(names),
            rows,
        }
    }

    #[test]
    fn header_keys() {
        assert_eq!(header_key(" Part No "), "partno");
        assert_eq!(header_key("MOBILE_NO_V1"), "mobilenov1");
        assert_eq!(header_key("Tel-Number"), "telnumber");
    }

    #[test]
    fn column_discovery() {
        let h = header(&["SL", "FM_NAME_EN", "MOBILE_NO", "PART_NO"]);
        assert_eq!(
            discover_columns(&h),
            Ok(MasterColumns {
                phone: 2,
                part_no: 3
            })
        );
        let h = header(&["Contact Number", "Part Number"]);
        assert_eq!(
            discover_columns(&h),
            Ok(MasterColumns {
                phone: 0,
                part_no: 1
            })
        );
    }

    #[test]
    fn candidate_priority_over_column_order() {
        // "department" contains "part", but "partno" is a better candidate.
        let h = header(&["department", "phone", "part_no"]);
        assert_eq!(find_column(&h, PART_NO_COLUMN_CANDIDATES), Some(2));
        let h = header(&["telecom circle", "Mobile"]);
        assert_eq!(find_column(&h, PHONE_COLUMN_CANDIDATES), Some(1));
    }

    #[test]
    fn missing_columns() {
        let h = header(&["name", "PART_NO"]);
        assert!(matches!(
            discover_columns(&h),
            Err(LookupError::MissingColumn {
                role: ColumnRole::Phone,
                ..
            })
        ));
        let h = header(&["name", "phone"]);
        assert!(matches!(
            discover_columns(&h),
            Err(LookupError::MissingColumn {
                role: ColumnRole::PartNo,
                ..
            })
        ));
        assert_eq!(discover_columns(&[]), Err(LookupError::EmptyTable));
    }

    #[test]
    fn first_occurrence_wins() {
        let t = table(
            &["MOBILE_NO", "PART_NO"],
            vec![
                vec!["9876543210".into(), "42".into()],
                vec!["+919876543210".into(), "43".into()],
                vec!["9123456789".into(), "7".into()],
            ],
        );
        let m = build_mapping(&t).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.duplicates(), 1);
        assert_eq!(m.get(&normalize_str("9876543210").unwrap()), Some("42"));
        assert_eq!(m.get(&normalize_str("9123456789").unwrap()), Some("7"));
    }

    #[test]
    fn bad_rows_are_skipped() {
        let t = table(
            &["PART_NO", "MOBILE_NO"],
            vec![
                vec![CellValue::Float(12.0), CellValue::Float(7908938513.0)],
                vec!["13".into(), "123".into()],
                vec![CellValue::Empty, "9000000001".into()],
                vec!["14".into()],
                vec![" 15 ".into(), CellValue::Int(9000000002)],
            ],
        );
        let m = build_mapping(&t).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&normalize_str("7908938513").unwrap()), Some("12"));
        assert_eq!(m.get(&normalize_str("9000000002").unwrap()), Some("15"));
        assert_eq!(m.get(&normalize_str("9000000001").unwrap()), None);
    }
}
