use log::{debug, info, warn};

use part_lookup::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::enrich::config_reader::*;
use crate::enrich::io_common::{read_table, resolve_path, simplify_file_name};
use crate::enrich::master_files::{FetchCommand, MasterDirectory};

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod master_files;

pub const DEFAULT_CONSTITUENCY_COLUMN: &str = "Selected AC";
pub const DEFAULT_PHONE_COLUMN: &str = "Respondent Contact Number";
pub const DEFAULT_OUTPUT_COLUMN: &str = "PART_NO";
pub const DEFAULT_MASTER_DIR: &str = "master_data";
pub const DEFAULT_CONSTITUENCIES: &str = "assemblyConstituencies.json";

#[derive(Debug, Snafu)]
pub enum EnrichError {
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Excel file {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {name:?} not found in {path}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("{path} looks like an HTML page (a failed download?), not a data file"))]
    HtmlPage { path: String },
    #[snafu(display("Unsupported table format for {path} (expected .csv or .xlsx)"))]
    UnsupportedFormat { path: String },
    #[snafu(display("Error opening JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Region {region:?} not found in {path}. Available regions: {available:?}"))]
    UnknownRegion {
        region: String,
        path: String,
        available: Vec<String>,
    },
    #[snafu(display("No constituency found in {path}"))]
    EmptyReference { path: String },
    #[snafu(display("Column {column:?} not found in {path}. Available columns: {available:?}"))]
    MissingInputColumn {
        column: String,
        path: String,
        available: Vec<String>,
    },
    #[snafu(display("Missing setting: {name} (use the command line or the config file)"))]
    MissingSetting { name: String },
    #[snafu(display("Error writing output file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing CSV data to {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Could not run the fetch command for {file}"))]
    FetchCommand {
        source: std::io::Error,
        file: String,
    },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    SummaryMismatch {},
}

pub type EnrichResult<T> = Result<T, EnrichError>;

/// The settings of a run, after merging the command line, the config file and the defaults.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Settings {
    pub input: PathBuf,
    pub out: PathBuf,
    pub master_dir: PathBuf,
    pub constituencies: PathBuf,
    pub region: Option<String>,
    pub constituency_column: String,
    pub phone_column: String,
    pub output_column: String,
    pub excel_worksheet_name: Option<String>,
    pub summary: Option<String>,
    pub expected_summary: Option<PathBuf>,
    pub fetch_command: Option<String>,
    pub keep_fetched: bool,
}

/// The outcome of a successful run.
#[derive(PartialEq, Debug, Clone)]
pub struct RunReport {
    pub stats: JoinStats,
    pub summary: Summary,
}

pub fn resolve_settings(args: &Args) -> EnrichResult<Settings> {
    let (config, base_dir): (RunConfig, Option<PathBuf>) = match &args.config {
        Some(p) => {
            let config = read_run_config(Path::new(p))?;
            info!("config: {:?}", config);
            (config, Path::new(p).parent().map(|d| d.to_path_buf()))
        }
        None => (RunConfig::default(), None),
    };
    let base = base_dir.as_deref();
    let path_setting = |cli: &Option<String>, cfg: &Option<String>| -> Option<PathBuf> {
        cli.as_ref()
            .map(PathBuf::from)
            .or_else(|| cfg.as_ref().map(|s| resolve_path(base, s)))
    };
    let str_setting = |cli: &Option<String>, cfg: &Option<String>| -> Option<String> {
        cli.clone().or_else(|| cfg.clone())
    };

    Ok(Settings {
        input: path_setting(&args.input, &config.input_path)
            .context(MissingSettingSnafu { name: "input" })?,
        out: path_setting(&args.out, &config.output_path)
            .context(MissingSettingSnafu { name: "out" })?,
        master_dir: path_setting(&args.master_dir, &config.master_data_directory)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MASTER_DIR)),
        constituencies: path_setting(&args.constituencies, &config.constituencies_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONSTITUENCIES)),
        region: str_setting(&args.region, &config.region),
        constituency_column: str_setting(&args.constituency_column, &config.constituency_column)
            .unwrap_or_else(|| DEFAULT_CONSTITUENCY_COLUMN.to_string()),
        phone_column: str_setting(&args.phone_column, &config.phone_column)
            .unwrap_or_else(|| DEFAULT_PHONE_COLUMN.to_string()),
        output_column: str_setting(&args.output_column, &config.output_column)
            .unwrap_or_else(|| DEFAULT_OUTPUT_COLUMN.to_string()),
        excel_worksheet_name: str_setting(
            &args.excel_worksheet_name,
            &config.excel_worksheet_name,
        ),
        // 'stdout' is not a path.
        summary: match (&args.summary, &config.summary_path) {
            (Some(s), _) => Some(s.clone()),
            (None, Some(s)) if s == "stdout" => Some(s.clone()),
            (None, Some(s)) => Some(resolve_path(base, s).display().to_string()),
            (None, None) => None,
        },
        expected_summary: path_setting(&args.expected_summary, &config.expected_summary_path),
        fetch_command: str_setting(&args.fetch_command, &config.fetch_command),
        keep_fetched: args.keep_fetched || config.keep_fetched.unwrap_or(false),
    })
}

pub fn run_with_args(args: &Args) -> EnrichResult<()> {
    let settings = resolve_settings(args)?;
    debug!("settings: {:?}", settings);
    let report = run_enrichment(&settings)?;

    println!("{}", report.summary);
    for c in report
        .stats
        .constituencies
        .iter()
        .filter(|c| c.outcome != PartitionOutcome::Matched)
    {
        println!("  {}: {} rows not processed: {}", c.name, c.rows, outcome_detail(&c.outcome));
    }

    let summary_js = build_summary_js(&settings, &report);
    let pretty_js_summary =
        serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu { path: "summary" })?;
    match settings.summary.as_deref() {
        Some("stdout") => println!("{}", pretty_js_summary),
        Some("") | None => {}
        Some(p) => {
            fs::write(p, &pretty_js_summary).context(WritingOutputSnafu { path: p })?;
            info!("Summary written to {}", p);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &settings.expected_summary {
        check_summary(&pretty_js_summary, summary_p)?;
    }
    Ok(())
}

/// Runs the whole pipeline: reference, input, join, output.
///
/// The output file is written once, at the end. Any error before that point
/// leaves no output file behind.
pub fn run_enrichment(settings: &Settings) -> EnrichResult<RunReport> {
    info!("Loading constituency mappings from {:?}", settings.constituencies);
    let resolver = read_ac_reference(&settings.constituencies, settings.region.as_deref())?;
    info!("Loaded {} constituency mappings", resolver.len());

    let out_str = settings.out.display().to_string();
    if io_common::table_format(&settings.out) != Some(io_common::TableFormat::Csv) {
        return UnsupportedFormatSnafu { path: out_str }.fail();
    }

    info!("Reading input {:?}", settings.input);
    let mut table = read_table(&settings.input, settings.excel_worksheet_name.as_deref())?;
    info!("Loaded {} rows", table.num_rows());

    let input_str = settings.input.display().to_string();
    let ac_idx = input_column(&table, &settings.constituency_column, &input_str)?;
    let phone_idx = input_column(&table, &settings.phone_column, &input_str)?;

    let mut rows: Vec<ResponseRow> = (0..table.num_rows())
        .map(|idx| {
            let name = match table.cell(idx, ac_idx) {
                c if c.is_blank() => None,
                c => Some(c.render()),
            };
            ResponseRow::new(name, table.cell(idx, phone_idx).clone())
        })
        .collect();

    let fetcher = settings.fetch_command.as_deref().map(FetchCommand::new);
    let mut provider = MasterDirectory::new(&settings.master_dir, fetcher, settings.keep_fetched);
    if !settings.master_dir.is_dir() && settings.fetch_command.is_none() {
        warn!(
            "Master data directory not found: {:?}. All the rows will be unmatched.",
            settings.master_dir
        );
    }

    let stats = join(&mut rows, &resolver, &mut provider);
    let summary = summarize(&stats);

    set_output_column(&mut table, &settings.output_column, &rows);
    info!("Saving output: {:?}", settings.out);
    io_csv::write_csv_table(&settings.out, &table)?;
    info!("Output saved to {:?}", settings.out);

    Ok(RunReport { stats, summary })
}

fn input_column(table: &Table, column: &str, path: &str) -> EnrichResult<usize> {
    table
        .column_index(column)
        .context(MissingInputColumnSnafu {
            column,
            path,
            available: table.header.clone(),
        })
}

// Overwrites the column if it already exists, appends it otherwise.
fn set_output_column(table: &mut Table, column: &str, rows: &[ResponseRow]) {
    let col_idx = match table.header.iter().position(|h| h.trim() == column) {
        Some(idx) => idx,
        None => {
            table.header.push(column.to_string());
            table.header.len() - 1
        }
    };
    let width = table.header.len();
    for (cells, row) in table.rows.iter_mut().zip(rows.iter()) {
        if cells.len() < width {
            cells.resize(width, CellValue::Empty);
        }
        cells[col_idx] = CellValue::from(row.part_no());
    }
}

fn outcome_name(outcome: &PartitionOutcome) -> &'static str {
    match outcome {
        PartitionOutcome::Matched => "matched",
        PartitionOutcome::Unresolved => "unresolved",
        PartitionOutcome::NoMasterFile { .. } => "noMasterFile",
        PartitionOutcome::LoadFailed { .. } => "loadFailed",
        PartitionOutcome::EmptyMapping => "emptyMapping",
    }
}

fn outcome_detail(outcome: &PartitionOutcome) -> String {
    match outcome {
        PartitionOutcome::Matched => "matched".to_string(),
        PartitionOutcome::Unresolved => "constituency code not found".to_string(),
        PartitionOutcome::NoMasterFile { tried } => {
            format!("master data file not found (tried: {})", tried.join(", "))
        }
        PartitionOutcome::LoadFailed { reason } => format!("master data not usable: {}", reason),
        PartitionOutcome::EmptyMapping => "no phone number in the master data".to_string(),
    }
}

fn build_summary_js(settings: &Settings, report: &RunReport) -> JSValue {
    let constituencies: Vec<JSValue> = report
        .stats
        .constituencies
        .iter()
        .map(|c| {
            let mut js: JSMap<String, JSValue> = JSMap::new();
            js.insert("name".to_string(), json!(c.name));
            if let Some(r) = &c.record {
                js.insert("code".to_string(), json!(r.code));
                js.insert("numericId".to_string(), json!(r.numeric_id));
            }
            js.insert("rows".to_string(), json!(c.rows));
            js.insert("matched".to_string(), json!(c.matched));
            js.insert("outcome".to_string(), json!(outcome_name(&c.outcome)));
            if c.outcome != PartitionOutcome::Matched {
                js.insert("detail".to_string(), json!(outcome_detail(&c.outcome)));
            }
            JSValue::Object(js)
        })
        .collect();
    let s = &report.summary;
    json!({
        "input": simplify_file_name(&settings.input),
        "totalRows": s.total_rows,
        "matched": s.matched,
        "unmatched": s.unmatched,
        "blankConstituencyRows": report.stats.blank_constituency_rows,
        "matchRate": format!("{:.2}", s.match_rate),
        "constituencies": constituencies,
    })
}

fn check_summary(pretty_js_summary: &str, summary_p: &Path) -> EnrichResult<()> {
    let summary_ref = read_summary(summary_p)?;
    info!("summary: {:?}", summary_ref);
    let pretty_js_summary_ref = serde_json::to_string_pretty(&summary_ref).context(
        ParsingJsonSnafu {
            path: summary_p.display().to_string(),
        },
    )?;
    if pretty_js_summary_ref != pretty_js_summary {
        warn!("Found differences with the reference summary");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_summary, "\n");
        return SummaryMismatchSnafu {}.fail();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const REFERENCE: &str = r#"{"states": {"West Bengal": {"assemblyConstituencies": [
        {"acName": "Kharagpur", "acCode": "WB223", "district": "Paschim Medinipur"},
        {"acName": "Bally", "acCode": "WB169"}
    ]}}}"#;

    fn settings(dir: &Path) -> Settings {
        Settings {
            input: dir.join("responses.csv"),
            out: dir.join("out.csv"),
            master_dir: dir.join("master_data"),
            constituencies: dir.join("acs.json"),
            region: None,
            constituency_column: DEFAULT_CONSTITUENCY_COLUMN.to_string(),
            phone_column: DEFAULT_PHONE_COLUMN.to_string(),
            output_column: DEFAULT_OUTPUT_COLUMN.to_string(),
            excel_worksheet_name: None,
            summary: None,
            expected_summary: None,
            fetch_command: None,
            keep_fetched: false,
        }
    }

    fn setup(dir: &Path, responses: &str) {
        fs::write(dir.join("acs.json"), REFERENCE).unwrap();
        fs::write(dir.join("responses.csv"), responses).unwrap();
        fs::create_dir(dir.join("master_data")).unwrap();
    }

    fn read_output(path: &Path) -> String {
        let bytes = fs::read(path).unwrap();
        assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]), "missing BOM");
        String::from_utf8(bytes[3..].to_vec()).unwrap()
    }

    #[test]
    fn kharagpur_end_to_end() {
        let dir = tempdir().unwrap();
        setup(
            dir.path(),
            "Response ID,Selected AC,Respondent Contact Number\nr1,Kharagpur,+919876543210\nr2,Kharagpur,1234\n",
        );
        fs::write(
            dir.path().join("master_data").join("ac223.csv"),
            "SL,MOBILE_NO,PART_NO\n1,9876543210,P001\n",
        )
        .unwrap();

        let s = settings(dir.path());
        let report = run_enrichment(&s).unwrap();
        assert_eq!(report.summary.matched, 1);
        assert_eq!(report.summary.unmatched, 1);
        assert_eq!(format!("{:.2}", report.summary.match_rate), "50.00");

        let out = read_output(&s.out);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Response ID,Selected AC,Respondent Contact Number,PART_NO",
                "r1,Kharagpur,+919876543210,P001",
                "r2,Kharagpur,1234,",
            ]
        );

        let js = build_summary_js(&s, &report);
        assert_eq!(js["matchRate"], json!("50.00"));
        assert_eq!(js["constituencies"][0]["numericId"], json!("223"));
        assert_eq!(js["constituencies"][0]["outcome"], json!("matched"));
    }

    #[test]
    fn rows_with_trailing_delimiter_are_kept() {
        let dir = tempdir().unwrap();
        setup(
            dir.path(),
            "Selected AC,Respondent Contact Number\nKharagpur,9876543210,\nKharagpur,9000000001\n",
        );
        fs::write(
            dir.path().join("master_data").join("ac223.csv"),
            "MOBILE_NO,PART_NO\n9876543210,P001\n",
        )
        .unwrap();

        let s = settings(dir.path());
        let report = run_enrichment(&s).unwrap();
        assert_eq!(report.summary.total_rows, 2);
        assert_eq!(report.summary.matched, 1);
        assert_eq!(
            read_output(&s.out).lines().collect::<Vec<&str>>(),
            vec![
                "Selected AC,Respondent Contact Number,PART_NO",
                "Kharagpur,9876543210,P001",
                "Kharagpur,9000000001,",
            ]
        );
    }

    #[test]
    fn missing_master_files_are_reported_not_fatal() {
        let dir = tempdir().unwrap();
        setup(
            dir.path(),
            "Selected AC,Respondent Contact Number,PART_NO\nBally,9876543210,old\nAtlantis,9876543211,\n,9876543212,\n",
        );
        let s = settings(dir.path());
        let report = run_enrichment(&s).unwrap();
        assert_eq!(report.summary.total_rows, 3);
        assert_eq!(report.summary.matched, 0);
        assert_eq!(report.stats.blank_constituency_rows, 1);
        let outcomes: Vec<&str> = report
            .stats
            .constituencies
            .iter()
            .map(|c| outcome_name(&c.outcome))
            .collect();
        assert_eq!(outcomes, vec!["noMasterFile", "unresolved"]);

        // The existing column is overwritten.
        let out = read_output(&s.out);
        assert_eq!(
            out.lines().collect::<Vec<&str>>(),
            vec![
                "Selected AC,Respondent Contact Number,PART_NO",
                "Bally,9876543210,",
                "Atlantis,9876543211,",
                ",9876543212,",
            ]
        );
    }

    #[test]
    fn missing_input_column_is_fatal() {
        let dir = tempdir().unwrap();
        setup(dir.path(), "AC,Phone\nBally,9876543210\n");
        let s = settings(dir.path());
        let err = run_enrichment(&s).unwrap_err();
        assert!(matches!(err, EnrichError::MissingInputColumn { .. }));
        assert!(format!("{}", err).contains("Selected AC"));
        assert!(!s.out.exists());
    }

    #[test]
    fn missing_reference_is_fatal() {
        let dir = tempdir().unwrap();
        setup(dir.path(), "Selected AC,Respondent Contact Number\n");
        let mut s = settings(dir.path());
        s.constituencies = dir.path().join("nope.json");
        assert!(matches!(
            run_enrichment(&s),
            Err(EnrichError::OpeningJson { .. })
        ));
        assert!(!s.out.exists());
    }

    #[test]
    fn unusable_master_file_only_affects_its_constituency() {
        let dir = tempdir().unwrap();
        setup(
            dir.path(),
            "Selected AC,Respondent Contact Number\nBally,9000000001\nKharagpur,9000000002\n",
        );
        let master = dir.path().join("master_data");
        fs::write(master.join("ac169.csv"), "NAME,ADDRESS\nx,y\n").unwrap();
        fs::write(master.join("ac223.csv"), "Mobile,Part No\n9000000002,17\n").unwrap();
        let s = settings(dir.path());
        let report = run_enrichment(&s).unwrap();
        assert_eq!(report.summary.matched, 1);
        assert!(matches!(
            report.stats.constituencies[0].outcome,
            PartitionOutcome::LoadFailed { .. }
        ));
    }

    #[test]
    fn same_inputs_same_outputs() {
        let dir = tempdir().unwrap();
        setup(
            dir.path(),
            "Selected AC,Respondent Contact Number\nBally,9000000001\nKharagpur,09000000002\nBally,x\n",
        );
        let master = dir.path().join("master_data");
        fs::write(master.join("ac169.csv"), "PHONE,PART_NO\n9000000001,1\n").unwrap();
        fs::write(master.join("ac223.csv"), "PHONE,PART_NO\n9000000002,2\n").unwrap();
        let s = settings(dir.path());
        let r1 = run_enrichment(&s).unwrap();
        let out1 = fs::read(&s.out).unwrap();
        let r2 = run_enrichment(&s).unwrap();
        let out2 = fs::read(&s.out).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(out1, out2);
    }

    #[test]
    fn summary_check() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("expected.json");
        fs::write(&p, r#"{"matched": 1, "totalRows": 2}"#).unwrap();
        let same = serde_json::to_string_pretty(&json!({"matched": 1, "totalRows": 2})).unwrap();
        assert!(check_summary(&same, &p).is_ok());
        let other = serde_json::to_string_pretty(&json!({"matched": 0, "totalRows": 2})).unwrap();
        assert!(matches!(
            check_summary(&other, &p),
            Err(EnrichError::SummaryMismatch {})
        ));
    }

    #[test]
    fn settings_from_config_file() {
        let dir = tempdir().unwrap();
        let cfg = dir.path().join("run.json");
        fs::write(
            &cfg,
            r#"{"inputPath": "in.csv", "outputPath": "out.csv", "phoneColumn": "Phone", "keepFetched": true}"#,
        )
        .unwrap();
        let args = Args {
            config: Some(cfg.display().to_string()),
            input: None,
            out: Some("elsewhere.csv".to_string()),
            master_dir: None,
            constituencies: None,
            region: None,
            constituency_column: None,
            phone_column: None,
            output_column: None,
            excel_worksheet_name: None,
            summary: None,
            expected_summary: None,
            fetch_command: None,
            keep_fetched: false,
            verbose: false,
        };
        let s = resolve_settings(&args).unwrap();
        assert_eq!(s.input, dir.path().join("in.csv"));
        assert_eq!(s.out, PathBuf::from("elsewhere.csv"));
        assert_eq!(s.phone_column, "Phone");
        assert_eq!(s.constituency_column, DEFAULT_CONSTITUENCY_COLUMN);
        assert_eq!(s.master_dir, PathBuf::from(DEFAULT_MASTER_DIR));
        assert!(s.keep_fetched);

        let no_input = Args {
            config: None,
            ..args
        };
        assert!(matches!(
            resolve_settings(&no_input),
            Err(EnrichError::MissingSetting { .. })
        ));
    }
}
