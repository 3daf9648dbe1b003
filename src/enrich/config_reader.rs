use crate::enrich::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The settings of a run, as read from a JSON file. Every field is optional.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "inputPath")]
    pub input_path: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    #[serde(rename = "masterDataDirectory")]
    pub master_data_directory: Option<String>,
    #[serde(rename = "constituenciesPath")]
    pub constituencies_path: Option<String>,
    pub region: Option<String>,
    #[serde(rename = "constituencyColumn")]
    pub constituency_column: Option<String>,
    #[serde(rename = "phoneColumn")]
    pub phone_column: Option<String>,
    #[serde(rename = "outputColumn")]
    pub output_column: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "summaryPath")]
    pub summary_path: Option<String>,
    #[serde(rename = "expectedSummaryPath")]
    pub expected_summary_path: Option<String>,
    #[serde(rename = "fetchCommand")]
    pub fetch_command: Option<String>,
    #[serde(rename = "keepFetched")]
    pub keep_fetched: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AcEntry {
    #[serde(rename = "acName")]
    pub ac_name: String,
    #[serde(rename = "acCode")]
    pub ac_code: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RegionEntry {
    #[serde(rename = "assemblyConstituencies")]
    pub assembly_constituencies: Vec<AcEntry>,
}

/// The constituency reference, in one of its two accepted shapes.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceDocument {
    /// `{"states": {"<region>": {"assemblyConstituencies": [...]}}}`
    Nested { states: BTreeMap<String, RegionEntry> },
    /// `{"<region>": [...]}`
    Flat(BTreeMap<String, Vec<AcEntry>>),
}

impl ReferenceDocument {
    /// The constituencies of each region, with regions sorted by name.
    fn regions(&self) -> Vec<(&str, &[AcEntry])> {
        match self {
            ReferenceDocument::Nested { states } => states
                .iter()
                .map(|(k, v)| (k.as_str(), v.assembly_constituencies.as_slice()))
                .collect(),
            ReferenceDocument::Flat(m) => m.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect(),
        }
    }
}

pub fn read_run_config(path: &Path) -> EnrichResult<RunConfig> {
    let path_str = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: &path_str })?;
    let config: RunConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: path_str })?;
    Ok(config)
}

/// Reads the constituency reference and builds the name resolver.
///
/// Without a region, the constituencies of every region are used. When a name
/// appears more than once, the first region (by name) wins.
pub fn read_ac_reference(path: &Path, region: Option<&str>) -> EnrichResult<AcResolver> {
    let path_str = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: &path_str })?;
    let doc: ReferenceDocument =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: &path_str })?;
    let regions = doc.regions();

    let selected: Vec<(&str, &[AcEntry])> = match region {
        Some(r) => {
            let found: Vec<(&str, &[AcEntry])> =
                regions.iter().filter(|(k, _)| *k == r).cloned().collect();
            if found.is_empty() {
                return UnknownRegionSnafu {
                    region: r,
                    path: path_str,
                    available: regions.iter().map(|(k, _)| k.to_string()).collect::<Vec<_>>(),
                }
                .fail();
            }
            found
        }
        None => regions,
    };

    let mut resolver = AcResolver::new();
    for (region_name, entries) in selected {
        debug!(
            "read_ac_reference: region {:?}: {} constituencies",
            region_name,
            entries.len()
        );
        for entry in entries {
            resolver.insert(&entry.ac_name, &entry.ac_code);
        }
    }
    if resolver.is_empty() {
        return EmptyReferenceSnafu { path: path_str }.fail();
    }
    Ok(resolver)
}

pub fn read_summary(path: &Path) -> EnrichResult<JSValue> {
    let path_str = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: &path_str })?;
    let js: JSValue =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: path_str })?;
    Ok(js)
}
