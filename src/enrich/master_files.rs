// Locating, fetching and loading the master data files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};
use snafu::ResultExt;

use part_lookup::master::build_mapping;
use part_lookup::{ConstituencyRecord, MasterDataProvider, MasterLoad};

use crate::enrich::io_common::read_table;
use crate::enrich::{EnrichResult, FetchCommandSnafu};

const EXTENSIONS: &[&str] = &["xlsx", "csv"];
const PREFIXES: &[&str] = &["ac", "AC"];
// Files named after the region code (WB223.xlsx) are only looked for padded.
const REGION_PREFIX: &str = "WB";

/// The file names that may hold the master data of a constituency, by preference.
pub fn candidate_file_names(record: &ConstituencyRecord) -> Vec<String> {
    let padded = record.numeric_id.clone();
    let unpadded = record.unpadded_id();
    let mut ids = vec![padded.clone()];
    if unpadded != padded {
        ids.push(unpadded);
    }

    let mut names: Vec<String> = Vec::new();
    for prefix in PREFIXES {
        for id in ids.iter() {
            for ext in EXTENSIONS {
                names.push(format!("{}{}.{}", prefix, id, ext));
            }
        }
    }
    for ext in EXTENSIONS {
        names.push(format!("{}{}.{}", REGION_PREFIX, padded, ext));
    }
    names
}

/// A shell command that places a master data file in the master directory.
///
/// `{file}` is replaced by the file name and `{dir}` by the directory.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FetchCommand {
    template: String,
}

impl FetchCommand {
    pub fn new(template: &str) -> FetchCommand {
        FetchCommand {
            template: template.to_string(),
        }
    }

    pub fn command_line(&self, file: &str, dir: &Path) -> String {
        self.template
            .replace("{file}", file)
            .replace("{dir}", &dir.display().to_string())
    }

    /// Runs the command for one file. Returns whether the command succeeded.
    pub fn run(&self, file: &str, dir: &Path) -> EnrichResult<bool> {
        let cmd = self.command_line(file, dir);
        debug!("FetchCommand: running {:?}", cmd);
        let status = shell(&cmd).status().context(FetchCommandSnafu { file })?;
        if !status.success() {
            debug!("FetchCommand: {:?} exited with {}", cmd, status);
        }
        Ok(status.success())
    }
}

#[cfg(windows)]
fn shell(cmd: &str) -> Command {
    let mut c = Command::new("cmd");
    c.arg("/C").arg(cmd);
    c
}

#[cfg(not(windows))]
fn shell(cmd: &str) -> Command {
    let mut c = Command::new("sh");
    c.arg("-c").arg(cmd);
    c
}

/// Master data stored as one file per constituency in a directory tree.
pub struct MasterDirectory {
    root: PathBuf,
    fetcher: Option<FetchCommand>,
    keep_fetched: bool,
    // Files obtained with the fetch command for the current constituency.
    fetched: Vec<PathBuf>,
}

impl MasterDirectory {
    pub fn new(root: &Path, fetcher: Option<FetchCommand>, keep_fetched: bool) -> MasterDirectory {
        MasterDirectory {
            root: root.to_path_buf(),
            fetcher,
            keep_fetched,
            fetched: Vec::new(),
        }
    }

    /// The directories searched, in order: the root, then its immediate
    /// subdirectories sorted by name.
    fn search_dirs(&self) -> Vec<PathBuf> {
        let mut subdirs: Vec<PathBuf> = match fs::read_dir(&self.root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => Vec::new(),
        };
        subdirs.sort();
        let mut dirs = vec![self.root.clone()];
        dirs.extend(subdirs);
        dirs
    }

    /// The first existing candidate file, if any.
    pub fn locate(&self, record: &ConstituencyRecord) -> Option<PathBuf> {
        let names = candidate_file_names(record);
        for dir in self.search_dirs() {
            for name in names.iter() {
                let p = dir.join(name);
                if p.is_file() {
                    return Some(p);
                }
            }
        }
        None
    }

    fn fetch(&mut self, fetcher: &FetchCommand, names: &[String]) -> EnrichResult<Option<PathBuf>> {
        if let Err(e) = fs::create_dir_all(&self.root) {
            warn!("Could not create {:?}: {}", self.root, e);
        }
        for name in names {
            if !fetcher.run(name, &self.root)? {
                continue;
            }
            let p = self.root.join(name);
            if p.is_file() {
                info!("Fetched {:?}", p);
                self.fetched.push(p.clone());
                return Ok(Some(p));
            }
            debug!("fetch: command succeeded but {:?} does not exist", p);
        }
        Ok(None)
    }
}

impl MasterDataProvider for MasterDirectory {
    fn load(&mut self, record: &ConstituencyRecord) -> MasterLoad {
        let names = candidate_file_names(record);
        let path = match self.locate(record) {
            Some(p) => p,
            None => match self.fetcher.clone() {
                None => return MasterLoad::NotFound { tried: names },
                Some(fetcher) => match self.fetch(&fetcher, &names) {
                    Ok(Some(p)) => p,
                    Ok(None) => return MasterLoad::NotFound { tried: names },
                    Err(e) => {
                        return MasterLoad::Failed {
                            reason: error_chain(&e),
                        }
                    }
                },
            },
        };
        info!("Found master data file: {:?}", path);

        let table = match read_table(&path, None) {
            Ok(t) => t,
            Err(e) => {
                return MasterLoad::Failed {
                    reason: error_chain(&e),
                }
            }
        };
        match build_mapping(&table) {
            Ok(mapping) => MasterLoad::Loaded(mapping),
            Err(e) => MasterLoad::Failed {
                reason: format!("{}: {}", path.display(), e),
            },
        }
    }

    fn release(&mut self, record: &ConstituencyRecord) {
        if self.keep_fetched {
            self.fetched.clear();
            return;
        }
        for p in self.fetched.drain(..) {
            match fs::remove_file(&p) {
                Ok(()) => debug!("release: {}: removed {:?}", record.name, p),
                Err(e) => warn!("Could not remove {:?}: {}", p, e),
            }
        }
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}
