mod config;

pub mod ac;
pub mod manual;
pub mod master;
pub mod phone;
pub mod report;

use log::{debug, info, warn};

use std::collections::HashMap;

pub use crate::ac::AcResolver;
pub use crate::config::*;
pub use crate::report::summarize;

/// The result of looking for the master data of one constituency.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum MasterLoad {
    /// No file exists for this constituency. Lists the names that were tried.
    NotFound { tried: Vec<String> },
    /// A file exists but could not be read or has no usable columns.
    Failed { reason: String },
    Loaded(MasterMapping),
}

/// Where the master data comes from.
///
/// The join asks for one constituency at a time and drops the mapping before
/// asking for the next one, so that only one mapping is held in memory.
pub trait MasterDataProvider {
    fn load(&mut self, record: &ConstituencyRecord) -> MasterLoad;

    /// Called after the rows of a constituency have been processed, whatever the outcome.
    fn release(&mut self, _record: &ConstituencyRecord) {}
}

/// A provider backed by mappings already in memory, keyed by numeric id.
impl MasterDataProvider for HashMap<String, MasterMapping> {
    fn load(&mut self, record: &ConstituencyRecord) -> MasterLoad {
        match self.get(&record.numeric_id) {
            Some(m) => MasterLoad::Loaded(m.clone()),
            None => MasterLoad::NotFound {
                tried: vec![record.numeric_id.clone()],
            },
        }
    }
}

/// Fills in the part number of the response rows.
///
/// Rows are grouped by constituency name. Each constituency is resolved to
/// its record, and the constituencies are processed one after the other in
/// increasing numeric id. For each of them the master data is requested from
/// the provider, and every row whose phone key is found gets its part number.
///
/// Rows whose constituency is blank or unknown are never looked up and count
/// as unmatched.
pub fn join<P: MasterDataProvider>(
    rows: &mut [ResponseRow],
    resolver: &AcResolver,
    provider: &mut P,
) -> JoinStats {
    info!(
        "Processing {:?} rows, {:?} known constituencies",
        rows.len(),
        resolver.len()
    );

    // Distinct names, in order of first appearance, with their rows.
    let mut partitions: Vec<(String, Vec<usize>)> = Vec::new();
    let mut partition_idx: HashMap<String, usize> = HashMap::new();
    let mut blank_constituency_rows: u64 = 0;
    for (idx, row) in rows.iter().enumerate() {
        match &row.constituency {
            Some(name) => {
                let p = *partition_idx.entry(name.clone()).or_insert_with(|| {
                    partitions.push((name.clone(), Vec::new()));
                    partitions.len() - 1
                });
                partitions[p].1.push(idx);
            }
            None => {
                blank_constituency_rows += 1;
            }
        }
    }

    let mut resolved: Vec<(ConstituencyRecord, Vec<usize>)> = Vec::new();
    let mut unresolved: Vec<(String, Vec<usize>)> = Vec::new();
    for (name, idxs) in partitions {
        match resolver.resolve(&name) {
            Some(record) => resolved.push((record, idxs)),
            None => {
                warn!("Constituency code not found for: {:?}", name);
                unresolved.push((name, idxs));
            }
        }
    }
    resolved.sort_by(|(r1, _), (r2, _)| {
        r1.number()
            .cmp(&r2.number())
            .then_with(|| r1.name.cmp(&r2.name))
    });
    unresolved.sort_by(|(n1, _), (n2, _)| n1.cmp(n2));

    let num_resolved = resolved.len();
    let mut stats: Vec<ConstituencyStats> = Vec::new();
    let mut total_matched: u64 = 0;
    for (i, (record, idxs)) in resolved.into_iter().enumerate() {
        info!(
            "AC {}/{}: {} ({}): {} rows",
            i + 1,
            num_resolved,
            record.name,
            record.code,
            idxs.len()
        );
        let (matched, outcome) = match provider.load(&record) {
            MasterLoad::NotFound { tried } => {
                warn!(
                    "Master data file not found for {} (tried: {})",
                    record.name,
                    tried.join(", ")
                );
                (0, PartitionOutcome::NoMasterFile { tried })
            }
            MasterLoad::Failed { reason } => {
                warn!("Could not load master data for {}: {}", record.name, reason);
                (0, PartitionOutcome::LoadFailed { reason })
            }
            MasterLoad::Loaded(mapping) if mapping.is_empty() => {
                warn!(
                    "No phone to part number mapping created for {}",
                    record.name
                );
                (0, PartitionOutcome::EmptyMapping)
            }
            MasterLoad::Loaded(mapping) => {
                info!("Created {} phone to part number mappings", mapping.len());
                let matched = lookup_partition(rows, &idxs, &mapping);
                (matched, PartitionOutcome::Matched)
            }
        };
        provider.release(&record);
        total_matched += matched;
        info!(
            "Matched {}/{} rows. Overall progress: {}/{} | total matched: {}",
            matched,
            idxs.len(),
            i + 1,
            num_resolved,
            total_matched
        );
        stats.push(ConstituencyStats {
            name: record.name.clone(),
            record: Some(record),
            rows: idxs.len() as u64,
            matched,
            outcome,
        });
    }

    for (name, idxs) in unresolved {
        stats.push(ConstituencyStats {
            name,
            record: None,
            rows: idxs.len() as u64,
            matched: 0,
            outcome: PartitionOutcome::Unresolved,
        });
    }

    JoinStats {
        constituencies: stats,
        blank_constituency_rows,
    }
}

fn lookup_partition(rows: &mut [ResponseRow], idxs: &[usize], mapping: &MasterMapping) -> u64 {
    let mut matched: u64 = 0;
    let mut unmatched_samples: Vec<String> = Vec::new();
    for &idx in idxs {
        let row = &mut rows[idx];
        let key = phone::normalize(&row.phone);
        match key.as_ref().and_then(|k| mapping.get(k)) {
            Some(part_no) => {
                row.assign_part_no(part_no);
                matched += 1;
            }
            None => {
                if unmatched_samples.len() < 3 {
                    unmatched_samples.push(format!("{:?} -> {:?}", row.phone, key));
                }
            }
        }
    }
    if !unmatched_samples.is_empty() {
        debug!(
            "lookup_partition: sample unmatched phones (original -> normalized): {:?}",
            unmatched_samples
        );
    }
    matched
}
