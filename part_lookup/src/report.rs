use std::fmt::Display;

use crate::config::{JoinStats, Summary};

/// Aggregates the counts of a join.
///
/// Every row is counted exactly once: rows of resolved constituencies, rows of
/// unresolved constituencies and rows without a constituency name.
pub fn summarize(stats: &JoinStats) -> Summary {
    let partition_rows: u64 = stats.constituencies.iter().map(|c| c.rows).sum();
    let total_rows = partition_rows + stats.blank_constituency_rows;
    let matched: u64 = stats.constituencies.iter().map(|c| c.matched).sum();
    let match_rate = if total_rows == 0 {
        0.0
    } else {
        (matched as f64) / (total_rows as f64) * 100.0
    };
    Summary {
        total_rows,
        matched,
        unmatched: total_rows - matched,
        match_rate,
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total rows processed: {}", self.total_rows)?;
        writeln!(f, "Matched: {}", self.matched)?;
        writeln!(f, "Not matched: {}", self.unmatched)?;
        write!(f, "Match rate: {:.2}%", self.match_rate)
    }
}
