use std::collections::HashMap;

use log::debug;

use crate::config::ConstituencyRecord;

/// Width of the zero-padded numeric id (`WB7` -> `007`).
pub const NUMERIC_ID_WIDTH: usize = 3;

/// Maps constituency display names to their codes.
///
/// Built once from the reference document and read-only afterwards.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AcResolver {
    by_name: HashMap<String, String>,
}

impl AcResolver {
    pub fn new() -> AcResolver {
        AcResolver::default()
    }

    /// Builds a resolver from (name, code) pairs. The first code seen for a name is kept.
    pub fn from_pairs<I, S1, S2>(pairs: I) -> AcResolver
    where
        I: IntoIterator<Item = (S1, S2)>,
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        let mut res = AcResolver::new();
        for (name, code) in pairs {
            res.insert(name.as_ref(), code.as_ref());
        }
        res
    }

    /// Returns false if the name was already registered.
    pub fn insert(&mut self, name: &str, code: &str) -> bool {
        let name = name.trim();
        if self.by_name.contains_key(name) {
            debug!("AcResolver: duplicate constituency name {:?}, keeping the first code", name);
            return false;
        }
        self.by_name
            .insert(name.to_string(), code.trim().to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn code_for(&self, name: &str) -> Option<&str> {
        self.by_name.get(name.trim()).map(|s| s.as_str())
    }

    /// The full record for a name, or `None` if the name is unknown or its
    /// code has no numeric part.
    pub fn resolve(&self, name: &str) -> Option<ConstituencyRecord> {
        let code = self.code_for(name)?;
        let numeric_id = numeric_id(code)?;
        Some(ConstituencyRecord {
            name: name.trim().to_string(),
            code: code.to_string(),
            numeric_id,
        })
    }
}

/// The canonical numeric id of a constituency code.
///
/// The alphabetic region prefix and the leading zeros are dropped, then the
/// number is padded to 3 digits: `WB023` -> `023`, `WB1` -> `001`, `45` -> `045`.
/// Returns `None` if what follows the prefix is not a number.
pub fn numeric_id(code: &str) -> Option<String> {
    let digits = code
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let stripped = digits.trim_start_matches('0');
    let canonical = if stripped.is_empty() { "0" } else { stripped };
    Some(format!("{:0>width$}", canonical, width = NUMERIC_ID_WIDTH))
}
