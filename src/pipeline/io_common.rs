use std::path::Path;

use county_ratings::PartyBucket;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// The file name without its extension and without the " (N)" suffix of
/// repeated downloads.
pub fn file_stem(path: &str) -> String {
    let name = simplify_file_name(path);
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains(' ') => stem.to_string(),
        _ => name,
    };
    // Repeated downloads are saved as "name (1).csv".
    match stem.rsplit_once(" (") {
        Some((base, n)) if n.strip_suffix(')').map_or(false, |d| !d.is_empty() && all_digits(d, d.len())) => {
            base.to_string()
        }
        _ => stem,
    }
}

const VED_PREFIX: &str = "Virginia_Elections_Database__";
const VED_SUFFIX: &str = "_General_Election";

fn all_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_digit())
}

/// The election year encoded in a source file name.
///
/// Supports "20201103__va__general__county.csv" and
/// "Virginia_Elections_Database__2021_Governor_General_Election.csv".
pub fn year_from_file_name(path: &str) -> Option<String> {
    let stem = file_stem(path);
    if let Some(rest) = stem.strip_prefix(VED_PREFIX) {
        let year = rest.get(..4)?;
        return if all_digits(year, 4) && rest[4..].starts_with('_') {
            Some(year.to_string())
        } else {
            None
        };
    }
    let (date, _) = stem.split_once("__")?;
    if all_digits(date, 8) {
        Some(date[..4].to_string())
    } else {
        None
    }
}

/// The office label encoded in a source file name, if any.
///
/// "Virginia_Elections_Database__2021_Lieutenant_Governor_General_Election"
/// gives "Lieutenant Governor" and "20201103__va__general__us_senate__county"
/// gives "us senate".
pub fn office_from_file_name(path: &str) -> Option<String> {
    let stem = file_stem(path);
    let office = if let Some(rest) = stem.strip_prefix(VED_PREFIX) {
        rest.get(5..)?.strip_suffix(VED_SUFFIX)?.to_string()
    } else {
        let parts: Vec<&str> = stem.split("__").collect();
        match parts.as_slice() {
            [date, _state, _kind, office, _level] if all_digits(date, 8) && *office != "statewide" => {
                office.to_string()
            }
            _ => return None,
        }
    };
    let office = office.replace('_', " ").trim().to_string();
    if office.is_empty() {
        None
    } else {
        Some(office)
    }
}

/// Reads a vote count cell.
///
/// Accepts thousands separators and integral decimals. An empty cell is a
/// zero. Anything else, negative counts included, is rejected.
pub fn parse_votes(raw: &str) -> Option<u64> {
    let s: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if s.is_empty() {
        return Some(0);
    }
    if let Ok(x) = s.parse::<u64>() {
        return Some(x);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Some(f as u64)
        }
        _ => None,
    }
}

/// The bucket of a party code, and whether the code was recognized.
///
/// Unrecognized codes are counted as other votes, never dropped.
pub fn party_bucket(code: &str) -> (PartyBucket, bool) {
    let c = code.trim().to_uppercase();
    match c.as_str() {
        "DEMOCRATIC" | "DEMOCRAT" | "DEM" | "D" => (PartyBucket::Dem, true),
        "REPUBLICAN" | "REP" | "R" => (PartyBucket::Rep, true),
        "" | "LIBERTARIAN" | "LIB" | "L" | "GREEN" | "GRN" | "INDEPENDENT" | "IND" | "I"
        | "FORWARD" | "OTHER" | "WRITE-IN" | "WRITE IN" | "WRI" => (PartyBucket::Other, true),
        _ => (PartyBucket::Other, false),
    }
}

/// A vote row as read from a source, before any name resolution.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedRow {
    pub lineno: usize,
    pub locality: String,
    /// The office column, for the formats that have one.
    pub office: Option<String>,
    pub party: String,
    pub candidate: String,
    pub votes: u64,
}
