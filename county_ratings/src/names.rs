//! Name normalization: candidates, localities and contests.
//!
//! The source files spell the same candidate, county or office in many ways
//! across election cycles. Each table maps the variants to one canonical
//! form. Lookups that miss are not silently accepted: candidates are
//! collected in a [`NameAudit`], localities are reported as unknown, and
//! contests are ignored.

use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;

/// Errors while assembling an alias table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AliasError {
    /// Following the aliases from this name leads back to it.
    Cycle { name: String },
}

impl Error for AliasError {}

impl Display for AliasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AliasError::Cycle { name } => write!(f, "alias cycle starting at {:?}", name),
        }
    }
}

// ********* Candidates **********

const VIRGINIA_CANDIDATE_ALIASES: &[(&str, &str)] = &[
    ("A. Donald McEachin", "Aston Donald McEachin"),
    ("C. S. Robb", "Charles S. Robb"),
    ("Charies S. Robb", "Charles S. Robb"),
    ("D. S. Beyer, Jr", "Donald S. Beyer, Jr"),
    ("G. F. Allen", "George F. Allen"),
    ("J. H. Hager", "John H. Hager"),
    ("J. H. Webb, Jr", "James H. Webb, Jr"),
    ("J. K. Katzen", "Jay K. Katzen"),
    ("J. Marshall Coleman", "John Marshall Coleman"),
    ("J. S. Gilmore, III", "James S. Gilmore, III"),
    ("James Jim S. Gilmore, III", "James S. Gilmore, III"),
    ("J. W. Kilgore", "Jerry W. Kilgore"),
    ("J. W. Warner", "John W. Warner"),
    ("L. F. Payne, Jr", "Lewis F. Payne, Jr"),
    ("L. L. Byrne", "Leslie L. Byrne"),
    ("M. L. Earley", "Mark L. Earley"),
    ("M. R. Warner", "Mark R. Warner"),
    ("T. M. Kaine", "Timothy M. Kaine"),
    ("W. B. Redpath", "William B. Redpath"),
    ("W. R. O'Brien", "William R. O'Brien"),
    ("W. T. Bolling", "Bill Bolling"),
    ("William T. Bolling", "Bill Bolling"),
    ("William Bill T. Bolling", "Bill Bolling"),
    ("Willard M. Romney", "Mitt Romney"),
    ("Willard Mitt Romney", "Mitt Romney"),
    ("W. Mitt Romney", "Mitt Romney"),
];

/// What the candidate table knows about a name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum NameResolution<'a> {
    /// A variant, with its canonical form.
    Alias(&'a str),
    /// Already a canonical name of the table.
    Canonical,
    /// Not covered by the table.
    Unmapped,
}

/// Maps raw candidate name variants to their canonical display name.
///
/// Alias chains are resolved when the table is built, so every stored target
/// is a canonical name and `normalize` is idempotent.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CandidateAliasTable {
    aliases: BTreeMap<String, String>,
    canonical: BTreeSet<String>,
}

impl CandidateAliasTable {
    pub fn new<I>(entries: I) -> Result<CandidateAliasTable, AliasError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        CandidateAliasTable::default().extend(entries)
    }

    /// The table of the Virginia candidate variants seen since 1990.
    pub fn virginia() -> Result<CandidateAliasTable, AliasError> {
        CandidateAliasTable::new(
            VIRGINIA_CANDIDATE_ALIASES
                .iter()
                .map(|(raw, name)| (raw.to_string(), name.to_string())),
        )
    }

    /// Adds or overrides entries. Later entries win over earlier ones.
    pub fn extend<I>(self, entries: I) -> Result<CandidateAliasTable, AliasError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut raw: BTreeMap<String, String> = self.aliases;
        for (variant, name) in entries {
            let variant = variant.trim().to_string();
            let name = name.trim().to_string();
            if variant == name {
                raw.remove(&variant);
            } else {
                raw.insert(variant, name);
            }
        }

        let mut aliases: BTreeMap<String, String> = BTreeMap::new();
        for start in raw.keys() {
            let mut cur: &String = start;
            let mut steps = 0;
            while let Some(next) = raw.get(cur) {
                cur = next;
                steps += 1;
                if steps > raw.len() {
                    return Err(AliasError::Cycle {
                        name: start.clone(),
                    });
                }
            }
            aliases.insert(start.clone(), cur.clone());
        }
        let canonical: BTreeSet<String> = aliases.values().cloned().collect();
        debug!(
            "CandidateAliasTable: {} aliases for {} canonical names",
            aliases.len(),
            canonical.len()
        );
        Ok(CandidateAliasTable { aliases, canonical })
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// The canonical name, or the raw name unchanged when it is unknown.
    pub fn normalize(&self, raw: &str) -> String {
        match self.aliases.get(raw) {
            Some(name) => name.clone(),
            None => raw.to_string(),
        }
    }

    pub fn resolve(&self, raw: &str) -> NameResolution<'_> {
        if let Some(name) = self.aliases.get(raw) {
            NameResolution::Alias(name.as_str())
        } else if self.canonical.contains(raw) {
            NameResolution::Canonical
        } else {
            NameResolution::Unmapped
        }
    }
}

/// Collects the candidate names that went through normalization without
/// being covered by the table.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct NameAudit {
    unmapped: BTreeMap<String, u64>,
}

impl NameAudit {
    /// Normalizes a name and records it if the table did not cover it.
    pub fn record(&mut self, table: &CandidateAliasTable, raw: &str) -> String {
        if let NameResolution::Unmapped = table.resolve(raw) {
            if !raw.is_empty() {
                let count = self.unmapped.entry(raw.to_string()).or_insert(0);
                if *count == 0 {
                    debug!("NameAudit: candidate name {:?} is not in the alias table", raw);
                }
                *count += 1;
            }
        }
        table.normalize(raw)
    }

    /// Unmapped names with the number of rows they appeared in.
    pub fn unmapped(&self) -> &BTreeMap<String, u64> {
        &self.unmapped
    }
}

// ********* Localities **********

const VIRGINIA_HISTORICAL_LOCALITIES: &[(&str, &str)] = &[
    ("BEDFORD CITY", "BEDFORD COUNTY"),
    ("CLIFTON FORGE CITY", "ALLEGHANY COUNTY"),
    ("S BOSTON CITY", "HALIFAX COUNTY"),
    ("SOUTH BOSTON CITY", "HALIFAX COUNTY"),
    ("MANASSAS COUNTY", "MANASSAS CITY"),
];

const VIRGINIA_ROLL_UPS: &[&str] = &["TOTAL", "TOTALS", "VIRGINIA", "COMMONWEALTH OF VIRGINIA"];

/// Normalizes a county or city label into a join key.
///
/// "Fairfax City (CD 11)" and "FAIRFAX  CITY" both become "FAIRFAX CITY".
pub fn normalize_locality(name: &str) -> String {
    let s = strip_district_tag(name.trim()).to_uppercase();
    let s = s.replace('&', "AND").replace('.', "");
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

// Older files append the congressional district to the locality label.
fn strip_district_tag(name: &str) -> &str {
    if let Some(body) = name.strip_suffix(')') {
        if let Some(open) = body.rfind('(') {
            let tag = body[open + 1..].trim();
            let is_cd = match (tag.get(..2), tag.get(2..)) {
                (Some(prefix), Some(num)) => {
                    let num = num.trim();
                    prefix.eq_ignore_ascii_case("CD")
                        && !num.is_empty()
                        && num.chars().all(|c| c.is_ascii_digit())
                }
                _ => false,
            };
            if is_cd {
                return name[..open].trim_end();
            }
        }
    }
    name
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LocalityResolution {
    /// A locality, with its display name.
    Known(String),
    /// A statewide total line, not a locality.
    RollUp,
    /// Cannot be matched to the roster, with the normalized key that failed.
    Unknown(String),
}

/// Renders a normalized locality key in the Census style, so that every
/// spelling of a locality gives the same name: "ALEXANDRIA CITY" becomes
/// "Alexandria city" and "KING AND QUEEN COUNTY" becomes "King and Queen County".
pub fn display_locality(key: &str) -> String {
    key.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            match lower.as_str() {
                "city" | "and" | "of" => lower,
                _ => {
                    let mut chars = lower.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => lower,
                    }
                }
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Resolves raw locality labels to the display names used as dataset keys.
///
/// Without a roster any non roll-up label is accepted. It is normalized,
/// mapped through the historical aliases and rendered by `display_locality`.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct LocalityTable {
    aliases: BTreeMap<String, String>,
    roll_ups: BTreeSet<String>,
    roster: BTreeMap<String, String>,
}

impl LocalityTable {
    pub fn virginia() -> LocalityTable {
        LocalityTable {
            aliases: VIRGINIA_HISTORICAL_LOCALITIES
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            roll_ups: VIRGINIA_ROLL_UPS.iter().map(|s| s.to_string()).collect(),
            roster: BTreeMap::new(),
        }
    }

    /// Restricts the accepted localities to the given display names.
    pub fn with_roster<I, S>(mut self, names: I) -> LocalityTable
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            self.roster
                .insert(normalize_locality(name), name.trim().to_string());
        }
        self
    }

    pub fn resolve(&self, raw: &str) -> LocalityResolution {
        let key = normalize_locality(raw);
        if key.is_empty() || self.roll_ups.contains(&key) {
            return LocalityResolution::RollUp;
        }
        let key = self.aliases.get(&key).cloned().unwrap_or(key);
        if self.roster.is_empty() {
            return LocalityResolution::Known(display_locality(&key));
        }
        match self.roster.get(&key) {
            Some(display) => LocalityResolution::Known(display.clone()),
            None => {
                debug!("LocalityTable: cannot resolve locality {:?} ({})", raw, key);
                LocalityResolution::Unknown(key)
            }
        }
    }
}

// ********* Contests **********

const VIRGINIA_CONTESTS: &[(&str, &str)] = &[
    ("president", "President"),
    ("president and vice president", "President"),
    ("us senate", "US Senate"),
    ("u s senate", "US Senate"),
    ("united states senate", "US Senate"),
    ("member united states senate", "US Senate"),
    ("governor", "Governor"),
    ("lieutenant governor", "Lieutenant Governor"),
    ("lt governor", "Lieutenant Governor"),
    ("attorney general", "Attorney General"),
];

// Precinct exports qualify the office with its district: "Governor (Virginia)".
fn contest_key(office: &str) -> String {
    let office = office.trim();
    let office = match office.strip_suffix(')').and_then(|b| b.rfind('(').map(|i| &b[..i])) {
        Some(body) if !body.trim().is_empty() => body,
        _ => office,
    };
    let s = office.to_lowercase().replace([',', '.', '_'], " ");
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Maps office labels to the contest names used in the dataset.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ContestTable {
    entries: BTreeMap<String, String>,
}

impl ContestTable {
    pub fn virginia() -> ContestTable {
        ContestTable {
            entries: VIRGINIA_CONTESTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Keeps only the contests with one of these canonical names.
    pub fn restrict(self, contests: &[String]) -> ContestTable {
        ContestTable {
            entries: self
                .entries
                .into_iter()
                .filter(|(_, v)| contests.contains(v))
                .collect(),
        }
    }

    pub fn canonical(&self, office: &str) -> Option<&str> {
        self.entries.get(&contest_key(office)).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_examples() {
        let t = CandidateAliasTable::virginia().unwrap();
        assert_eq!(t.normalize("Willard M. Romney"), "Mitt Romney");
        assert_eq!(t.normalize("William Bill T. Bolling"), "Bill Bolling");
        assert_eq!(t.normalize("Joseph R. Biden"), "Joseph R. Biden");
    }

    #[test]
    fn candidate_normalize_is_idempotent() {
        let t = CandidateAliasTable::virginia().unwrap();
        for (raw, _) in VIRGINIA_CANDIDATE_ALIASES {
            let once = t.normalize(raw);
            assert_eq!(t.normalize(&once), once);
            assert_eq!(t.resolve(&once), NameResolution::Canonical);
        }
    }

    #[test]
    fn candidate_chains_and_cycles() {
        let t = CandidateAliasTable::new(vec![
            ("A".to_string(), "B".to_string()),
            ("B".to_string(), "C".to_string()),
        ])
        .unwrap();
        assert_eq!(t.normalize("A"), "C");
        assert_eq!(t.normalize("B"), "C");

        let e = CandidateAliasTable::new(vec![
            ("A".to_string(), "B".to_string()),
            ("B".to_string(), "A".to_string()),
        ]);
        assert!(matches!(e, Err(AliasError::Cycle { .. })));
    }

    #[test]
    fn candidate_override() {
        let t = CandidateAliasTable::virginia()
            .unwrap()
            .extend(vec![("W. T. Bolling".to_string(), "William T. Bolling".to_string())])
            .unwrap();
        // William T. Bolling is itself an alias of Bill Bolling.
        assert_eq!(t.normalize("W. T. Bolling"), "Bill Bolling");
    }

    #[test]
    fn audit_collects_unmapped() {
        let t = CandidateAliasTable::virginia().unwrap();
        let mut audit = NameAudit::default();
        assert_eq!(audit.record(&t, "Willard M. Romney"), "Mitt Romney");
        assert_eq!(audit.record(&t, "Mitt Romney"), "Mitt Romney");
        assert_eq!(audit.record(&t, "Barack Obama"), "Barack Obama");
        audit.record(&t, "Barack Obama");
        audit.record(&t, "");
        assert_eq!(audit.unmapped().len(), 1);
        assert_eq!(audit.unmapped().get("Barack Obama"), Some(&2));
    }

    #[test]
    fn locality_normalization() {
        assert_eq!(normalize_locality(" Fairfax  City "), "FAIRFAX CITY");
        assert_eq!(normalize_locality("Fairfax City (CD 11)"), "FAIRFAX CITY");
        assert_eq!(normalize_locality("King & Queen County"), "KING AND QUEEN COUNTY");
        assert_eq!(normalize_locality("St. Paul (town)"), "ST PAUL (TOWN)");
    }

    #[test]
    fn locality_resolution() {
        let t = LocalityTable::virginia().with_roster(["Bedford County", "Richmond city"]);
        assert_eq!(
            t.resolve("BEDFORD CITY"),
            LocalityResolution::Known("Bedford County".to_string())
        );
        assert_eq!(
            t.resolve("Richmond City (CD 03)"),
            LocalityResolution::Known("Richmond city".to_string())
        );
        assert_eq!(t.resolve("Totals"), LocalityResolution::RollUp);
        assert_eq!(
            t.resolve("Atlantis"),
            LocalityResolution::Unknown("ATLANTIS".to_string())
        );
    }

    #[test]
    fn locality_without_roster() {
        let t = LocalityTable::virginia();
        let known = |s: &str| LocalityResolution::Known(s.to_string());
        assert_eq!(t.resolve("Loudoun County (CD 10)"), known("Loudoun County"));
        assert_eq!(t.resolve("Virginia"), LocalityResolution::RollUp);
        // Historical localities fold into their successor.
        assert_eq!(t.resolve("Bedford City"), known("Bedford County"));
        assert_eq!(t.resolve("BEDFORD COUNTY"), known("Bedford County"));
        // Spellings that differ in case, spacing or punctuation agree.
        assert_eq!(t.resolve("FAIRFAX COUNTY"), t.resolve("Fairfax  County"));
        assert_eq!(t.resolve("Fairfax City"), known("Fairfax city"));
        assert_eq!(t.resolve("King & Queen County"), known("King and Queen County"));
        assert_eq!(t.resolve("St. Paul"), known("St Paul"));
    }

    #[test]
    fn contests() {
        let t = ContestTable::virginia();
        assert_eq!(t.canonical("U.S. Senate"), Some("US Senate"));
        assert_eq!(t.canonical("u_s_senate"), Some("US Senate"));
        assert_eq!(t.canonical("PRESIDENT"), Some("President"));
        assert_eq!(t.canonical("House of Delegates"), None);
        assert_eq!(t.canonical("Member, United States Senate"), Some("US Senate"));
        assert_eq!(t.canonical("Governor (Virginia)"), Some("Governor"));
        assert_eq!(t.canonical("Lt. Governor"), Some("Lieutenant Governor"));
        assert_eq!(t.canonical("Member House of Delegates (012)"), None);
        let t = t.restrict(&["Governor".to_string()]);
        assert_eq!(t.canonical("President"), None);
        assert_eq!(t.canonical("Governor"), Some("Governor"));
    }
}
