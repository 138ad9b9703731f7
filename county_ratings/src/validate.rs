//! Consistency checks of the derived fields of a dataset.
//!
//! Every record is recomputed from its vote counts with the same rating
//! function used when the dataset was built. Differences are reported, and
//! only overwritten when explicitly asked to.

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{Dataset, VoteRecord};

/// The fields of a record that can be checked.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    CountyName,
    TotalVotes,
    TwoPartyTotal,
    DemPct,
    RepPct,
    Winner,
    Margin,
    MarginPct,
    Category,
    Party,
    Code,
    Color,
}

/// A derived field that disagrees with its recomputed value.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ValidationMismatch {
    pub year: String,
    pub contest: String,
    pub county: String,
    pub field: RecordField,
    pub expected: String,
    pub actual: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub records_checked: u64,
    pub total_mismatches: u64,
    pub mismatches_by_field: BTreeMap<RecordField, u64>,
    pub mismatches: Vec<ValidationMismatch>,
    /// Whether the mismatches were written back into the dataset.
    pub fixed: bool,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.total_mismatches == 0
    }

    fn push(&mut self, m: ValidationMismatch) {
        self.total_mismatches += 1;
        *self.mismatches_by_field.entry(m.field).or_insert(0) += 1;
        self.mismatches.push(m);
    }
}

/// The record as it should be: same names, county code and vote counts, with
/// all the derived fields recomputed.
pub fn expected_record(county: &str, rec: &VoteRecord) -> VoteRecord {
    VoteRecord {
        county_fips: rec.county_fips.clone(),
        ..VoteRecord::from_counts(
            county,
            &rec.dem_candidate,
            rec.dem_votes,
            &rec.rep_candidate,
            rec.rep_votes,
            rec.other_votes,
        )
    }
}

fn pct_differs(stored: f64, expected: f64) -> bool {
    (stored - expected).abs() > 1e-9 || stored.is_nan()
}

fn compare(
    year: &str,
    contest: &str,
    county: &str,
    stored: &VoteRecord,
    expected: &VoteRecord,
) -> Vec<ValidationMismatch> {
    let mut diffs: Vec<(RecordField, String, String)> = Vec::new();
    if stored.county_name != expected.county_name {
        diffs.push((
            RecordField::CountyName,
            expected.county_name.clone(),
            stored.county_name.clone(),
        ));
    }
    if stored.total_votes != expected.total_votes {
        diffs.push((
            RecordField::TotalVotes,
            expected.total_votes.to_string(),
            stored.total_votes.to_string(),
        ));
    }
    if stored.two_party_total != expected.two_party_total {
        diffs.push((
            RecordField::TwoPartyTotal,
            expected.two_party_total.to_string(),
            stored.two_party_total.to_string(),
        ));
    }
    for (field, actual, wanted) in [
        (RecordField::DemPct, stored.dem_pct, expected.dem_pct),
        (RecordField::RepPct, stored.rep_pct, expected.rep_pct),
    ] {
        if pct_differs(actual, wanted) {
            diffs.push((field, wanted.to_string(), actual.to_string()));
        }
    }
    if stored.winner != expected.winner {
        diffs.push((
            RecordField::Winner,
            expected.winner.clone(),
            stored.winner.clone(),
        ));
    }
    if stored.margin != expected.margin {
        diffs.push((
            RecordField::Margin,
            expected.margin.to_string(),
            stored.margin.to_string(),
        ));
    }
    if pct_differs(stored.margin_pct, expected.margin_pct) {
        diffs.push((
            RecordField::MarginPct,
            expected.margin_pct.to_string(),
            stored.margin_pct.to_string(),
        ));
    }
    let (s, e) = (&stored.competitiveness, &expected.competitiveness);
    for (field, actual, wanted) in [
        (RecordField::Category, &s.category, &e.category),
        (RecordField::Party, &s.party, &e.party),
        (RecordField::Code, &s.code, &e.code),
        (RecordField::Color, &s.color, &e.color),
    ] {
        if actual != wanted {
            diffs.push((field, wanted.clone(), actual.clone()));
        }
    }
    diffs
        .into_iter()
        .map(|(field, expected, actual)| ValidationMismatch {
            year: year.to_string(),
            contest: contest.to_string(),
            county: county.to_string(),
            field,
            expected,
            actual,
        })
        .collect()
}

/// Checks every record of the dataset without modifying it.
pub fn check(dataset: &Dataset) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (year, contests) in dataset.iter() {
        for (contest, block) in contests.iter() {
            for (county, rec) in block.iter() {
                report.records_checked += 1;
                let expected = expected_record(county, rec);
                for m in compare(year, contest, county, rec, &expected) {
                    debug!(
                        "check: {} | {} | {}: {:?} {} -> {}",
                        m.year, m.contest, m.county, m.field, m.actual, m.expected
                    );
                    report.push(m);
                }
            }
        }
    }
    info!(
        "check: {} records, {} mismatches",
        report.records_checked, report.total_mismatches
    );
    report
}

/// Validates the dataset and, with `fix`, overwrites the mismatching
/// records with their recomputed values.
///
/// Without `fix` the dataset is left untouched.
pub fn validate(dataset: &mut Dataset, fix: bool) -> ValidationReport {
    let mut report = check(dataset);
    if !fix || report.is_clean() {
        return report;
    }
    let mut repaired = 0;
    for (_, contests) in dataset.iter_mut() {
        for (_, block) in contests.iter_mut() {
            for (county, rec) in block.iter_mut() {
                let expected = expected_record(county, rec);
                if *rec != expected {
                    *rec = expected;
                    repaired += 1;
                }
            }
        }
    }
    warn!("validate: repaired {} records", repaired);
    report.fixed = true;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContestYearBlock;
    use std::collections::BTreeMap;

    fn dataset(records: Vec<VoteRecord>) -> Dataset {
        let block: ContestYearBlock = records
            .into_iter()
            .map(|r| (r.county_name.clone(), r))
            .collect();
        let mut contests = BTreeMap::new();
        contests.insert("President".to_string(), block);
        let mut ds = BTreeMap::new();
        ds.insert("2020".to_string(), contests);
        ds
    }

    #[test]
    fn clean_dataset() {
        let mut ds = dataset(vec![
            VoteRecord::from_counts("A", "D", 10, "R", 5, 1),
            VoteRecord::from_counts("B", "D", 0, "R", 0, 0),
        ]);
        let report = validate(&mut ds, false);
        assert!(report.is_clean());
        assert_eq!(report.records_checked, 2);
        assert!(!report.fixed);
    }

    #[test]
    fn reports_without_mutating() {
        let mut rec = VoteRecord::from_counts("A", "D", 10, "R", 50, 1);
        rec.competitiveness.color = "#000000".to_string();
        rec.margin_pct = 12.5;
        let mut ds = dataset(vec![rec]);
        let before = ds.clone();

        let report = validate(&mut ds, false);
        assert_eq!(ds, before);
        assert_eq!(report.total_mismatches, 2);
        assert_eq!(report.mismatches_by_field.get(&RecordField::Color), Some(&1));
        assert_eq!(report.mismatches_by_field.get(&RecordField::MarginPct), Some(&1));
        let m = &report.mismatches[0];
        assert_eq!(m.year, "2020");
        assert_eq!(m.contest, "President");
        assert_eq!(m.county, "A");
    }

    #[test]
    fn fix_is_idempotent() {
        let mut rec = VoteRecord::from_counts("A", "D", 100, "R", 90, 10);
        rec.total_votes = 7;
        rec.margin = -3;
        rec.competitiveness.code = "R_SAFE".to_string();
        let mut other = VoteRecord::from_counts("B", "D", 1, "R", 2, 0);
        other.competitiveness.party = "Republican".to_string();
        let mut ds = dataset(vec![rec, other]);

        let first = validate(&mut ds, true);
        assert_eq!(first.total_mismatches, 4);
        assert!(first.fixed);
        let a = &ds["2020"]["President"]["A"];
        assert_eq!(a.total_votes, 200);
        assert_eq!(a.margin, 10);
        assert_eq!(a.competitiveness.code, "LEAN_DEM");

        let second = validate(&mut ds, true);
        assert!(second.is_clean());
        assert!(!second.fixed);
    }

    #[test]
    fn shares_are_checked_and_county_code_kept() {
        let mut rec = VoteRecord::from_counts("A", "D", 60, "R", 30, 10);
        assert_eq!(rec.two_party_total, 90);
        assert_eq!(rec.dem_pct, 60.0);
        assert_eq!(rec.rep_pct, 30.0);
        assert_eq!(rec.winner, "DEM");
        rec.county_fips = Some("51001".to_string());
        // As loaded from a file written before the shares were persisted.
        rec.dem_pct = 0.0;
        rec.rep_pct = 0.0;
        rec.two_party_total = 0;
        rec.winner = String::new();
        let mut ds = dataset(vec![rec]);

        let report = validate(&mut ds, true);
        assert_eq!(report.total_mismatches, 4);
        assert_eq!(report.mismatches_by_field.get(&RecordField::Winner), Some(&1));
        let a = &ds["2020"]["President"]["A"];
        assert_eq!(a.dem_pct, 60.0);
        assert_eq!(a.county_fips.as_deref(), Some("51001"));
        assert!(check(&ds).is_clean());
    }

    #[test]
    fn county_key_mismatch() {
        let rec = VoteRecord::from_counts("Wrong Name", "D", 1, "R", 1, 0);
        let mut ds = dataset(vec![]);
        ds.get_mut("2020")
            .unwrap()
            .get_mut("President")
            .unwrap()
            .insert("Right Name".to_string(), rec);
        let report = check(&ds);
        assert_eq!(report.mismatches_by_field.get(&RecordField::CountyName), Some(&1));
        assert_eq!(report.mismatches[0].expected, "Right Name");
    }
}
