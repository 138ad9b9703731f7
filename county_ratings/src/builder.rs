pub use crate::config::*;

use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;

use crate::aggregate;
use crate::names::{normalize_locality, NameAudit};
use crate::rating::{rating_scale, ScaleEntry};

/// Errors that prevent a dataset from being assembled.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum BuildError {
    /// Years must be 4-digit strings for the dataset to sort chronologically.
    InvalidYear(String),
    EmptyContest,
}

impl Error for BuildError {}

impl Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::InvalidYear(y) => write!(f, "invalid year {:?}, expected 4 digits", y),
            BuildError::EmptyContest => write!(f, "empty contest name"),
        }
    }
}

/// One county polygon of the map, as far as the join is concerned.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GeoFeature {
    pub fips: String,
    pub name: String,
}

/// The county keys of the geography file, indexed by normalized name.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct GeographyKeys {
    features: BTreeMap<String, GeoFeature>,
}

impl GeographyKeys {
    pub fn insert(&mut self, fips: &str, name: &str) {
        self.features.insert(
            normalize_locality(name),
            GeoFeature {
                fips: fips.to_string(),
                name: name.trim().to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Display names, in key order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.values().map(|f| f.name.as_str())
    }

    pub fn get(&self, county_name: &str) -> Option<&GeoFeature> {
        self.features.get(&normalize_locality(county_name))
    }
}

/// Mismatch between the counties of a contest and the counties of the map.
///
/// Neither side is fatal: the map draws polygons without data in gray.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct GeometryJoinWarning {
    pub year: String,
    pub contest: String,
    /// Counties with results but no polygon.
    pub missing_geometry: Vec<String>,
    /// Polygons without results.
    pub missing_results: Vec<String>,
}

/// A source file whose rows were left out of the dataset.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct FailedSource {
    pub file: String,
    pub error: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct DatasetSummary {
    pub total_years: usize,
    pub total_contests: usize,
    pub total_county_results: usize,
    pub years_covered: Vec<String>,
}

/// Everything that happened while building, besides the dataset itself.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub source_files: Vec<String>,
    pub failed_sources: Vec<FailedSource>,
    /// year -> raw locality labels that could not be resolved.
    pub unknown_localities: BTreeMap<String, BTreeSet<String>>,
    /// Party codes folded into the other votes, with their row counts.
    pub unknown_parties: BTreeMap<String, u64>,
    /// Candidate names not covered by the alias table, with their row counts.
    pub unmapped_candidates: BTreeMap<String, u64>,
    pub geometry_warnings: Vec<GeometryJoinWarning>,
    pub summary: DatasetSummary,
}

/// The JSON document read by the map.
///
/// Fields are declared in alphabetical order so that this struct and a
/// rewrite through a generic JSON map serialize identically.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct PersistedDataset {
    pub rating_scale: Vec<ScaleEntry>,
    pub results_by_year: Dataset,
    pub source_files: Vec<String>,
    pub summary: DatasetSummary,
    pub unmatched_localities: BTreeMap<String, BTreeSet<String>>,
}

/// Assembles the dataset from the vote rows of all the sources.
///
/// Rows are grouped by (year, contest) and aggregated when the dataset is
/// built, so one contest may be spread over several files.
///
/// ```
/// use county_ratings::builder::DatasetBuilder;
/// use county_ratings::{LocalityVotes, PartyBucket};
///
/// let mut builder = DatasetBuilder::new();
/// builder.add_rows(
///     "2024",
///     "President",
///     vec![LocalityVotes::new("Arlington County", PartyBucket::Dem, "Kamala D. Harris", 10)],
/// )?;
/// let (dataset, report) = builder.build();
/// assert_eq!(report.summary.total_county_results, 1);
/// assert!(dataset.results_by_year["2024"]["President"].contains_key("Arlington County"));
/// # Ok::<(), county_ratings::builder::BuildError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    geography: Option<GeographyKeys>,
    rows: BTreeMap<(String, String), Vec<LocalityVotes>>,
    report: BuildReport,
}

impl DatasetBuilder {
    pub fn new() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// Cross-checks the counties against these geography keys.
    pub fn geography(self, keys: GeographyKeys) -> DatasetBuilder {
        DatasetBuilder {
            geography: Some(keys),
            ..self
        }
    }

    /// Checks that rows can be added under this (year, contest).
    pub fn check_key(year: &str, contest: &str) -> Result<(), BuildError> {
        if !is_valid_year(year) {
            return Err(BuildError::InvalidYear(year.to_string()));
        }
        if contest.trim().is_empty() {
            return Err(BuildError::EmptyContest);
        }
        Ok(())
    }

    pub fn add_rows(
        &mut self,
        year: &str,
        contest: &str,
        rows: Vec<LocalityVotes>,
    ) -> Result<(), BuildError> {
        DatasetBuilder::check_key(year, contest)?;
        self.rows
            .entry((year.to_string(), contest.to_string()))
            .or_default()
            .extend(rows);
        Ok(())
    }

    pub fn record_source(&mut self, file: &str) {
        self.report.source_files.push(file.to_string());
    }

    pub fn record_failure(&mut self, file: &str, error: &str) {
        self.report.failed_sources.push(FailedSource {
            file: file.to_string(),
            error: error.to_string(),
        });
    }

    pub fn record_unknown_locality(&mut self, year: &str, raw: &str) {
        self.report
            .unknown_localities
            .entry(year.to_string())
            .or_default()
            .insert(raw.to_string());
    }

    pub fn record_unknown_party(&mut self, code: &str) {
        *self
            .report
            .unknown_parties
            .entry(code.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_candidate_audit(&mut self, audit: &NameAudit) {
        for (name, count) in audit.unmapped() {
            *self
                .report
                .unmapped_candidates
                .entry(name.clone())
                .or_insert(0) += count;
        }
    }

    /// Aggregates every (year, contest) and joins the counties with the
    /// geography keys.
    pub fn build(self) -> (PersistedDataset, BuildReport) {
        let DatasetBuilder {
            geography,
            rows,
            mut report,
        } = self;

        let mut dataset: Dataset = BTreeMap::new();
        for ((year, contest), contest_rows) in rows {
            info!("build: {} {}: {} rows", year, contest, contest_rows.len());
            let mut block = aggregate(&contest_rows);
            if let Some(keys) = geography.as_ref() {
                for (county, rec) in block.iter_mut() {
                    rec.county_fips = keys.get(county).map(|f| f.fips.clone());
                }
                if let Some(w) = join_geometry(&year, &contest, &block, keys) {
                    warn!(
                        "build: {} {}: {} counties without geometry, {} polygons without results",
                        year,
                        contest,
                        w.missing_geometry.len(),
                        w.missing_results.len()
                    );
                    report.geometry_warnings.push(w);
                }
            }
            dataset.entry(year).or_default().insert(contest, block);
        }

        let contests: BTreeSet<&String> = dataset.values().flat_map(|c| c.keys()).collect();
        report.summary = DatasetSummary {
            total_years: dataset.len(),
            total_contests: contests.len(),
            total_county_results: dataset
                .values()
                .flat_map(|c| c.values())
                .map(|b| b.len())
                .sum(),
            years_covered: dataset.keys().cloned().collect(),
        };
        info!(
            "build: {} years, {} contests, {} county results",
            report.summary.total_years,
            report.summary.total_contests,
            report.summary.total_county_results
        );

        let persisted = PersistedDataset {
            rating_scale: rating_scale(),
            results_by_year: dataset,
            source_files: report.source_files.clone(),
            summary: report.summary.clone(),
            unmatched_localities: report.unknown_localities.clone(),
        };
        (persisted, report)
    }
}

fn join_geometry(
    year: &str,
    contest: &str,
    block: &ContestYearBlock,
    keys: &GeographyKeys,
) -> Option<GeometryJoinWarning> {
    let missing_geometry: Vec<String> = block
        .keys()
        .filter(|county| keys.get(county).is_none())
        .cloned()
        .collect();
    let present: BTreeSet<String> = block.keys().map(|c| normalize_locality(c)).collect();
    let missing_results: Vec<String> = keys
        .names()
        .filter(|name| !present.contains(&normalize_locality(name)))
        .map(|s| s.to_string())
        .collect();
    if missing_geometry.is_empty() && missing_results.is_empty() {
        None
    } else {
        Some(GeometryJoinWarning {
            year: year.to_string(),
            contest: contest.to_string(),
            missing_geometry,
            missing_results,
        })
    }
}
