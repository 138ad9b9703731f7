use log::{debug, info, warn};

use county_ratings::builder::{BuildError, BuildReport, DatasetBuilder};
use county_ratings::names::{
    AliasError, CandidateAliasTable, ContestTable, LocalityResolution, LocalityTable, NameAudit,
};
use county_ratings::trends::{scan, TrendOptions};
use county_ratings::validate::validate;
use county_ratings::{is_valid_year, LocalityVotes};
use snafu::{prelude::*, Snafu};

use serde::Serialize;
use serde_json::Value as JSValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use text_diff::print_diff;

use crate::pipeline::config_reader::*;
use crate::pipeline::io_common::{
    file_stem, office_from_file_name, party_bucket, simplify_file_name, year_from_file_name,
    ParsedRow,
};
use crate::pipeline::io_dataset::{read_dataset, to_canonical_json, write_atomic, write_dataset};

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_dataset;
pub mod io_geo;
pub mod io_wide;

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("{path}: cannot read line {lineno}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("{path}: missing column {column}"))]
    MissingColumn { path: String, column: String },
    #[snafu(display("{path}: line {lineno}: invalid vote count {value:?}"))]
    MalformedRow {
        path: String,
        lineno: usize,
        value: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("{path}: the workbook has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("{path}: no year declared and none in the file name"))]
    MissingYear { path: String },
    #[snafu(display("{path}: no contest declared, none in the file name and no office column"))]
    MissingContest { path: String },
    #[snafu(display("{path}: invalid record {year} | {contest} | {county}"))]
    DatasetRecord {
        source: serde_json::Error,
        path: String,
        year: String,
        contest: String,
        county: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingDataset {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("{path}: invalid candidate aliases"))]
    Alias { source: AliasError, path: String },
    #[snafu(display("{path}: cannot add the rows to the dataset"))]
    Building { source: BuildError, path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

// ********* Reading the sources **********

struct NameTables {
    candidates: CandidateAliasTable,
    localities: LocalityTable,
    contests: ContestTable,
    /// The contests to keep, when restricted by the configuration.
    keep: Option<Vec<String>>,
}

impl NameTables {
    // The declared contest of a source. None when it is filtered out.
    fn declared_contest(&self, contest: &str) -> Option<String> {
        if let Some(c) = self.contests.canonical(contest) {
            return Some(c.to_string());
        }
        let contest = contest.trim();
        match self.keep.as_ref() {
            Some(keep) if !keep.iter().any(|k| k == contest) => None,
            _ => Some(contest.to_string()),
        }
    }
}

/// The rows of one source file, resolved but not yet added to the dataset.
#[derive(Debug, Default)]
struct SourceContribution {
    year: String,
    rows: BTreeMap<String, Vec<LocalityVotes>>,
    unknown_localities: Vec<String>,
    unknown_parties: Vec<String>,
    skipped_offices: BTreeMap<String, u64>,
    audit: NameAudit,
}

impl SourceContribution {
    // Nothing reaches the builder unless every contest of the file is accepted.
    fn apply(self, builder: &mut DatasetBuilder, path: &str) -> PipelineResult<()> {
        for contest in self.rows.keys() {
            DatasetBuilder::check_key(&self.year, contest).context(BuildingSnafu { path })?;
        }
        for raw in self.unknown_localities.iter() {
            builder.record_unknown_locality(&self.year, raw);
        }
        for code in self.unknown_parties.iter() {
            builder.record_unknown_party(code);
        }
        builder.record_candidate_audit(&self.audit);
        for (contest, rows) in self.rows {
            builder
                .add_rows(&self.year, &contest, rows)
                .context(BuildingSnafu { path })?;
        }
        builder.record_source(&simplify_file_name(path));
        Ok(())
    }
}

fn read_rows(cfs: &FileSource) -> PipelineResult<Vec<ParsedRow>> {
    let path = cfs.file_path.as_str();
    info!("Attempting to read {} file {:?}", cfs.provider, path);
    match cfs.provider.as_str() {
        "openelections" => io_csv::read_long_csv(path),
        "ved_wide" => io_wide::read_wide_csv(path),
        "ved_xlsx" => io_wide::read_wide_excel(path),
        x => whatever!("{}: provider {:?} is not supported", path, x),
    }
}

fn resolve_source(
    cfs: &FileSource,
    rows: Vec<ParsedRow>,
    tables: &NameTables,
) -> PipelineResult<Option<SourceContribution>> {
    let path = cfs.file_path.as_str();
    let year = match cfs.year.clone().or_else(|| year_from_file_name(path)) {
        Some(y) => y,
        None => return MissingYearSnafu { path }.fail(),
    };
    if !is_valid_year(&year) {
        whatever!("{}: invalid year {:?}", path, year);
    }

    // A source with a declared or named contest holds that contest only.
    let file_contest: Option<Option<String>> = match cfs.contest.as_ref() {
        Some(c) => Some(tables.declared_contest(c)),
        None => office_from_file_name(path).map(|o| tables.contests.canonical(&o).map(|c| c.to_string())),
    };
    if let Some(None) = file_contest {
        info!("resolve_source: {}: contest not kept, skipping the file", path);
        return Ok(None);
    }
    let has_office = rows.iter().any(|r| r.office.is_some());
    if file_contest.is_none() && !has_office {
        return MissingContestSnafu { path }.fail();
    }

    let mut res = SourceContribution {
        year: year.clone(),
        ..SourceContribution::default()
    };
    for row in rows {
        let contest: String = match (&file_contest, &row.office) {
            (Some(Some(c)), _) => c.clone(),
            (_, Some(office)) => match tables.contests.canonical(office) {
                Some(c) => c.to_string(),
                None => {
                    *res.skipped_offices.entry(office.clone()).or_insert(0) += 1;
                    continue;
                }
            },
            _ => return MissingContestSnafu { path }.fail(),
        };
        let locality = match tables.localities.resolve(&row.locality) {
            LocalityResolution::Known(name) => name,
            LocalityResolution::RollUp => {
                debug!("resolve_source: line {}: skipping {:?}", row.lineno, row.locality);
                continue;
            }
            LocalityResolution::Unknown(key) => {
                warn!(
                    "resolve_source: {}: line {}: unknown locality {:?} ({})",
                    path, row.lineno, row.locality, key
                );
                res.unknown_localities.push(row.locality.clone());
                continue;
            }
        };
        let (bucket, known) = party_bucket(&row.party);
        if !known {
            debug!(
                "resolve_source: line {}: unknown party {:?}, counted as other",
                row.lineno, row.party
            );
            res.unknown_parties.push(row.party.trim().to_string());
        }
        let candidate = res.audit.record(&tables.candidates, &row.candidate);
        res.rows
            .entry(contest)
            .or_default()
            .push(LocalityVotes::new(&locality, bucket, &candidate, row.votes));
    }
    if !res.skipped_offices.is_empty() {
        debug!("resolve_source: {}: skipped offices {:?}", path, res.skipped_offices);
    }
    info!(
        "resolve_source: {}: year {}, contests {:?}",
        path,
        year,
        res.rows.keys().collect::<Vec<&String>>()
    );
    Ok(Some(res))
}

fn read_source(cfs: &FileSource, tables: &NameTables) -> PipelineResult<Option<SourceContribution>> {
    let rows = read_rows(cfs)?;
    resolve_source(cfs, rows, tables)
}

fn log_report(report: &BuildReport) {
    for f in report.failed_sources.iter() {
        warn!("build: failed source {}: {}", f.file, f.error);
    }
    for (year, names) in report.unknown_localities.iter() {
        warn!("build: {}: unknown localities {:?}", year, names);
    }
    if !report.unknown_parties.is_empty() {
        warn!(
            "build: party codes counted as other votes: {:?}",
            report.unknown_parties
        );
    }
    if !report.unmapped_candidates.is_empty() {
        info!(
            "build: {} candidate names not in the alias table",
            report.unmapped_candidates.len()
        );
    }
}

// ********* Commands **********

/// Writes a JSON document to a file, or to the standard output.
pub fn emit_json<T: Serialize>(out: Option<&str>, value: &T) -> PipelineResult<()> {
    let contents = to_canonical_json(value)?;
    match out {
        None | Some("stdout") => {
            print!("{}", contents);
            Ok(())
        }
        Some(path) => write_atomic(path, &contents),
    }
}

fn check_reference(reference_path: &str, produced: &str) -> PipelineResult<()> {
    let contents = fs::read_to_string(reference_path).context(OpeningJsonSnafu {
        path: reference_path,
    })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu {
        path: reference_path,
    })?;
    let expected = to_canonical_json(&js)?;
    if expected != produced {
        warn!("Found differences with the reference dataset");
        print_diff(expected.as_str(), produced, "\n");
        whatever!("Difference detected between the dataset and the reference dataset")
    }
    info!("check_reference: identical to {}", reference_path);
    Ok(())
}

pub fn run_build(
    config_path: &str,
    out: Option<String>,
    reference: Option<String>,
    report_out: Option<String>,
) -> PipelineResult<()> {
    let config = read_config(config_path)?;
    if config.sources.is_empty() {
        whatever!("{}: no sources", config_path)
    }

    let mut candidates = CandidateAliasTable::virginia().context(AliasSnafu { path: "builtin" })?;
    if let Some(p) = config.candidate_aliases.as_ref() {
        candidates = candidates
            .extend(read_candidate_aliases(p)?)
            .context(AliasSnafu { path: p })?;
    }
    let geography = match config.geography.as_ref() {
        Some(g) => Some(io_geo::read_geography(g)?),
        None => None,
    };
    let mut localities = LocalityTable::virginia();
    if let Some(keys) = geography.as_ref() {
        localities = localities.with_roster(keys.names());
    }
    let contests = match config.contests.as_ref() {
        Some(keep) => ContestTable::virginia().restrict(keep),
        None => ContestTable::virginia(),
    };
    let tables = NameTables {
        candidates,
        localities,
        contests,
        keep: config.contests.clone(),
    };

    let mut builder = DatasetBuilder::new();
    if let Some(keys) = geography {
        builder = builder.geography(keys);
    }
    let mut num_read = 0;
    // Sources already added, by file stem: "X.csv" and "X (1).csv" hold the same rows.
    let mut added: BTreeMap<String, String> = BTreeMap::new();
    for cfs in config.sources.iter() {
        let stem = file_stem(&cfs.file_path);
        if let Some(first) = added.get(&stem) {
            warn!("run_build: skipping {}: duplicate of {}", cfs.file_path, first);
            builder.record_failure(
                &simplify_file_name(&cfs.file_path),
                &format!("duplicate of {}", first),
            );
            continue;
        }
        let res = read_source(cfs, &tables)
            .and_then(|c| c.map(|c| c.apply(&mut builder, &cfs.file_path)).transpose());
        match res {
            Ok(Some(())) => {
                num_read += 1;
                added.insert(stem, simplify_file_name(&cfs.file_path));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("run_build: skipping {}: {}", cfs.file_path, e);
                builder.record_failure(&simplify_file_name(&cfs.file_path), &e.to_string());
            }
        }
    }
    if num_read == 0 {
        whatever!("{}: none of the sources could be read", config_path)
    }

    let (persisted, report) = builder.build();
    log_report(&report);
    let contents = to_canonical_json(&persisted)?;
    match out.or(config.output_path) {
        Some(p) if p != "stdout" => {
            write_atomic(&p, &contents)?;
            info!("run_build: wrote {}", p);
        }
        _ => print!("{}", contents),
    }
    if let Some(p) = report_out {
        emit_json(Some(p.as_str()), &report)?;
    }
    if let Some(reference_path) = reference {
        check_reference(&reference_path, &contents)?;
    }
    Ok(())
}

/// Validates a dataset file. Returns whether the dataset is now consistent.
pub fn run_validate(input: &str, fix: bool, out: Option<String>) -> PipelineResult<bool> {
    let mut loaded = read_dataset(input)?;
    let report = validate(&mut loaded.results, fix);
    if report.fixed {
        write_dataset(input, &loaded)?;
        info!("run_validate: rewrote {}", input);
    }
    emit_json(out.as_deref(), &report)?;
    Ok(report.is_clean() || report.fixed)
}

pub fn run_scan(
    input: &str,
    contests: Option<Vec<String>>,
    window: Option<usize>,
    top: Option<usize>,
    out: Option<String>,
) -> PipelineResult<()> {
    let loaded = read_dataset(input)?;
    let defaults = TrendOptions::default();
    let options = TrendOptions {
        contests: contests.unwrap_or(defaults.contests),
        window,
        top_realigned: top.unwrap_or(defaults.top_realigned),
    };
    let report = scan(&loaded.results, &options);
    emit_json(out.as_deref(), &report)
}
