//! Readers for the county-wide exports of the Virginia Elections Database.
//!
//! Row 1 holds the candidate names, row 2 their parties, and the data
//! starts on row 3: the locality in column 1, the candidates from column 4.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::pipeline::io_common::{parse_votes, ParsedRow};
use crate::pipeline::*;

const FIRST_CANDIDATE_COLUMN: usize = 3;

struct CandidateColumn {
    idx: usize,
    candidate: String,
    party: String,
}

fn candidate_columns(names: &[String], parties: &[String]) -> Vec<CandidateColumn> {
    let mut res = Vec::new();
    for (idx, name) in names.iter().enumerate().skip(FIRST_CANDIDATE_COLUMN) {
        let candidate = name.trim();
        if candidate.is_empty() || candidate == "Total Votes Cast" {
            continue;
        }
        let mut party = parties.get(idx).map(|p| p.trim()).unwrap_or("").to_string();
        if party.is_empty() && candidate.eq_ignore_ascii_case("all others") {
            party = "Other".to_string();
        }
        res.push(CandidateColumn {
            idx,
            candidate: candidate.to_string(),
            party,
        });
    }
    res
}

/// Turns the cells of a wide sheet into vote rows.
pub fn parse_wide_rows(path: &str, rows: &[Vec<String>]) -> PipelineResult<Vec<ParsedRow>> {
    let (names, parties) = match rows {
        [names, parties, ..] => (names, parties),
        _ => {
            return MissingColumnSnafu {
                path,
                column: "candidate header rows",
            }
            .fail()
        }
    };
    let columns = candidate_columns(names, parties);
    if columns.is_empty() {
        return MissingColumnSnafu {
            path,
            column: "candidates",
        }
        .fail();
    }
    debug!(
        "parse_wide_rows: candidates: {:?}",
        columns.iter().map(|c| c.candidate.as_str()).collect::<Vec<&str>>()
    );

    let mut res: Vec<ParsedRow> = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(2) {
        let lineno = idx + 1;
        let locality = match row.first() {
            Some(l) if !l.trim().is_empty() => l.trim().to_string(),
            _ => continue,
        };
        for col in columns.iter() {
            let raw = match row.get(col.idx) {
                Some(r) if !r.trim().is_empty() => r,
                _ => continue,
            };
            let votes = parse_votes(raw).context(MalformedRowSnafu {
                path,
                lineno,
                value: raw.clone(),
            })?;
            res.push(ParsedRow {
                lineno,
                locality: locality.clone(),
                office: None,
                party: col.party.clone(),
                candidate: col.candidate.clone(),
                votes,
            });
        }
    }
    info!("parse_wide_rows: {}: {} rows", path, res.len());
    Ok(res)
}

pub fn read_wide_csv(path: &str) -> PipelineResult<Vec<ParsedRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let line = line_r.context(CsvLineParseSnafu {
            path,
            lineno: idx + 1,
        })?;
        rows.push(
            line.iter()
                .map(|s| s.trim_start_matches('\u{feff}').to_string())
                .collect(),
        );
    }
    parse_wide_rows(path, &rows)
}

fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Float(f) => f.to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => "".to_string(),
        // Dates and errors are kept verbatim so that they fail as vote counts.
        other => format!("{}", other),
    }
}

pub fn read_wide_excel(path: &str) -> PipelineResult<Vec<ParsedRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })?;
    let rows: Vec<Vec<String>> = wrange
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    debug!("read_wide_excel: {}: {} rows", path, rows.len());
    parse_wide_rows(path, &rows)
}
