// Primitives for reading CSV files in the long format of openelections,
// and the raw precinct exports of the Department of Elections.

use csv::StringRecord;

use crate::pipeline::io_common::{parse_votes, ParsedRow};
use crate::pipeline::*;

// One row per (locality, office, candidate), possibly split by precinct.
struct LongColumns {
    locality: usize,
    office: Option<usize>,
    party: usize,
    candidate: usize,
    votes: usize,
}

fn find_column(header: &StringRecord, names: &[&str]) -> Option<usize> {
    header.iter().position(|h| {
        let h = h.trim().trim_start_matches('\u{feff}');
        names.iter().any(|n| h.eq_ignore_ascii_case(n))
    })
}

fn long_columns(path: &str, header: &StringRecord) -> PipelineResult<LongColumns> {
    let required = |names: &[&str]| -> PipelineResult<usize> {
        find_column(header, names).context(MissingColumnSnafu {
            path,
            column: names[0],
        })
    };
    Ok(LongColumns {
        locality: required(&["county", "locality", "LocalityName"])?,
        office: find_column(header, &["office", "OfficeTitle"]),
        party: required(&["party"])?,
        candidate: required(&["candidate", "CandidateName"])?,
        votes: required(&["votes", "TOTAL_VOTES"])?,
    })
}

fn cell(line: &StringRecord, idx: usize) -> String {
    line.get(idx).unwrap_or("").trim().to_string()
}

pub fn read_long_csv(path: &str) -> PipelineResult<Vec<ParsedRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let header = rdr.headers().context(CsvOpenSnafu { path })?.clone();
    debug!("read_long_csv: header: {:?}", header);
    let cols = long_columns(path, &header)?;

    let mut res: Vec<ParsedRow> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        if line.iter().all(|s| s.trim().is_empty()) {
            continue;
        }
        let raw_votes = cell(&line, cols.votes);
        let votes = parse_votes(&raw_votes).context(MalformedRowSnafu {
            path,
            lineno,
            value: raw_votes.clone(),
        })?;
        let row = ParsedRow {
            lineno,
            locality: cell(&line, cols.locality),
            office: cols.office.map(|i| cell(&line, i)),
            party: cell(&line, cols.party),
            candidate: cell(&line, cols.candidate),
            votes,
        };
        debug!("read_long_csv: {:?}", row);
        res.push(row);
    }
    info!("read_long_csv: {}: {} rows", path, res.len());
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let p = dir.path().join(name);
        let mut f = std::fs::File::create(&p).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        p.display().to_string()
    }

    #[test]
    fn reads_rows() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(
            &dir,
            "20201103__va__general__county.csv",
            "County,Precinct,Office,District,Party,Candidate,Votes\n\
             Accomack County,TOTAL,President,,DEM,Joseph R. Biden,\"7,578\"\n\
             Accomack County,TOTAL,President,,REP,Donald J. Trump,9172.0\n\
             ,,,,,,\n\
             Accomack County,TOTAL,President,,,Write In,\n",
        );
        let rows = read_long_csv(&p).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].locality, "Accomack County");
        assert_eq!(rows[0].office.as_deref(), Some("President"));
        assert_eq!(rows[0].votes, 7578);
        assert_eq!(rows[1].votes, 9172);
        assert_eq!(rows[2].votes, 0);
        assert_eq!(rows[2].lineno, 5);
    }

    #[test]
    fn reads_precinct_export() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(
            &dir,
            "Virginia_Elections_Database__2021_Governor_General_Election_precincts.csv",
            "\u{feff}CountyName,LocalityName,PrecinctName,OfficeTitle,DistrictName,Party,CandidateName,TOTAL_VOTES\n\
             Virginia,ACCOMACK COUNTY,101 - CHINCOTEAGUE,Governor (Virginia),,Democratic,Terry R. McAuliffe,612\n\
             Virginia,ACCOMACK COUNTY,101 - CHINCOTEAGUE,Governor (Virginia),,Republican,Glenn A. Youngkin,\"1,405\"\n",
        );
        let rows = read_long_csv(&p).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].locality, "ACCOMACK COUNTY");
        assert_eq!(rows[0].office.as_deref(), Some("Governor (Virginia)"));
        assert_eq!(rows[0].party, "Democratic");
        assert_eq!(rows[1].candidate, "Glenn A. Youngkin");
        assert_eq!(rows[1].votes, 1405);
    }

    #[test]
    fn missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(&dir, "x.csv", "county,office,candidate,votes\nA,President,X,1\n");
        let err = read_long_csv(&p).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "party"));
    }

    #[test]
    fn malformed_votes() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(
            &dir,
            "x.csv",
            "locality,party,candidate,votes\nA,DEM,X,12\nA,REP,Y,-4\n",
        );
        let err = read_long_csv(&p).unwrap_err();
        match err {
            PipelineError::MalformedRow { lineno, value, .. } => {
                assert_eq!(lineno, 3);
                assert_eq!(value, "-4");
            }
            e => panic!("unexpected error {:?}", e),
        }
    }
}
