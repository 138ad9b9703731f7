// ********* Input data structures ***********

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::rating::{rate, round2, Rating};

/// The side a vote is counted on when computing margins.
///
/// Everything that is neither Democratic nor Republican (minor parties,
/// independents, write-ins, unrecognized party codes) lands in `Other`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum PartyBucket {
    Dem,
    Rep,
    Other,
}

/// One contribution of votes to a locality, after the locality and
/// candidate names have been normalized.
///
/// A locality may receive many of these for the same contest, for
/// instance when the source is reported by precinct.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LocalityVotes {
    pub locality: String,
    pub bucket: PartyBucket,
    pub candidate: String,
    pub votes: u64,
}

impl LocalityVotes {
    pub fn new(locality: &str, bucket: PartyBucket, candidate: &str, votes: u64) -> LocalityVotes {
        LocalityVotes {
            locality: locality.to_string(),
            bucket,
            candidate: candidate.to_string(),
            votes,
        }
    }
}

// ******** Output data structures *********

/// The persisted form of a competitiveness rating.
///
/// The fields are kept as plain strings so that a hand-edited or stale
/// dataset still loads, and the validator can report the bad values.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Competitiveness {
    pub category: String,
    pub party: String,
    pub code: String,
    pub color: String,
}

/// Results of one contest in one county for one year.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub county_name: String,
    /// The county code of the map polygon, when a geography file was joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_fips: Option<String>,
    pub dem_candidate: String,
    pub dem_votes: u64,
    pub rep_candidate: String,
    pub rep_votes: u64,
    pub other_votes: u64,
    /// Always dem_votes + rep_votes + other_votes.
    pub total_votes: u64,
    /// dem_votes + rep_votes.
    #[serde(default)]
    pub two_party_total: u64,
    /// Shares of the total vote, rounded to 2 decimals. 0 without votes.
    #[serde(default)]
    pub dem_pct: f64,
    #[serde(default)]
    pub rep_pct: f64,
    /// "DEM", "REP" or "TIE".
    #[serde(default)]
    pub winner: String,
    /// Democratic minus Republican votes.
    pub margin: i64,
    /// Rounded to 2 decimals.
    pub margin_pct: f64,
    pub competitiveness: Competitiveness,
}

fn share_pct(votes: u64, total_votes: u64) -> f64 {
    if total_votes == 0 {
        0.0
    } else {
        round2(votes as f64 / total_votes as f64 * 100.0)
    }
}

impl VoteRecord {
    /// Creates a record from the vote buckets. All the derived fields are
    /// computed here, nothing is taken from the caller.
    pub fn from_counts(
        county_name: &str,
        dem_candidate: &str,
        dem_votes: u64,
        rep_candidate: &str,
        rep_votes: u64,
        other_votes: u64,
    ) -> VoteRecord {
        let total_votes = dem_votes + rep_votes + other_votes;
        let Rating {
            margin,
            margin_pct,
            code,
        } = rate(dem_votes, rep_votes, total_votes);
        let winner = match dem_votes.cmp(&rep_votes) {
            Ordering::Greater => "DEM",
            Ordering::Less => "REP",
            Ordering::Equal => "TIE",
        };
        VoteRecord {
            county_name: county_name.to_string(),
            county_fips: None,
            dem_candidate: dem_candidate.to_string(),
            dem_votes,
            rep_candidate: rep_candidate.to_string(),
            rep_votes,
            other_votes,
            total_votes,
            two_party_total: dem_votes + rep_votes,
            dem_pct: share_pct(dem_votes, total_votes),
            rep_pct: share_pct(rep_votes, total_votes),
            winner: winner.to_string(),
            margin,
            margin_pct,
            competitiveness: code.competitiveness(),
        }
    }
}

/// All the county results of one contest in one year, keyed by county name.
pub type ContestYearBlock = BTreeMap<String, VoteRecord>;

/// year -> contest -> county -> record.
///
/// Years are 4-digit strings, so the natural ordering of the map is the
/// chronological order.
pub type Dataset = BTreeMap<String, BTreeMap<String, ContestYearBlock>>;

/// Checks that a year key is a zero-padded 4-digit year.
pub fn is_valid_year(year: &str) -> bool {
    year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())
}
