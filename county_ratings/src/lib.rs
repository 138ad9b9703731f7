//! Aggregation, margins and competitiveness ratings for county-level
//! election results.
//!
//! The crate turns per-locality vote rows into one [`VoteRecord`] per
//! (year, contest, county), classifies each county with a single rating
//! function, and offers a validation pass and a trend scanner over the
//! finished [`Dataset`].
//!
//! ```
//! use county_ratings::*;
//!
//! let rows = vec![
//!     LocalityVotes::new("Arlington County", PartyBucket::Dem, "Kamala D. Harris", 400),
//!     LocalityVotes::new("Arlington County", PartyBucket::Rep, "Donald J. Trump", 100),
//!     LocalityVotes::new("Arlington County", PartyBucket::Other, "Chase Oliver", 20),
//! ];
//! let block = aggregate(&rows);
//! let rec = &block["Arlington County"];
//! assert_eq!(rec.total_votes, 520);
//! assert_eq!(rec.competitiveness.code, "SAFE_DEM");
//! ```

mod config;
pub mod builder;
pub mod names;
pub mod rating;
pub mod trends;
pub mod validate;

use log::{debug, info};
use std::collections::BTreeMap;

pub use crate::config::*;

// **** Private structures ****

// Votes of one party bucket in one locality. The candidates are kept in the
// order in which they first appear, which breaks the ties.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
struct BucketTally {
    votes: u64,
    candidates: Vec<(String, u64)>,
}

impl BucketTally {
    fn add(&mut self, candidate: &str, votes: u64) {
        self.votes += votes;
        match self.candidates.iter_mut().find(|(c, _)| c == candidate) {
            Some((_, count)) => *count += votes,
            None => self.candidates.push((candidate.to_string(), votes)),
        }
    }

    /// The candidate holding the plurality of the bucket.
    fn leader(&self) -> &str {
        let mut best: Option<&(String, u64)> = None;
        for entry in self.candidates.iter() {
            match best {
                Some((_, count)) if entry.1 <= *count => {}
                _ => best = Some(entry),
            }
        }
        best.map(|(c, _)| c.as_str()).unwrap_or("")
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
struct LocalityTally {
    dem: BucketTally,
    rep: BucketTally,
    other: BucketTally,
}

/// Merges the vote rows of one (year, contest) into one record per locality.
///
/// The votes of each party bucket are summed over all the rows of a
/// locality. The total is only computed from these sums, and the margin and
/// rating are derived with [`rating::rate`].
///
/// The candidate attached to each major party is the one with the most
/// votes in that bucket. This assumes one candidate per major party, which
/// holds for general elections.
pub fn aggregate(rows: &[LocalityVotes]) -> ContestYearBlock {
    let mut tallies: BTreeMap<&str, LocalityTally> = BTreeMap::new();
    for row in rows.iter() {
        let tally = tallies.entry(row.locality.as_str()).or_default();
        let bucket = match row.bucket {
            PartyBucket::Dem => &mut tally.dem,
            PartyBucket::Rep => &mut tally.rep,
            PartyBucket::Other => &mut tally.other,
        };
        bucket.add(&row.candidate, row.votes);
    }

    let mut block: ContestYearBlock = BTreeMap::new();
    for (locality, tally) in tallies {
        let rec = VoteRecord::from_counts(
            locality,
            tally.dem.leader(),
            tally.dem.votes,
            tally.rep.leader(),
            tally.rep.votes,
            tally.other.votes,
        );
        debug!(
            "aggregate: {}: dem {} rep {} other {} -> {} ({})",
            locality,
            rec.dem_votes,
            rec.rep_votes,
            rec.other_votes,
            rec.margin_pct,
            rec.competitiveness.code
        );
        block.insert(locality.to_string(), rec);
    }
    info!(
        "aggregate: {} rows into {} localities",
        rows.len(),
        block.len()
    );
    block
}
