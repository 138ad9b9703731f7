//! Margin and competitiveness rating.
//!
//! This is the only place where a margin percentage is turned into a
//! rating. The dataset builder and the validator both go through [`rate`].

use serde::{Deserialize, Serialize};

use crate::config::Competitiveness;

/// The party a rating leans towards.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Party {
    Dem,
    Rep,
    None,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Dem => "DEM",
            Party::Rep => "REP",
            Party::None => "NONE",
        }
    }
}

/// The competitiveness buckets, from the most Republican to the most
/// Democratic. `NoData` is for counties without any recorded vote.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RatingCode {
    SafeRep,
    LikelyRep,
    LeanRep,
    TossupRep,
    Tossup,
    TossupDem,
    LeanDem,
    LikelyDem,
    SafeDem,
    NoData,
}

impl RatingCode {
    pub const ALL: [RatingCode; 10] = [
        RatingCode::SafeRep,
        RatingCode::LikelyRep,
        RatingCode::LeanRep,
        RatingCode::TossupRep,
        RatingCode::Tossup,
        RatingCode::TossupDem,
        RatingCode::LeanDem,
        RatingCode::LikelyDem,
        RatingCode::SafeDem,
        RatingCode::NoData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RatingCode::SafeRep => "SAFE_REP",
            RatingCode::LikelyRep => "LIKELY_REP",
            RatingCode::LeanRep => "LEAN_REP",
            RatingCode::TossupRep => "TOSSUP_REP",
            RatingCode::Tossup => "TOSSUP",
            RatingCode::TossupDem => "TOSSUP_DEM",
            RatingCode::LeanDem => "LEAN_DEM",
            RatingCode::LikelyDem => "LIKELY_DEM",
            RatingCode::SafeDem => "SAFE_DEM",
            RatingCode::NoData => "NO_DATA",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            RatingCode::SafeRep => "Safe Republican",
            RatingCode::LikelyRep => "Likely Republican",
            RatingCode::LeanRep => "Lean Republican",
            RatingCode::TossupRep => "Tossup Republican",
            RatingCode::Tossup => "Tossup",
            RatingCode::TossupDem => "Tossup Democratic",
            RatingCode::LeanDem => "Lean Democratic",
            RatingCode::LikelyDem => "Likely Democratic",
            RatingCode::SafeDem => "Safe Democratic",
            RatingCode::NoData => "No Data",
        }
    }

    pub fn party(&self) -> Party {
        match self {
            RatingCode::SafeRep
            | RatingCode::LikelyRep
            | RatingCode::LeanRep
            | RatingCode::TossupRep => Party::Rep,
            RatingCode::TossupDem
            | RatingCode::LeanDem
            | RatingCode::LikelyDem
            | RatingCode::SafeDem => Party::Dem,
            RatingCode::Tossup | RatingCode::NoData => Party::None,
        }
    }

    /// The map color of the bucket.
    pub fn color(&self) -> &'static str {
        match self {
            RatingCode::SafeRep => "#a50f15",
            RatingCode::LikelyRep => "#de2d26",
            RatingCode::LeanRep => "#fb6a4a",
            RatingCode::TossupRep => "#fcae91",
            RatingCode::Tossup => "#f7f7f7",
            RatingCode::TossupDem => "#c6dbef",
            RatingCode::LeanDem => "#6baed6",
            RatingCode::LikelyDem => "#3182bd",
            RatingCode::SafeDem => "#08519c",
            RatingCode::NoData => "#bdbdbd",
        }
    }

    /// The margin range of the bucket, as shown in the map legend.
    pub fn range(&self) -> &'static str {
        match self {
            RatingCode::SafeRep => "R+15.00% or more",
            RatingCode::LikelyRep => "R+10.00-14.99%",
            RatingCode::LeanRep => "R+5.00-9.99%",
            RatingCode::TossupRep => "R+0.01-4.99%",
            RatingCode::Tossup => "Exact tie",
            RatingCode::TossupDem => "D+0.01-4.99%",
            RatingCode::LeanDem => "D+5.00-9.99%",
            RatingCode::LikelyDem => "D+10.00-14.99%",
            RatingCode::SafeDem => "D+15.00% or more",
            RatingCode::NoData => "No votes recorded",
        }
    }

    /// Position on the Republican (-4) to Democratic (+4) axis.
    /// `NoData` has no position.
    pub fn lean(&self) -> Option<i8> {
        match self {
            RatingCode::SafeRep => Some(-4),
            RatingCode::LikelyRep => Some(-3),
            RatingCode::LeanRep => Some(-2),
            RatingCode::TossupRep => Some(-1),
            RatingCode::Tossup => Some(0),
            RatingCode::TossupDem => Some(1),
            RatingCode::LeanDem => Some(2),
            RatingCode::LikelyDem => Some(3),
            RatingCode::SafeDem => Some(4),
            RatingCode::NoData => None,
        }
    }

    pub fn competitiveness(&self) -> Competitiveness {
        Competitiveness {
            category: self.category().to_string(),
            party: self.party().as_str().to_string(),
            code: self.as_str().to_string(),
            color: self.color().to_string(),
        }
    }
}

/// Classifies a signed margin percentage (positive is Democratic).
///
/// The boundaries are evaluated from the most Republican bucket to the most
/// Democratic one and the first match wins. NaN has no meaningful side and
/// is reported as `NoData`.
pub fn classify(margin_pct: f64) -> RatingCode {
    let x = margin_pct;
    if x.is_nan() {
        RatingCode::NoData
    } else if x <= -15.0 {
        RatingCode::SafeRep
    } else if x <= -10.0 {
        RatingCode::LikelyRep
    } else if x <= -5.0 {
        RatingCode::LeanRep
    } else if x < 0.0 {
        RatingCode::TossupRep
    } else if x == 0.0 {
        RatingCode::Tossup
    } else if x < 5.0 {
        RatingCode::TossupDem
    } else if x < 10.0 {
        RatingCode::LeanDem
    } else if x < 15.0 {
        RatingCode::LikelyDem
    } else {
        RatingCode::SafeDem
    }
}

/// The derived fields of a county result.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Rating {
    pub margin: i64,
    /// Rounded to 2 decimals, which is the value that gets persisted and
    /// classified.
    pub margin_pct: f64,
    pub code: RatingCode,
}

impl Rating {
    pub fn competitiveness(&self) -> Competitiveness {
        self.code.competitiveness()
    }
}

/// Computes the margin, the margin percentage and the rating of a result.
pub fn rate(dem_votes: u64, rep_votes: u64, total_votes: u64) -> Rating {
    let margin = dem_votes as i64 - rep_votes as i64;
    if total_votes == 0 {
        return Rating {
            margin,
            margin_pct: 0.0,
            code: RatingCode::NoData,
        };
    }
    let margin_pct = round2(exact_margin_pct(margin, total_votes));
    Rating {
        margin,
        margin_pct,
        code: classify(margin_pct),
    }
}

/// margin / total * 100 at full precision, 0 when there are no votes.
pub fn exact_margin_pct(margin: i64, total_votes: u64) -> f64 {
    if total_votes == 0 {
        0.0
    } else {
        margin as f64 / total_votes as f64 * 100.0
    }
}

/// Rounds to 2 decimals. Negative zero is folded into zero so that it
/// serializes as `0.0`.
pub fn round2(x: f64) -> f64 {
    let r = (x * 100.0).round() / 100.0;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// One line of the rating legend.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ScaleEntry {
    pub code: &'static str,
    pub category: &'static str,
    pub party: &'static str,
    pub range: &'static str,
    pub color: &'static str,
}

/// The full rating legend, in display order.
pub fn rating_scale() -> Vec<ScaleEntry> {
    RatingCode::ALL
        .iter()
        .map(|c| ScaleEntry {
            code: c.as_str(),
            category: c.category(),
            party: c.party().as_str(),
            range: c.range(),
            color: c.color(),
        })
        .collect()
}
