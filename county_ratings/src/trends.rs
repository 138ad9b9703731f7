//! Read-only trend analysis over a finished dataset.
//!
//! All the margins are recomputed from the vote counts at full precision.
//! A county without a record in the previous cycle is reported separately
//! and never counts as a flip or a swing.

use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{ContestYearBlock, Dataset, VoteRecord};
use crate::rating::exact_margin_pct;

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TrendOptions {
    pub contests: Vec<String>,
    /// Only look at the N most recent years of the dataset.
    pub window: Option<usize>,
    /// Length of the realignment ranking.
    pub top_realigned: usize,
}

impl Default for TrendOptions {
    fn default() -> Self {
        TrendOptions {
            contests: vec![
                "President".to_string(),
                "Governor".to_string(),
                "US Senate".to_string(),
            ],
            window: None,
            top_realigned: 6,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct CountyMargin {
    pub county: String,
    pub margin_pct: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct CountySwing {
    pub county: String,
    pub from_year: String,
    pub from_pct: f64,
    pub to_pct: f64,
    pub swing: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
pub enum Side {
    Dem,
    Rep,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct Flip {
    pub county: String,
    pub from: Side,
    pub to: Side,
    pub from_pct: f64,
    pub to_pct: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct StatewideMargin {
    pub year: String,
    pub dem_votes: u64,
    pub rep_votes: u64,
    pub total_votes: u64,
    pub margin_pct: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct TurnoutChange {
    pub county: String,
    pub from_votes: u64,
    pub to_votes: u64,
    pub change_pct: f64,
}

/// The trends of one contest.
#[derive(PartialEq, Debug, Clone, Default, Serialize)]
pub struct ContestTrend {
    /// The years of the window in which the contest was held.
    pub years: Vec<String>,
    pub latest_year: Option<String>,
    pub previous_year: Option<String>,
    pub most_democratic: Option<CountyMargin>,
    pub most_republican: Option<CountyMargin>,
    pub biggest_swing: Option<CountySwing>,
    pub statewide: Vec<StatewideMargin>,
    pub flips: Vec<Flip>,
    /// Counties of the latest year without usable data in the previous one.
    pub no_prior_data: Vec<String>,
    /// Largest margin changes between the first and the latest year.
    pub realigned: Vec<CountySwing>,
    pub turnout_changes: Vec<TurnoutChange>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize)]
pub struct TrendReport {
    pub window_years: Vec<String>,
    pub contests: BTreeMap<String, ContestTrend>,
}

// A prior result is either a margin or nothing usable. A missing record and
// a record without votes are both the latter, which is not a tie.
#[derive(PartialEq, Debug, Clone, Copy)]
enum Prior {
    NoPriorData,
    Margin(f64),
}

fn county_margin(rec: &VoteRecord) -> f64 {
    exact_margin_pct(rec.dem_votes as i64 - rec.rep_votes as i64, rec.total_votes)
}

fn prior(block: Option<&ContestYearBlock>, county: &str) -> Prior {
    match block.and_then(|b| b.get(county)) {
        Some(rec) if rec.total_votes > 0 => Prior::Margin(county_margin(rec)),
        _ => Prior::NoPriorData,
    }
}

fn side(margin_pct: f64) -> Option<Side> {
    if margin_pct > 0.0 {
        Some(Side::Dem)
    } else if margin_pct < 0.0 {
        Some(Side::Rep)
    } else {
        None
    }
}

/// Statewide margin: the county votes are summed first and divided once.
fn statewide(year: &str, block: &ContestYearBlock) -> StatewideMargin {
    let dem_votes: u64 = block.values().map(|r| r.dem_votes).sum();
    let rep_votes: u64 = block.values().map(|r| r.rep_votes).sum();
    let total_votes: u64 = block.values().map(|r| r.total_votes).sum();
    StatewideMargin {
        year: year.to_string(),
        dem_votes,
        rep_votes,
        total_votes,
        margin_pct: exact_margin_pct(dem_votes as i64 - rep_votes as i64, total_votes),
    }
}

fn scan_contest(
    dataset: &Dataset,
    years: &[String],
    contest: &str,
    top_realigned: usize,
) -> ContestTrend {
    let contest_years: Vec<&String> = years
        .iter()
        .filter(|y| dataset.get(*y).map(|c| c.contains_key(contest)).unwrap_or(false))
        .collect();
    let block_of = |year: &str| dataset.get(year).and_then(|c| c.get(contest));

    let mut trend = ContestTrend {
        years: contest_years.iter().map(|y| y.to_string()).collect(),
        ..ContestTrend::default()
    };
    for y in contest_years.iter() {
        if let Some(block) = block_of(y) {
            trend.statewide.push(statewide(y, block));
        }
    }

    let latest_year = match contest_years.last() {
        Some(y) => y.to_string(),
        None => return trend,
    };
    let previous_year: Option<String> = if contest_years.len() >= 2 {
        Some(contest_years[contest_years.len() - 2].to_string())
    } else {
        None
    };
    let latest = match block_of(&latest_year) {
        Some(b) => b,
        None => return trend,
    };
    let previous = previous_year.as_deref().and_then(block_of);

    for (county, rec) in latest.iter() {
        if rec.total_votes == 0 {
            continue;
        }
        let m = county_margin(rec);
        if trend.most_democratic.as_ref().map(|b| m > b.margin_pct).unwrap_or(true) {
            trend.most_democratic = Some(CountyMargin {
                county: county.clone(),
                margin_pct: m,
            });
        }
        if trend.most_republican.as_ref().map(|b| m < b.margin_pct).unwrap_or(true) {
            trend.most_republican = Some(CountyMargin {
                county: county.clone(),
                margin_pct: m,
            });
        }

        let (prev_year, prev_pct) = match (previous_year.as_ref(), prior(previous, county)) {
            (Some(y), Prior::Margin(p)) => (y, p),
            _ => {
                trend.no_prior_data.push(county.clone());
                continue;
            }
        };
        let swing = m - prev_pct;
        if trend.biggest_swing.as_ref().map(|b| swing.abs() > b.swing.abs()).unwrap_or(true) {
            trend.biggest_swing = Some(CountySwing {
                county: county.clone(),
                from_year: prev_year.clone(),
                from_pct: prev_pct,
                to_pct: m,
                swing,
            });
        }
        if let (Some(from), Some(to)) = (side(prev_pct), side(m)) {
            if from != to {
                debug!("scan: {} {}: {:?} -> {:?}", contest, county, from, to);
                trend.flips.push(Flip {
                    county: county.clone(),
                    from,
                    to,
                    from_pct: prev_pct,
                    to_pct: m,
                });
            }
        }
        if let Some(prev_rec) = previous.and_then(|b| b.get(county)) {
            trend.turnout_changes.push(TurnoutChange {
                county: county.clone(),
                from_votes: prev_rec.total_votes,
                to_votes: rec.total_votes,
                change_pct: (rec.total_votes as f64 - prev_rec.total_votes as f64)
                    / prev_rec.total_votes as f64
                    * 100.0,
            });
        }
    }

    if contest_years.len() >= 2 {
        let first_year = contest_years[0].to_string();
        let first = block_of(&first_year);
        let mut realigned: Vec<CountySwing> = latest
            .iter()
            .filter(|(_, rec)| rec.total_votes > 0)
            .filter_map(|(county, rec)| match prior(first, county) {
                Prior::Margin(p) => {
                    let m = county_margin(rec);
                    Some(CountySwing {
                        county: county.clone(),
                        from_year: first_year.clone(),
                        from_pct: p,
                        to_pct: m,
                        swing: m - p,
                    })
                }
                Prior::NoPriorData => None,
            })
            .collect();
        // Stable sort: equal swings stay in county order.
        realigned.sort_by(|a, b| b.swing.abs().total_cmp(&a.swing.abs()));
        realigned.truncate(top_realigned);
        trend.realigned = realigned;
    }

    trend.latest_year = Some(latest_year);
    trend.previous_year = previous_year;
    trend
}

/// Scans the dataset for the configured contests.
///
/// For each contest, the latest and previous years are the two most recent
/// years of the window in which the contest was held.
pub fn scan(dataset: &Dataset, options: &TrendOptions) -> TrendReport {
    let mut years: Vec<String> = dataset.keys().cloned().collect();
    years.sort();
    if let Some(n) = options.window {
        let skip = years.len().saturating_sub(n);
        years.drain(..skip);
    }
    info!("scan: years {:?}, contests {:?}", years, options.contests);

    let mut contests: BTreeMap<String, ContestTrend> = BTreeMap::new();
    for contest in options.contests.iter() {
        let trend = scan_contest(dataset, &years, contest, options.top_realigned);
        info!(
            "scan: {}: {} years, {} flips, {} without prior data",
            contest,
            trend.years.len(),
            trend.flips.len(),
            trend.no_prior_data.len()
        );
        contests.insert(contest.clone(), trend);
    }
    TrendReport {
        window_years: years,
        contests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoteRecord;

    fn put(ds: &mut Dataset, year: &str, contest: &str, rec: VoteRecord) {
        ds.entry(year.to_string())
            .or_default()
            .entry(contest.to_string())
            .or_default()
            .insert(rec.county_name.clone(), rec);
    }

    fn rec(county: &str, dem: u64, rep: u64, other: u64) -> VoteRecord {
        VoteRecord::from_counts(county, "D", dem, "R", rep, other)
    }

    fn options(contests: &[&str]) -> TrendOptions {
        TrendOptions {
            contests: contests.iter().map(|s| s.to_string()).collect(),
            ..TrendOptions::default()
        }
    }

    #[test]
    fn flip_from_rep_to_dem() {
        let mut ds = Dataset::new();
        // -3.2% then +1.1%
        put(&mut ds, "2020", "President", rec("Lynchburg city", 484, 516, 0));
        put(&mut ds, "2024", "President", rec("Lynchburg city", 5055, 4945, 0));
        let report = scan(&ds, &options(&["President"]));
        let t = &report.contests["President"];
        assert_eq!(t.latest_year.as_deref(), Some("2024"));
        assert_eq!(t.previous_year.as_deref(), Some("2020"));
        assert_eq!(t.flips.len(), 1);
        assert_eq!(t.flips[0].from, Side::Rep);
        assert_eq!(t.flips[0].to, Side::Dem);
        assert!((t.flips[0].from_pct + 3.2).abs() < 1e-9);
        assert!((t.flips[0].to_pct - 1.1).abs() < 1e-9);
        assert_eq!(
            serde_json::to_value(&t.flips[0]).unwrap()["from"],
            serde_json::json!("Rep")
        );
    }

    #[test]
    fn new_county_is_not_a_flip() {
        let mut ds = Dataset::new();
        put(&mut ds, "2020", "President", rec("A", 10, 20, 0));
        put(&mut ds, "2024", "President", rec("A", 20, 10, 0));
        put(&mut ds, "2024", "President", rec("B", 20, 10, 0));
        put(&mut ds, "2020", "President", rec("C", 0, 0, 0));
        put(&mut ds, "2024", "President", rec("C", 1, 2, 0));
        let t = &scan(&ds, &options(&["President"])).contests["President"];
        assert_eq!(t.flips.len(), 1);
        assert_eq!(t.flips[0].county, "A");
        assert_eq!(t.no_prior_data, vec!["B", "C"]);
        assert_eq!(t.biggest_swing.as_ref().unwrap().county, "A");
    }

    #[test]
    fn extremes_and_swing() {
        let mut ds = Dataset::new();
        put(&mut ds, "2016", "US Senate", rec("A", 50, 50, 0));
        put(&mut ds, "2016", "US Senate", rec("B", 80, 20, 0));
        put(&mut ds, "2018", "US Senate", rec("A", 70, 30, 0));
        put(&mut ds, "2018", "US Senate", rec("B", 75, 25, 0));
        put(&mut ds, "2018", "US Senate", rec("C", 10, 90, 0));
        let t = &scan(&ds, &options(&["US Senate"])).contests["US Senate"];
        assert_eq!(t.most_democratic.as_ref().unwrap().county, "B");
        assert_eq!(t.most_republican.as_ref().unwrap().county, "C");
        let s = t.biggest_swing.as_ref().unwrap();
        assert_eq!(s.county, "A");
        assert!((s.swing - 40.0).abs() < 1e-9);
        assert!(t.flips.is_empty());
    }

    #[test]
    fn statewide_is_not_an_average() {
        let mut ds = Dataset::new();
        put(&mut ds, "2021", "Governor", rec("Big", 900, 100, 0));
        put(&mut ds, "2021", "Governor", rec("Small", 0, 10, 0));
        let t = &scan(&ds, &options(&["Governor"])).contests["Governor"];
        assert_eq!(t.statewide.len(), 1);
        let s = &t.statewide[0];
        assert_eq!(s.dem_votes, 900);
        assert_eq!(s.rep_votes, 110);
        // (900 - 110) / 1010, far from the average of +80% and -100%.
        assert!((s.margin_pct - 790.0 / 1010.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn previous_year_is_per_contest() {
        let mut ds = Dataset::new();
        put(&mut ds, "2017", "Governor", rec("A", 40, 60, 0));
        put(&mut ds, "2020", "President", rec("A", 55, 45, 0));
        put(&mut ds, "2021", "Governor", rec("A", 60, 40, 0));
        put(&mut ds, "2024", "President", rec("A", 45, 55, 0));
        let report = scan(&ds, &options(&["Governor", "President"]));
        let g = &report.contests["Governor"];
        assert_eq!(g.previous_year.as_deref(), Some("2017"));
        assert_eq!(g.latest_year.as_deref(), Some("2021"));
        assert_eq!(g.flips.len(), 1);
        assert_eq!(report.contests["President"].flips[0].to, Side::Rep);
    }

    #[test]
    fn window_and_realignment() {
        let mut ds = Dataset::new();
        put(&mut ds, "2012", "President", rec("A", 90, 10, 0));
        put(&mut ds, "2016", "President", rec("A", 60, 40, 0));
        put(&mut ds, "2016", "President", rec("B", 50, 50, 0));
        put(&mut ds, "2020", "President", rec("A", 55, 45, 0));
        put(&mut ds, "2020", "President", rec("B", 80, 20, 0));
        let mut opts = options(&["President"]);
        opts.window = Some(2);
        let report = scan(&ds, &opts);
        assert_eq!(report.window_years, vec!["2016", "2020"]);
        let t = &report.contests["President"];
        assert_eq!(t.realigned.len(), 2);
        assert_eq!(t.realigned[0].county, "B");
        assert_eq!(t.realigned[0].from_year, "2016");
        assert_eq!(t.turnout_changes.len(), 2);
    }

    #[test]
    fn missing_contest() {
        let ds = Dataset::new();
        let t = &scan(&ds, &options(&["Governor"])).contests["Governor"];
        assert!(t.latest_year.is_none());
        assert!(t.flips.is_empty());
    }
}
