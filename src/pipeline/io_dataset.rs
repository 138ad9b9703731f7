// Reading and writing the persisted dataset.

use std::fs;

use county_ratings::{is_valid_year, Dataset, VoteRecord};
use serde::Serialize;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::pipeline::io_common::simplify_file_name;
use crate::pipeline::*;

pub const RESULTS_KEY: &str = "results_by_year";

/// Serializes a value as pretty JSON with sorted keys.
///
/// Going through a `JSValue` sorts every object, so the same content always
/// gives the same bytes whatever type it was serialized from.
pub fn to_canonical_json<T: Serialize>(value: &T) -> PipelineResult<String> {
    let js = serde_json::to_value(value).context(SerializingJsonSnafu {})?;
    let mut s = serde_json::to_string_pretty(&js).context(SerializingJsonSnafu {})?;
    s.push('\n');
    Ok(s)
}

/// Writes the file next to its destination and renames it over the target,
/// so that readers never see a partial file.
pub fn write_atomic(path: &str, contents: &str) -> PipelineResult<()> {
    let target = Path::new(path);
    let dir = match target.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).context(WritingDatasetSnafu { path })?;
    let file_name = simplify_file_name(path);
    let tmp = dir.join(format!(".{}.tmp", file_name));
    fs::write(&tmp, contents).context(WritingDatasetSnafu {
        path: tmp.display().to_string(),
    })?;
    fs::rename(&tmp, target).context(WritingDatasetSnafu { path })?;
    debug!("write_atomic: {}: {} bytes", path, contents.len());
    Ok(())
}

/// A dataset file: the results plus every other top-level key, kept as is.
#[derive(PartialEq, Debug, Clone)]
pub struct LoadedDataset {
    pub results: Dataset,
    pub metadata: JSMap<String, JSValue>,
}

impl LoadedDataset {
    pub fn to_json(&self) -> PipelineResult<JSValue> {
        let mut js = self.metadata.clone();
        let results = serde_json::to_value(&self.results).context(SerializingJsonSnafu {})?;
        js.insert(RESULTS_KEY.to_string(), results);
        Ok(JSValue::Object(js))
    }
}

fn as_object<'a>(
    path: &str,
    v: &'a JSValue,
    what: &str,
) -> PipelineResult<&'a JSMap<String, JSValue>> {
    match v.as_object() {
        Some(m) => Ok(m),
        None => whatever!("{}: {} is not a JSON object", path, what),
    }
}

pub fn read_dataset(path: &str) -> PipelineResult<LoadedDataset> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    let mut metadata = as_object(path, &js, "the dataset")?.clone();
    let results_js = match metadata.remove(RESULTS_KEY) {
        Some(r) => r,
        None => whatever!("{}: missing {:?}", path, RESULTS_KEY),
    };

    let mut results: Dataset = Dataset::new();
    for (year, contests) in as_object(path, &results_js, RESULTS_KEY)? {
        if !is_valid_year(year) {
            whatever!("{}: invalid year {:?}", path, year);
        }
        // Empty years and contests are kept so that a rewrite does not drop them.
        let year_block = results.entry(year.clone()).or_default();
        for (contest, block) in as_object(path, contests, year)? {
            let contest_block = year_block.entry(contest.clone()).or_default();
            for (county, record) in as_object(path, block, contest)? {
                let rec: VoteRecord =
                    serde_json::from_value(record.clone()).context(DatasetRecordSnafu {
                        path,
                        year,
                        contest,
                        county,
                    })?;
                contest_block.insert(county.clone(), rec);
            }
        }
    }
    info!(
        "read_dataset: {}: {} years, {} extra keys",
        path,
        results.len(),
        metadata.len()
    );
    Ok(LoadedDataset { results, metadata })
}

pub fn write_dataset(path: &str, dataset: &LoadedDataset) -> PipelineResult<()> {
    let contents = to_canonical_json(&dataset.to_json()?)?;
    write_atomic(path, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"{
        "generated_by": "hand",
        "summary": {"total_years": 1},
        "results_by_year": {"2020": {"President": {"A": {
            "county_name": "A", "dem_candidate": "D", "dem_votes": 10,
            "rep_candidate": "R", "rep_votes": 5, "other_votes": 1,
            "total_votes": 16, "margin": 5, "margin_pct": 31.25,
            "competitiveness": {"category": "Safe Democratic", "party": "DEM", "code": "SAFE_DEM", "color": "x"}
        }}}}
    }"#;

    #[test]
    fn preserves_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("data.json").display().to_string();
        fs::write(&p, DATASET).unwrap();

        let loaded = read_dataset(&p).unwrap();
        assert_eq!(loaded.results["2020"]["President"]["A"].margin, 5);
        assert_eq!(loaded.metadata["generated_by"], JSValue::from("hand"));

        write_dataset(&p, &loaded).unwrap();
        let again = read_dataset(&p).unwrap();
        assert_eq!(again, loaded);
        let raw = fs::read_to_string(&p).unwrap();
        assert!(raw.contains("\"generated_by\": \"hand\""));
        assert!(!dir.path().join(".data.json.tmp").exists());
    }

    #[test]
    fn rejects_incomplete_record() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("data.json").display().to_string();
        fs::write(&p, DATASET.replace("\"rep_votes\": 5,", "")).unwrap();
        match read_dataset(&p) {
            Err(PipelineError::DatasetRecord {
                year,
                contest,
                county,
                ..
            }) => {
                assert_eq!(year, "2020");
                assert_eq!(contest, "President");
                assert_eq!(county, "A");
            }
            x => panic!("unexpected result {:?}", x),
        }
    }

    #[test]
    fn keeps_empty_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("data.json").display().to_string();
        fs::write(
            &p,
            DATASET.replace(
                "\"results_by_year\": {",
                "\"results_by_year\": {\"2016\": {}, \"2017\": {\"Governor\": {}}, ",
            ),
        )
        .unwrap();

        let loaded = read_dataset(&p).unwrap();
        assert_eq!(loaded.results.len(), 3);
        assert!(loaded.results["2016"].is_empty());
        assert!(loaded.results["2017"]["Governor"].is_empty());

        write_dataset(&p, &loaded).unwrap();
        assert_eq!(read_dataset(&p).unwrap(), loaded);
    }

    #[test]
    fn atomic_write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out/nested/d.json").display().to_string();
        write_atomic(&p, "{}\n").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "{}\n");
    }
}
