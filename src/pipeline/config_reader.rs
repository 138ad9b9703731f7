use crate::pipeline::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    /// One of "openelections", "ved_wide", "ved_xlsx".
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// Taken from the file name when not specified.
    pub year: Option<String>,
    /// Taken from the file name or the office column when not specified.
    pub contest: Option<String>,
}

fn default_key_property() -> String {
    "geoid".to_string()
}

fn default_name_property() -> String {
    "namelsad".to_string()
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GeographySettings {
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "keyProperty", default = "default_key_property")]
    pub key_property: String,
    #[serde(rename = "nameProperty", default = "default_name_property")]
    pub name_property: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub sources: Vec<FileSource>,
    pub geography: Option<GeographySettings>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    /// A JSON object mapping candidate name variants to canonical names.
    #[serde(rename = "candidateAliases")]
    pub candidate_aliases: Option<String>,
    /// Canonical contest names to keep. All the known contests by default.
    pub contests: Option<Vec<String>>,
}

impl PipelineConfig {
    /// Resolves the relative paths of the configuration against its directory.
    pub fn resolve_paths(self, root: &Path) -> PipelineConfig {
        let resolve = |p: String| -> String {
            if Path::new(&p).is_absolute() || p == "stdout" {
                p
            } else {
                root.join(p).display().to_string()
            }
        };
        PipelineConfig {
            sources: self
                .sources
                .into_iter()
                .map(|s| FileSource {
                    file_path: resolve(s.file_path),
                    ..s
                })
                .collect(),
            geography: self.geography.map(|g| GeographySettings {
                file_path: resolve(g.file_path),
                ..g
            }),
            output_path: self.output_path.map(resolve),
            candidate_aliases: self.candidate_aliases.map(resolve),
            contests: self.contests,
        }
    }
}

pub fn read_config(path: &str) -> PipelineResult<PipelineConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: PipelineConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    let root = Path::new(path).parent().unwrap_or_else(|| Path::new(""));
    Ok(config.resolve_paths(root))
}

pub fn read_candidate_aliases(path: &str) -> PipelineResult<Vec<(String, String)>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let aliases: BTreeMap<String, String> =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    info!("read_candidate_aliases: {} aliases from {}", aliases.len(), path);
    Ok(aliases.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_config() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("pipeline.json");
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(
            br#"{
                "sources": [
                    {"provider": "openelections", "filePath": "data/20201103__va__general__county.csv"},
                    {"provider": "ved_wide", "filePath": "/abs/ved.csv", "year": "2021", "contest": "Governor"}
                ],
                "geography": {"filePath": "va.geojson"},
                "outputPath": "out/dataset.json"
            }"#,
        )
        .unwrap();

        let config = read_config(&p.display().to_string()).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(
            config.sources[0].file_path,
            dir.path()
                .join("data/20201103__va__general__county.csv")
                .display()
                .to_string()
        );
        assert_eq!(config.sources[1].file_path, "/abs/ved.csv");
        assert_eq!(config.sources[1].year.as_deref(), Some("2021"));
        let geo = config.geography.unwrap();
        assert_eq!(geo.key_property, "geoid");
        assert_eq!(geo.name_property, "namelsad");
        assert!(config.candidate_aliases.is_none());
    }

    #[test]
    fn missing_config() {
        let res = read_config("/nonexistent/pipeline.json");
        assert!(matches!(res, Err(PipelineError::OpeningJson { .. })));
    }
}
