// Reads the join keys of the county polygons. The geometries are left alone.

use std::fs;

use county_ratings::builder::GeographyKeys;
use serde_json::Value as JSValue;

use crate::pipeline::config_reader::GeographySettings;
use crate::pipeline::*;

fn property_text(v: &JSValue) -> Option<String> {
    match v {
        JSValue::String(s) => Some(s.clone()),
        JSValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn read_geography(settings: &GeographySettings) -> PipelineResult<GeographyKeys> {
    let path = settings.file_path.as_str();
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    let features = match js.get("features").and_then(|f| f.as_array()) {
        Some(f) => f,
        None => whatever!("{}: not a GeoJSON FeatureCollection", path),
    };

    let mut keys = GeographyKeys::default();
    for (idx, feature) in features.iter().enumerate() {
        let props = feature.get("properties");
        let key = props
            .and_then(|p| p.get(&settings.key_property))
            .and_then(property_text);
        let name = props
            .and_then(|p| p.get(&settings.name_property))
            .and_then(property_text);
        match (key, name) {
            (Some(key), Some(name)) => keys.insert(&key, &name),
            _ => warn!(
                "read_geography: {}: feature {} has no {:?} or {:?} property",
                path, idx, settings.key_property, settings.name_property
            ),
        }
    }
    info!("read_geography: {}: {} counties", path, keys.len());
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_keys() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("va.geojson");
        fs::write(
            &p,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"geoid": "51001", "namelsad": "Accomack County"}, "geometry": null},
                {"type": "Feature", "properties": {"GEOID": 51510, "NAME": "Alexandria city"}, "geometry": null},
                {"type": "Feature", "properties": {"geoid": "51003"}, "geometry": null}
            ]}"#,
        )
        .unwrap();
        let settings = GeographySettings {
            file_path: p.display().to_string(),
            key_property: "geoid".to_string(),
            name_property: "namelsad".to_string(),
        };
        let keys = read_geography(&settings).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.get("ACCOMACK COUNTY").unwrap().fips, "51001");

        let settings = GeographySettings {
            key_property: "GEOID".to_string(),
            name_property: "NAME".to_string(),
            ..settings
        };
        let keys = read_geography(&settings).unwrap();
        assert_eq!(keys.get("Alexandria City").unwrap().fips, "51510");
    }

    #[test]
    fn not_a_collection() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bad.geojson");
        fs::write(&p, "{\"type\": \"Feature\"}").unwrap();
        let settings = GeographySettings {
            file_path: p.display().to_string(),
            key_property: "geoid".to_string(),
            name_property: "namelsad".to_string(),
        };
        assert!(read_geography(&settings).is_err());
    }
}
