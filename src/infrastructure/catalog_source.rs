use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::PoseCatalog;

/// Where the pose catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "location", rename_all = "lowercase")]
pub enum CatalogSource {
    #[default]
    Builtin,
    File(PathBuf),
    Url(String),
}

impl CatalogSource {
    /// Interprets a path or URL given on the command line or in the env.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("builtin") {
            CatalogSource::Builtin
        } else if value.starts_with("http://") || value.starts_with("https://") {
            CatalogSource::Url(value.to_string())
        } else {
            CatalogSource::File(PathBuf::from(value))
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file: {0}")]
    Io(#[from] io::Error),
    #[error("could not fetch catalog: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog is not a JSON array of poses: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn fetch_catalog(source: &CatalogSource) -> Result<PoseCatalog, CatalogError> {
    match source {
        CatalogSource::Builtin => Ok(PoseCatalog::builtin()),
        CatalogSource::File(path) => Ok(PoseCatalog::from_json(&fs::read_to_string(path)?)?),
        CatalogSource::Url(url) => {
            let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;
            Ok(PoseCatalog::from_json(&body)?)
        }
    }
}

/// Loads the configured catalog, falling back to the built-in one when the
/// source is unreachable, malformed or empty.
pub fn load_catalog(source: &CatalogSource) -> PoseCatalog {
    match fetch_catalog(source) {
        Ok(catalog) if !catalog.is_empty() => {
            info!(?source, poses = catalog.len(), "pose catalog loaded");
            catalog
        }
        Ok(_) => {
            warn!(?source, "pose catalog is empty, using built-in poses");
            PoseCatalog::builtin()
        }
        Err(e) => {
            warn!(?source, error = %e, "pose catalog unavailable, using built-in poses");
            PoseCatalog::builtin()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse() {
        assert_eq!(CatalogSource::parse(""), CatalogSource::Builtin);
        assert_eq!(CatalogSource::parse("BUILTIN"), CatalogSource::Builtin);
        assert_eq!(
            CatalogSource::parse("https://poses.example/all.json"),
            CatalogSource::Url("https://poses.example/all.json".to_string())
        );
        assert_eq!(
            CatalogSource::parse("./mine.json"),
            CatalogSource::File(PathBuf::from("./mine.json"))
        );
    }

    #[test]
    fn test_file_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("poses.json");
        fs::write(&path, r#"[{"name":"Crow","duration":12}]"#).unwrap();
        let catalog = load_catalog(&CatalogSource::File(path));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("crow").unwrap().duration, 12);
    }

    #[test]
    fn test_missing_or_empty_file_falls_back() {
        let dir = tempdir().unwrap();
        let missing = load_catalog(&CatalogSource::File(dir.path().join("nope.json")));
        assert_eq!(missing.len(), PoseCatalog::builtin().len());

        let path = dir.path().join("empty.json");
        fs::write(&path, "[]").unwrap();
        let empty = load_catalog(&CatalogSource::File(path));
        assert_eq!(empty.len(), PoseCatalog::builtin().len());
    }
}
