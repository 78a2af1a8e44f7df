//! Candidate location catalog.
//!
//! The ranking engine does not care where candidates come from. [`LocationSource`] is the
//! seam for the content backend; [`YamlLocationSource`] reads a local file keyed by map
//! id, which is what the command-line tool and the tests use.

use crate::models::{CandidateLocation, RawLocation};
use crate::services::CatalogError;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

/// Query for a catalog search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFilter {
    pub map_id: String,
}

impl LocationFilter {
    pub fn for_map(map_id: impl Into<String>) -> Self {
        Self {
            map_id: map_id.into(),
        }
    }
}

/// Backend that supplies raw location records for a map
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn search(&self, filter: &LocationFilter) -> Result<Vec<RawLocation>, CatalogError>;
}

/// Fetch and normalize every candidate for one map.
///
/// Records without usable coordinates are kept; ranking sorts them last.
pub async fn load_candidates(
    source: &dyn LocationSource,
    map_id: &str,
) -> Result<Vec<CandidateLocation>, CatalogError> {
    let raw = source.search(&LocationFilter::for_map(map_id)).await?;
    let candidates: Vec<CandidateLocation> = raw.into_iter().map(CandidateLocation::from).collect();

    let unresolved = candidates.iter().filter(|c| c.coordinates.is_none()).count();
    if unresolved > 0 {
        tracing::debug!(
            "{} of {} locations on map {} have no coordinates",
            unresolved,
            candidates.len(),
            map_id
        );
    }

    Ok(candidates)
}

/// Catalog backed by a YAML document of the form
///
/// ```yaml
/// old-town:
///   - id: "1"
///     name: Town Hall Square
///     coordinates: { lat: 59.437, lng: 24.745 }
/// ```
#[derive(Debug, Clone)]
pub struct YamlLocationSource {
    path: Utf8PathBuf,
}

impl YamlLocationSource {
    pub fn new<P: AsRef<Utf8Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[async_trait]
impl LocationSource for YamlLocationSource {
    async fn search(&self, filter: &LocationFilter) -> Result<Vec<RawLocation>, CatalogError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut maps: HashMap<String, Vec<RawLocation>> = serde_yaml_ng::from_str(&contents)?;

        let locations = maps
            .remove(&filter.map_id)
            .ok_or_else(|| CatalogError::MapNotFound(filter.map_id.clone()))?;

        tracing::debug!(
            "Loaded {} locations for map {} from {}",
            locations.len(),
            filter.map_id,
            self.path
        );
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use tempfile::TempDir;

    const CATALOG: &str = r#"
old-town:
  - id: "1"
    name: Town Hall Square
    coordinates: { lat: 59.437, lng: 24.745 }
  - id: "2"
    name: Fat Margaret
    location:
      - coordinates: { latitude: 59.4415, longitude: 24.7509 }
  - id: "3"
    name: Somewhere
harbor:
  - id: "9"
    name: Seaplane Harbour
    coordinates: { lat: 59.4513, lng: 24.7377 }
"#;

    fn write_catalog(dir: &TempDir) -> Utf8PathBuf {
        let path = Utf8PathBuf::try_from(dir.path().join("locations.yaml")).unwrap();
        std::fs::write(&path, CATALOG).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_candidates_normalizes_shapes() {
        let dir = TempDir::new().unwrap();
        let source = YamlLocationSource::new(write_catalog(&dir));

        let candidates = load_candidates(&source, "old-town").await.unwrap();

        assert_eq!(candidates.len(), 3);
        assert_eq!(
            candidates[1].coordinates,
            Some(Coordinates { lat: 59.4415, lng: 24.7509 })
        );
        assert!(candidates[2].coordinates.is_none());
    }

    #[tokio::test]
    async fn test_unknown_map() {
        let dir = TempDir::new().unwrap();
        let source = YamlLocationSource::new(write_catalog(&dir));

        let err = load_candidates(&source, "nowhere").await.unwrap_err();
        assert!(matches!(err, CatalogError::MapNotFound(ref id) if id == "nowhere"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("absent.yaml")).unwrap();
        let source = YamlLocationSource::new(path);

        let err = source.search(&LocationFilter::for_map("x")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Io(_)));
    }
}
