//! Integration tests for ranking catalog locations through the service facade

use camino::Utf8PathBuf;
use georank::models::GeoConfig;
use georank::platform::Platform;
use georank::services::{CatalogError, GeolocationService, YamlLocationSource};
use std::fs;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const CATALOG: &str = r#"
old-town:
  - id: "1"
    name: Town Hall
    coordinates: { lat: 59.43, lng: 24.75 }
  - id: "lost"
    name: Unmapped Gallery
    description: ""
  - id: "2"
    name: Viru Gate
    location:
      - { latitude: 59.44, longitude: 24.76 }
"#;

fn write_catalog() -> (TempDir, YamlLocationSource) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().join("locations.yaml")).unwrap();
    fs::write(&path, CATALOG).unwrap();
    (temp_dir, YamlLocationSource::new(path))
}

fn service() -> GeolocationService {
    GeolocationService::new(&GeoConfig::default(), Platform::unsupported())
}

#[tokio::test]
async fn test_rank_for_map_against_manual_position() {
    let (_temp_dir, source) = write_catalog();
    let service = service();
    service.set_manual_position(59.437, 24.7536);

    let ranked = assert_ok!(service.rank_for_map(&source, "old-town").await);

    let ids: Vec<&str> = ranked.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["2", "1", "lost"]);
    assert!(ranked[0].distance_label().unwrap().ends_with(" m"));
    assert!(ranked[1].distance_label().unwrap().ends_with(" m"));
    assert!(ranked[2].distance.is_none());
    assert_eq!(ranked[2].location.description, None);
}

#[tokio::test]
async fn test_rank_for_map_without_position_keeps_catalog_order() {
    let (_temp_dir, source) = write_catalog();

    let ranked = assert_ok!(service().rank_for_map(&source, "old-town").await);

    let ids: Vec<&str> = ranked.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["1", "lost", "2"]);
    assert!(ranked.iter().all(|r| r.distance.is_none()));
}

#[tokio::test]
async fn test_rank_for_unknown_map() {
    let (_temp_dir, source) = write_catalog();

    let err = assert_err!(service().rank_for_map(&source, "harbor").await);
    assert!(matches!(err, CatalogError::MapNotFound(_)));
}
