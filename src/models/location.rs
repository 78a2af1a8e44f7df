use serde::{Deserialize, Serialize};

/// A normalized latitude/longitude pair in degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Validate a raw pair, rejecting non-finite or out-of-range values.
    pub fn resolve(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }
}

/// A point of interest supplied by the catalog collaborator.
///
/// `coordinates` is `None` when the upstream record had no usable position; such
/// candidates still take part in ranking but always sort last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLocation {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// Computed distance from the device to a candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Distance {
    pub meters: f64,
    pub label: String,
}

/// A candidate annotated with its distance from the current position.
///
/// Derived on every ranking call and never cached across position changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedLocation {
    pub location: CandidateLocation,
    /// `None` when no position was known or the candidate has no coordinates
    pub distance: Option<Distance>,
}

impl RankedLocation {
    pub fn id(&self) -> &str {
        &self.location.id
    }

    pub fn distance_meters(&self) -> Option<f64> {
        self.distance.as_ref().map(|d| d.meters)
    }

    pub fn distance_label(&self) -> Option<&str> {
        self.distance.as_ref().map(|d| d.label.as_str())
    }
}

// Upstream record shapes
//
// The catalog has stored coordinates in several layouts over time. They are accepted
// here and collapsed into `CandidateLocation` by the `From` impl below.

/// A coordinate object as it appears in catalog records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCoordinates {
    LatLng { lat: f64, lng: f64 },
    Verbose { latitude: f64, longitude: f64 },
}

impl RawCoordinates {
    fn resolve(&self) -> Option<Coordinates> {
        match *self {
            Self::LatLng { lat, lng } => Coordinates::resolve(lat, lng),
            Self::Verbose { latitude, longitude } => Coordinates::resolve(latitude, longitude),
        }
    }
}

/// One entry of the legacy `location` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyLocationEntry {
    Wrapped { coordinates: RawCoordinates },
    Bare(RawCoordinates),
}

impl LegacyLocationEntry {
    fn coordinates(&self) -> &RawCoordinates {
        match self {
            Self::Wrapped { coordinates } => coordinates,
            Self::Bare(coordinates) => coordinates,
        }
    }
}

/// A catalog record before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLocation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
    #[serde(default)]
    pub location: Option<Vec<LegacyLocationEntry>>,
}

impl RawLocation {
    /// Extract coordinates from whichever layout the record uses.
    ///
    /// The top-level `coordinates` field wins; otherwise the first legacy entry that
    /// resolves is used.
    pub fn resolve_coordinates(&self) -> Option<Coordinates> {
        if let Some(coords) = self.coordinates.as_ref().and_then(RawCoordinates::resolve) {
            return Some(coords);
        }

        self.location
            .iter()
            .flatten()
            .find_map(|entry| entry.coordinates().resolve())
    }
}

impl From<RawLocation> for CandidateLocation {
    fn from(raw: RawLocation) -> Self {
        let coordinates = raw.resolve_coordinates();
        Self {
            id: raw.id,
            name: raw.name,
            description: raw.description.filter(|d| !d.trim().is_empty()),
            coordinates,
        }
    }
}
