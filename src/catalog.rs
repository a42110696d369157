//! Region catalog loading
//!
//! The catalog is a GeoJSON-style document with a `features` array; each
//! feature's `geometry.coordinates` holds a polygon ring list that is consumed
//! verbatim by the request builder. Features with missing or malformed
//! geometry are skipped with a warning rather than aborting the load, matching
//! the tolerant behavior expected of hand-maintained region files. An
//! unreadable or empty catalog is fatal: the run must abort before any work
//! item is scheduled.

use crate::Polygon;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Catalog file could not be read
    #[error("IO error: {0}")]
    IoError(String),

    /// Catalog document is not valid JSON or lacks a `features` array
    #[error("parse error: {0}")]
    ParseError(String),

    /// Catalog contained no usable region geometry
    #[error("catalog contains no valid region geometries")]
    Empty,
}

/// One sub-region: a stable identifier plus its polygon geometry. Immutable
/// once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// 1-based index among the valid catalog entries
    pub id: u32,
    /// Optional display name from feature properties
    pub name: Option<String>,
    /// Polygon geometry, carried verbatim to the compute service
    pub geometry: Polygon,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: serde_json::Value,
}

/// Load the region catalog from a JSON file.
///
/// Returns the valid regions in catalog order, numbered from 1. Invalid
/// entries are skipped with a warning; an unreadable document or a catalog
/// with no valid entries is an error.
pub fn load_regions<P: AsRef<Path>>(path: P) -> Result<Vec<Region>, CatalogError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CatalogError::IoError(format!("failed to read {}: {e}", path.display())))?;
    parse_regions(&contents)
}

/// Parse a region catalog from a JSON string. See [`load_regions`].
pub fn parse_regions(contents: &str) -> Result<Vec<Region>, CatalogError> {
    let document: CatalogDocument =
        serde_json::from_str(contents).map_err(|e| CatalogError::ParseError(e.to_string()))?;

    let mut regions = Vec::with_capacity(document.features.len());
    for (index, feature) in document.features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(g) => g,
            None => {
                warn!(feature = index, "Skipping sub-region with missing geometry");
                continue;
            }
        };

        let coordinates: Vec<Vec<[f64; 2]>> = match serde_json::from_value(geometry.coordinates) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    feature = index,
                    error = %e,
                    "Skipping sub-region with malformed coordinates"
                );
                continue;
            }
        };

        let polygon = Polygon { coordinates };
        if let Err(e) = polygon.validate() {
            warn!(feature = index, error = %e, "Skipping invalid sub-region geometry");
            continue;
        }

        let name = feature
            .properties
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        regions.push(Region {
            id: regions.len() as u32 + 1,
            name,
            geometry: polygon,
        });
    }

    if regions.is_empty() {
        return Err(CatalogError::Empty);
    }

    Ok(regions)
}
