//! Index-aligned response geometries

use geo::MultiLineString;

/// One entry per query, in request order
///
/// `None` marks a query the server could not resolve (unknown road or carriageway).
/// A `Some` with no parts means the road exists but the SLK range missed it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeoFeatureCollection {
    features: Vec<Option<MultiLineString<f64>>>,
}

impl GeoFeatureCollection {
    pub fn new(features: Vec<Option<MultiLineString<f64>>>) -> Self {
        Self { features }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Geometry for the query at `index`, if it resolved
    pub fn get(&self, index: usize) -> Option<&MultiLineString<f64>> {
        self.features.get(index).and_then(Option::as_ref)
    }

    pub fn features(&self) -> &[Option<MultiLineString<f64>>] {
        &self.features
    }

    pub fn into_features(self) -> Vec<Option<MultiLineString<f64>>> {
        self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&MultiLineString<f64>>> {
        self.features.iter().map(Option::as_ref)
    }

    /// Number of queries that resolved to any geometry at all
    pub fn resolved_count(&self) -> usize {
        self.features.iter().filter(|f| f.is_some()).count()
    }

    /// Convert to GeoJSON, keeping one feature per query
    ///
    /// Unresolved entries become features with a null geometry so indices still line
    /// up with the request.
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|geometry| geojson::Feature {
                bbox: None,
                geometry: geometry
                    .as_ref()
                    .map(|mls| geojson::Geometry::new(geojson::Value::from(mls))),
                id: None,
                properties: None,
                foreign_members: None,
            })
            .collect();

        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

impl From<Vec<Option<MultiLineString<f64>>>> for GeoFeatureCollection {
    fn from(features: Vec<Option<MultiLineString<f64>>>) -> Self {
        Self::new(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, line_string};

    fn sample() -> GeoFeatureCollection {
        GeoFeatureCollection::new(vec![
            Some(MultiLineString::new(vec![line_string![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 1.0),
            ]])),
            None,
            Some(MultiLineString::new(Vec::<LineString<f64>>::new())),
        ])
    }

    #[test]
    fn test_accessors() {
        let collection = sample();
        assert_eq!(collection.len(), 3);
        assert!(!collection.is_empty());
        assert!(collection.get(0).is_some());
        assert!(collection.get(1).is_none());
        assert!(collection.get(7).is_none());
        assert_eq!(collection.resolved_count(), 2);
        assert_eq!(collection.iter().filter(Option::is_none).count(), 1);
    }

    #[test]
    fn test_geojson_keeps_index_alignment() {
        let geojson = sample().to_geojson();
        assert_eq!(geojson.features.len(), 3);
        assert!(geojson.features[0].geometry.is_some());
        assert!(geojson.features[1].geometry.is_none());

        let value = serde_json::to_value(&geojson).unwrap();
        assert_eq!(value["features"][0]["geometry"]["type"], "MultiLineString");
        assert!(value["features"][1]["geometry"].is_null());
    }
}
