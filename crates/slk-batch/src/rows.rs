//! Pairing response geometries back up with input rows

use crate::collection::GeoFeatureCollection;
use crate::query::LinearReferenceQuery;
use geo::MultiLineString;
use std::fmt;

/// Why a row produced no geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonMappableReason {
    /// The server returned `null`: unknown road number or carriageway
    InvalidRoadOrCarriageway,
    /// The road exists but no part of it lies in the SLK range
    SlkOutsideValidRange,
}

impl fmt::Display for NonMappableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonMappableReason::InvalidRoadOrCarriageway => f.write_str("invalid road or cwy"),
            NonMappableReason::SlkOutsideValidRange => f.write_str("slk outside valid range(s)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonMappableRow {
    /// 1-based, as a spreadsheet shows it
    pub row_number: usize,
    pub query: LinearReferenceQuery,
    pub reason: NonMappableReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    /// 0-based index into the query list
    pub row_index: usize,
    pub geometry: MultiLineString<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowJoin {
    pub mapped: Vec<MappedRow>,
    pub non_mappable: Vec<NonMappableRow>,
}

impl RowJoin {
    pub fn is_fully_mapped(&self) -> bool {
        self.non_mappable.is_empty()
    }
}

/// Zip queries with their geometries
///
/// Extra entries on either side are ignored; the client already warns when the
/// lengths differ.
pub fn join_rows(queries: &[LinearReferenceQuery], collection: &GeoFeatureCollection) -> RowJoin {
    let mut join = RowJoin::default();

    for (row_index, (query, feature)) in queries.iter().zip(collection.iter()).enumerate() {
        let reason = match feature {
            None => NonMappableReason::InvalidRoadOrCarriageway,
            Some(geometry) if geometry.0.iter().all(|part| part.0.is_empty()) => {
                NonMappableReason::SlkOutsideValidRange
            }
            Some(geometry) => {
                join.mapped.push(MappedRow {
                    row_index,
                    geometry: geometry.clone(),
                });
                continue;
            }
        };

        join.non_mappable.push(NonMappableRow {
            row_number: row_index + 1,
            query: query.clone(),
            reason,
        });
    }

    if !join.non_mappable.is_empty() {
        tracing::debug!(
            mapped = join.mapped.len(),
            non_mappable = join.non_mappable.len(),
            "Some rows could not be mapped"
        );
    }
    join
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, line_string};

    fn resolved() -> Option<MultiLineString<f64>> {
        Some(MultiLineString::new(vec![line_string![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
        ]]))
    }

    fn empty() -> Option<MultiLineString<f64>> {
        Some(MultiLineString::new(Vec::<LineString<f64>>::new()))
    }

    #[test]
    fn test_join_classifies_rows() {
        let queries = vec![
            LinearReferenceQuery::new("H001", 0.0, 1.0),
            LinearReferenceQuery::new("NOPE", 0.0, 1.0),
            LinearReferenceQuery::new("H001", 900.0, 901.0),
            LinearReferenceQuery::new("H002", 3.0, 4.0),
        ];
        let collection = GeoFeatureCollection::new(vec![resolved(), None, empty(), resolved()]);

        let join = join_rows(&queries, &collection);
        assert_eq!(join.mapped.len(), 2);
        assert_eq!(join.mapped[0].row_index, 0);
        assert_eq!(join.mapped[1].row_index, 3);

        assert_eq!(join.non_mappable.len(), 2);
        assert_eq!(join.non_mappable[0].row_number, 2);
        assert_eq!(join.non_mappable[0].query.road, "NOPE");
        assert_eq!(
            join.non_mappable[0].reason,
            NonMappableReason::InvalidRoadOrCarriageway
        );
        assert_eq!(join.non_mappable[1].row_number, 3);
        assert_eq!(
            join.non_mappable[1].reason,
            NonMappableReason::SlkOutsideValidRange
        );
        assert!(!join.is_fully_mapped());
    }

    #[test]
    fn test_parts_without_points_count_as_empty() {
        let queries = vec![LinearReferenceQuery::new("H001", 0.0, 1.0)];
        let collection = GeoFeatureCollection::new(vec![Some(MultiLineString::new(vec![
            LineString::new(Vec::new()),
        ]))]);
        let join = join_rows(&queries, &collection);
        assert_eq!(
            join.non_mappable[0].reason,
            NonMappableReason::SlkOutsideValidRange
        );
    }

    #[test]
    fn test_length_mismatch_zips_to_shortest() {
        let queries = vec![
            LinearReferenceQuery::new("H001", 0.0, 1.0),
            LinearReferenceQuery::new("H002", 0.0, 1.0),
        ];
        let join = join_rows(&queries, &GeoFeatureCollection::new(vec![resolved()]));
        assert_eq!(join.mapped.len(), 1);
        assert!(join.is_fully_mapped());

        let join = join_rows(&[], &GeoFeatureCollection::new(vec![None, None]));
        assert_eq!(join, RowJoin::default());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            NonMappableReason::InvalidRoadOrCarriageway.to_string(),
            "invalid road or cwy"
        );
        assert_eq!(
            NonMappableReason::SlkOutsideValidRange.to_string(),
            "slk outside valid range(s)"
        );
    }
}
