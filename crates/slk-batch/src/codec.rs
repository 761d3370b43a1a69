//! Binary request encoding and JSON response decoding
//!
//! A request body is the concatenation of one record per query, all little-endian:
//!
//! ```text
//! [u8 road_len][road_len bytes UTF-8 road][f32 slk_min][f32 slk_max][f32 offset][u8 cwy]
//! ```
//!
//! There is no header and no count prefix; the server reads records until the body
//! ends. The response is a JSON array aligned to the request, each element either
//! `null` or a list of parts, each part a list of `[x, y]` pairs.

use crate::collection::GeoFeatureCollection;
use crate::query::{Carriageway, EncodedQuery, LinearReferenceQuery};
use crate::{BatchError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use geo::{LineString, MultiLineString};
use std::io::{Cursor, Read};

/// Longest road name the one-byte length prefix can describe
pub const MAX_ROAD_NAME_BYTES: usize = u8::MAX as usize;

/// Bytes in a record besides the road name: length prefix, three floats, bitmask
pub const FIXED_RECORD_BYTES: usize = 1 + 3 * 4 + 1;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("road name is {len} bytes, longer than the {MAX_ROAD_NAME_BYTES} byte limit")]
    RoadNameTooLong { len: usize },

    #[error("request body truncated at byte {offset}")]
    Truncated { offset: u64 },

    #[error("road name at byte {offset} is not valid UTF-8")]
    InvalidRoadName { offset: u64 },

    #[error("unknown carriageway bitmask {bits:#05b} at byte {offset}")]
    UnknownCarriageway { bits: u8, offset: u64 },
}

/// Append one record to `out`
///
/// Only the road name length can fail; `out` is left untouched in that case.
pub fn encode_query(
    query: &EncodedQuery,
    out: &mut Vec<u8>,
) -> std::result::Result<(), EncodeError> {
    let road = query.road.as_bytes();
    let len = u8::try_from(road.len())
        .map_err(|_| EncodeError::RoadNameTooLong { len: road.len() })?;

    out.push(len);
    out.extend_from_slice(road);
    out.extend_from_slice(&query.slk_min.to_le_bytes());
    out.extend_from_slice(&query.slk_max.to_le_bytes());
    out.extend_from_slice(&query.offset.to_le_bytes());
    out.push(query.carriageway.bits());
    Ok(())
}

/// Encode already-normalised queries into one request body
pub fn encode(queries: &[EncodedQuery]) -> Result<Vec<u8>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("codec::encode");

    let capacity = queries
        .iter()
        .map(|q| q.road.len() + FIXED_RECORD_BYTES)
        .sum();
    let mut body = Vec::with_capacity(capacity);
    for (index, query) in queries.iter().enumerate() {
        encode_query(query, &mut body)
            .map_err(|source| BatchError::BinaryEncoding { index, source })?;
    }
    Ok(body)
}

/// Normalise and encode a batch in request order
pub fn encode_batch(queries: &[LinearReferenceQuery], offset_multiplier: f64) -> Result<Vec<u8>> {
    let normalized: Vec<EncodedQuery> = queries
        .iter()
        .map(|q| q.normalized(offset_multiplier))
        .collect();
    encode(&normalized)
}

/// Read a request body back into records
///
/// This is the server's half of the format. Any partial trailing record is an error.
pub fn decode_request(body: &[u8]) -> std::result::Result<Vec<EncodedQuery>, EncodeError> {
    let mut cursor = Cursor::new(body);
    let mut queries = Vec::new();

    while (cursor.position() as usize) < body.len() {
        let start = cursor.position();
        let truncated = |cursor: &Cursor<&[u8]>| EncodeError::Truncated {
            offset: cursor.position(),
        };

        let len = cursor.read_u8().map_err(|_| truncated(&cursor))?;
        let mut road = vec![0; usize::from(len)];
        cursor.read_exact(&mut road).map_err(|_| truncated(&cursor))?;
        let road = String::from_utf8(road)
            .map_err(|_| EncodeError::InvalidRoadName { offset: start + 1 })?;

        let slk_min = cursor.read_f32::<LittleEndian>().map_err(|_| truncated(&cursor))?;
        let slk_max = cursor.read_f32::<LittleEndian>().map_err(|_| truncated(&cursor))?;
        let offset = cursor.read_f32::<LittleEndian>().map_err(|_| truncated(&cursor))?;

        let bits_at = cursor.position();
        let bits = cursor.read_u8().map_err(|_| truncated(&cursor))?;
        let carriageway = Carriageway::from_bits(bits).ok_or(EncodeError::UnknownCarriageway {
            bits,
            offset: bits_at,
        })?;

        queries.push(EncodedQuery {
            road,
            slk_min,
            slk_max,
            offset,
            carriageway,
        });
    }

    Ok(queries)
}

type RawFeature = Option<Vec<Vec<[f64; 2]>>>;

/// Parse a response body into geometries, one per query
pub fn decode(json: &[u8]) -> Result<GeoFeatureCollection> {
    #[cfg(feature = "profiling")]
    profiling::scope!("codec::decode");

    let raw: Vec<RawFeature> = serde_json::from_slice(json)?;
    let features = raw
        .into_iter()
        .map(|feature| {
            feature.map(|parts| {
                MultiLineString::new(parts.into_iter().map(LineString::from).collect())
            })
        })
        .collect();
    Ok(GeoFeatureCollection::new(features))
}
