//! Decode the station-coordinate list resource (`.s`).
//!
//! The resource is a flat run of 20-bit records: a 10-bit latitude field
//! followed by a 10-bit longitude field. Trailing bits that do not form a
//! full record are padding and are ignored.

use tracing::debug;

use crate::bits::BitCursor;
use crate::types::{Result, Station, COORDINATE_BITS};

/// Bits per station record.
pub const STATION_RECORD_BITS: usize = COORDINATE_BITS * 2;

/// Number of complete station records a buffer of `len` bytes holds.
pub fn station_capacity(len: usize) -> usize {
    len * 8 / STATION_RECORD_BITS
}

/// Decode every complete station record, preserving source order.
pub fn decode_station_list(data: &[u8]) -> Result<Vec<Station>> {
    let count = station_capacity(data.len());
    let mut cursor = BitCursor::new(data);
    let mut stations = Vec::with_capacity(count);

    for _ in 0..count {
        let lat = cursor.read(COORDINATE_BITS)?;
        let lon = cursor.read(COORDINATE_BITS)?;
        stations.push(Station::from_raw(lat, lon));
    }

    debug!(
        stations = stations.len(),
        padding_bits = cursor.remaining_bits(),
        "decoded station list"
    );
    Ok(stations)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
