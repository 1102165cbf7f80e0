//! Decode the periodic status/intensity resource (`.b`).
//!
//! Layout:
//! - Header: 32 bits live, 8 bits under replay (the replay feed drops the
//!   last-incident field)
//! - Body: one 4-bit intensity code per station, in station-list order
//! - Incident block: last 600 bits of the buffer, Alert/Info only
//! - Epicenter text: last 60 bytes of the buffer, Alert/Info only

use tracing::debug;

use crate::bits::BitCursor;
use crate::types::*;

/// Bits per station intensity code.
pub const INTENSITY_BITS: usize = 4;

/// Size of the incident block at the tail of the body.
pub const INCIDENT_BLOCK_BITS: usize = 600;

/// Size of the epicenter text trailer, in bytes.
pub const EPICENTER_BYTES: usize = 60;

/// Width of an incident id field.
const INCIDENT_ID_BITS: usize = 26;

/// Width of the region flag field; all ones means "no region data".
const REGION_FLAG_BITS: usize = REGION_TABLE.len();

/// UTC -> KST, in seconds.
const KST_OFFSET_SECS: u64 = 32400;

// ---------------------------------------------------------------------------
// Header layout
// ---------------------------------------------------------------------------

/// Which header the provider sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// 32-bit header with the last incident id.
    Live,
    /// 8-bit header used by the replay feed.
    Replay,
}

impl HeaderLayout {
    /// Pick the layout for whether a replay session is active.
    pub fn for_replay(active: bool) -> Self {
        if active {
            HeaderLayout::Replay
        } else {
            HeaderLayout::Live
        }
    }

    pub fn bits(self) -> usize {
        match self {
            HeaderLayout::Live => 32,
            HeaderLayout::Replay => 8,
        }
    }
}

/// Decoded header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub station_update_needed: bool,
    pub status: StatusCode,
    pub last_incident_id: Option<String>,
}

/// Decode the header at the start of `cursor`'s buffer.
///
/// Bit 0 is the station-update flag, bits 1-2 the status code, bits 3-5 are
/// unused, bits 6-31 (live only) the last incident id.
pub fn decode_header(cursor: &BitCursor<'_>, layout: HeaderLayout) -> Result<Header> {
    let header_bits = layout.bits();
    if cursor.bit_len() < header_bits {
        return Err(PewsError::InsufficientData {
            offset: 0,
            width: header_bits,
            available: cursor.bit_len(),
        });
    }

    let station_update_needed = cursor.read_uint(0, 1)? == 1;
    let status = StatusCode::from_bits(cursor.read_uint(1, 2)?);
    let last_incident_id = match layout {
        HeaderLayout::Live => Some(incident_id_text(cursor.read_uint(6, INCIDENT_ID_BITS)?)),
        HeaderLayout::Replay => None,
    };

    Ok(Header {
        station_update_needed,
        status,
        last_incident_id,
    })
}

/// Decode `station_count` intensity codes starting at bit `offset`.
pub fn decode_intensities(
    cursor: &BitCursor<'_>,
    offset: usize,
    station_count: usize,
) -> Result<Vec<u8>> {
    let needed = station_count
        .checked_mul(INTENSITY_BITS)
        .and_then(|n| n.checked_add(offset));
    match needed {
        Some(end) if end <= cursor.bit_len() => {}
        _ => {
            return Err(PewsError::InsufficientData {
                offset,
                width: station_count.saturating_mul(INTENSITY_BITS),
                available: cursor.bit_len(),
            })
        }
    }

    (0..station_count)
        .map(|i| {
            cursor
                .read_uint(offset + i * INTENSITY_BITS, INTENSITY_BITS)
                .map(intensity_class)
        })
        .collect()
}

/// Decode the incident block from the final 600 bits of the body.
///
/// `body_offset` is where the body starts (the header length).
pub fn decode_incident(cursor: &BitCursor<'_>, body_offset: usize) -> Result<IncidentInfo> {
    let body_bits = cursor.bit_len().saturating_sub(body_offset);
    if body_bits < INCIDENT_BLOCK_BITS {
        return Err(PewsError::InsufficientData {
            offset: body_offset,
            width: INCIDENT_BLOCK_BITS,
            available: cursor.bit_len(),
        });
    }

    let mut block = *cursor;
    block.seek(cursor.bit_len() - INCIDENT_BLOCK_BITS)?;

    let latitude = LATITUDE_BASE + block.read(COORDINATE_BITS)? as i32;
    let longitude = LONGITUDE_BASE + block.read(COORDINATE_BITS)? as i32;
    let magnitude = block.read(7)? as u16;
    let depth = block.read(9)? as u16;
    let occurred_at = occurred_at_text(block.read(33)?);
    let incident_id = incident_id_text(block.read(INCIDENT_ID_BITS)?);
    let max_intensity_class = block.read(4)? as u8;
    let affected_regions = decode_regions(block.read(REGION_FLAG_BITS)?);
    let epicenter_description = epicenter_text(cursor.bytes())?;

    Ok(IncidentInfo {
        latitude,
        longitude,
        magnitude,
        depth,
        occurred_at,
        incident_id,
        max_intensity_class,
        affected_regions,
        epicenter_description,
    })
}

/// Decode a full status message.
///
/// `station_count` is the length of the station list the caller decoded
/// from the matching `.s` resource.
pub fn decode_station_data(
    data: &[u8],
    station_count: usize,
    layout: HeaderLayout,
) -> Result<EarthquakeMessage> {
    let cursor = BitCursor::new(data);
    let header = decode_header(&cursor, layout)?;
    let body_offset = layout.bits();
    let intensities = decode_intensities(&cursor, body_offset, station_count)?;

    let incident_info = if header.status.has_incident_block() {
        Some(decode_incident(&cursor, body_offset)?)
    } else {
        None
    };

    debug!(
        status = %header.status,
        stations = intensities.len(),
        update_needed = header.station_update_needed,
        incident = incident_info.is_some(),
        "decoded station data"
    );

    Ok(EarthquakeMessage {
        station_update_needed: header.station_update_needed,
        status: header.status,
        last_incident_id: header.last_incident_id,
        intensities,
        incident_info,
    })
}

/// Region flags, MSB = Seoul. All 17 bits set is the "unavailable" sentinel.
pub fn decode_regions(flags: u64) -> Vec<Region> {
    let all = (1u64 << REGION_FLAG_BITS) - 1;
    if flags & all == all {
        return Vec::new();
    }
    REGION_TABLE
        .iter()
        .enumerate()
        .filter(|(i, _)| (flags >> (REGION_FLAG_BITS - 1 - i)) & 1 == 1)
        .map(|(_, region)| *region)
        .collect()
}

/// Epoch seconds (UTC) -> KST millisecond epoch text.
///
/// The provider's millisecond value is the second count with "000" appended.
fn occurred_at_text(raw_secs: u64) -> String {
    format!("{}000", raw_secs + KST_OFFSET_SECS)
}

/// Last 60 bytes of the buffer, NUL and space trimmed from both ends.
fn epicenter_text(data: &[u8]) -> Result<String> {
    let start = data
        .len()
        .checked_sub(EPICENTER_BYTES)
        .ok_or(PewsError::InsufficientData {
            offset: 0,
            width: EPICENTER_BYTES * 8,
            available: data.len() * 8,
        })?;
    let tail = &data[start..];
    let is_pad = |b: &u8| *b == 0 || *b == b' ';
    let first = tail.iter().position(|b| !is_pad(b));
    let last = tail.iter().rposition(|b| !is_pad(b));
    let text = match (first, last) {
        (Some(first), Some(last)) => String::from_utf8_lossy(&tail[first..=last]).into_owned(),
        _ => String::new(),
    };
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
