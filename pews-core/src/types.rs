//! Shared types, error enum, provider lookup tables and decoded message types
//! for pews-core.

use serde::Serialize;
use serde_repr::Serialize_repr;
use thiserror::Error;

/// All errors produced by pews-core.
#[derive(Debug, Error)]
pub enum PewsError {
    #[error("insufficient data: {width} bits at bit offset {offset}, buffer holds {available} bits")]
    InsufficientData {
        offset: usize,
        width: usize,
        available: usize,
    },
    #[error("invalid field width: {0} bits (max 64)")]
    InvalidWidth(usize),
    #[error("fetch failed for {path}: {reason}")]
    FetchFailure { path: String, reason: String },
    #[error("invalid time key: {0}")]
    InvalidTimeKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl PewsError {
    /// True for errors that signal a truncated or malformed feed resource.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, PewsError::InsufficientData { .. })
    }

    /// True for errors passed through from the fetch collaborator.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, PewsError::FetchFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, PewsError>;

// ---------------------------------------------------------------------------
// Coordinate scaling
// ---------------------------------------------------------------------------

/// Offset added to every raw 10-bit latitude field (hundredths of a degree).
pub const LATITUDE_BASE: i32 = 3000;

/// Offset added to every raw 10-bit longitude field (hundredths of a degree).
pub const LONGITUDE_BASE: i32 = 12000;

/// Width of a packed latitude or longitude field.
pub const COORDINATE_BITS: usize = 10;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Feed status. Numeric values are a contract with the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr)]
#[repr(u8)]
pub enum StatusCode {
    Normal = 1,
    Alert = 2,
    Info = 3,
    Test = 4,
}

/// Status lookup, indexed by the raw 2-bit header field.
///
/// Not sequential: `00` Normal, `01` Test, `10` Alert, `11` Info.
pub const STATUS_TABLE: [StatusCode; 4] = [
    StatusCode::Normal,
    StatusCode::Test,
    StatusCode::Alert,
    StatusCode::Info,
];

impl StatusCode {
    /// Map the raw 2-bit header field. Unknown patterns fall back to Normal.
    pub fn from_bits(code: u64) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|idx| STATUS_TABLE.get(idx))
            .copied()
            .unwrap_or(StatusCode::Normal)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Alert and Info messages carry the incident-detail block.
    pub fn has_incident_block(self) -> bool {
        matches!(self, StatusCode::Alert | StatusCode::Info)
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusCode::Normal => "normal",
            StatusCode::Alert => "alert",
            StatusCode::Info => "info",
            StatusCode::Test => "test",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.label(), self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// Intensity classes
// ---------------------------------------------------------------------------

/// Raw 4-bit station code -> displayed intensity class.
///
/// Only 15 entries for a 16-value field; code 15 clamps to the last entry.
pub const INTENSITY_TABLE: [u8; 15] = [1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 1, 1, 1];

/// Convert a raw 4-bit station code to its intensity class.
pub fn intensity_class(code: u64) -> u8 {
    let last = INTENSITY_TABLE.len() - 1;
    let idx = usize::try_from(code).map_or(last, |c| c.min(last));
    INTENSITY_TABLE[idx]
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

/// Administrative regions named by the 17-bit region flag field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Region {
    Seoul,
    Busan,
    Daegu,
    Incheon,
    Gwangju,
    Daejeon,
    Ulsan,
    Sejong,
    Gyeonggi,
    Gangwon,
    Chungbuk,
    Chungnam,
    Jeonbuk,
    Jeonnam,
    Gyeongbuk,
    Gyeongnam,
    Jeju,
}

/// Region order of the flag field, most significant bit first. Never reorder.
pub const REGION_TABLE: [Region; 17] = [
    Region::Seoul,
    Region::Busan,
    Region::Daegu,
    Region::Incheon,
    Region::Gwangju,
    Region::Daejeon,
    Region::Ulsan,
    Region::Sejong,
    Region::Gyeonggi,
    Region::Gangwon,
    Region::Chungbuk,
    Region::Chungnam,
    Region::Jeonbuk,
    Region::Jeonnam,
    Region::Gyeongbuk,
    Region::Gyeongnam,
    Region::Jeju,
];

impl Region {
    pub fn name(self) -> &'static str {
        match self {
            Region::Seoul => "Seoul",
            Region::Busan => "Busan",
            Region::Daegu => "Daegu",
            Region::Incheon => "Incheon",
            Region::Gwangju => "Gwangju",
            Region::Daejeon => "Daejeon",
            Region::Ulsan => "Ulsan",
            Region::Sejong => "Sejong",
            Region::Gyeonggi => "Gyeonggi",
            Region::Gangwon => "Gangwon",
            Region::Chungbuk => "Chungbuk",
            Region::Chungnam => "Chungnam",
            Region::Jeonbuk => "Jeonbuk",
            Region::Jeonnam => "Jeonnam",
            Region::Gyeongbuk => "Gyeongbuk",
            Region::Gyeongnam => "Gyeongnam",
            Region::Jeju => "Jeju",
        }
    }

    /// Korean short name, as shown by the provider.
    pub fn local_name(self) -> &'static str {
        match self {
            Region::Seoul => "서울",
            Region::Busan => "부산",
            Region::Daegu => "대구",
            Region::Incheon => "인천",
            Region::Gwangju => "광주",
            Region::Daejeon => "대전",
            Region::Ulsan => "울산",
            Region::Sejong => "세종",
            Region::Gyeonggi => "경기",
            Region::Gangwon => "강원",
            Region::Chungbuk => "충북",
            Region::Chungnam => "충남",
            Region::Jeonbuk => "전북",
            Region::Jeonnam => "전남",
            Region::Gyeongbuk => "경북",
            Region::Gyeongnam => "경남",
            Region::Jeju => "제주",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Incident identifiers
// ---------------------------------------------------------------------------

/// Provider prefix on every incident identifier (truncated year).
pub const INCIDENT_ID_PREFIX: &str = "20";

/// Render a raw incident id field as text: `"20"` followed by its digits.
pub fn incident_id_text(raw: u64) -> String {
    format!("{INCIDENT_ID_PREFIX}{raw}")
}

// ---------------------------------------------------------------------------
// Decoded message types
// ---------------------------------------------------------------------------

/// One monitoring station, in hundredths of a degree.
///
/// Position in the decoded list is the index used by per-station intensities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Station {
    pub latitude: i32,
    pub longitude: i32,
}

impl Station {
    /// Build from raw 10-bit fields.
    pub fn from_raw(raw_lat: u64, raw_lon: u64) -> Self {
        Station {
            latitude: LATITUDE_BASE + raw_lat as i32,
            longitude: LONGITUDE_BASE + raw_lon as i32,
        }
    }

    pub fn lat_deg(&self) -> f64 {
        self.latitude as f64 / 100.0
    }

    pub fn lon_deg(&self) -> f64 {
        self.longitude as f64 / 100.0
    }
}

/// Incident detail block, present for Alert and Info messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentInfo {
    pub latitude: i32,
    pub longitude: i32,
    /// Raw field, no scaling applied.
    pub magnitude: u16,
    /// Raw field, no scaling applied.
    pub depth: u16,
    /// Millisecond epoch text in KST.
    pub occurred_at: String,
    pub incident_id: String,
    pub max_intensity_class: u8,
    pub affected_regions: Vec<Region>,
    pub epicenter_description: String,
}

/// One decoded status/intensity message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarthquakeMessage {
    pub station_update_needed: bool,
    pub status: StatusCode,
    /// Absent under replay, whose header omits it.
    pub last_incident_id: Option<String>,
    pub intensities: Vec<u8>,
    pub incident_info: Option<IncidentInfo>,
}

impl EarthquakeMessage {
    /// Highest intensity class reported by any station.
    pub fn peak_intensity(&self) -> Option<u8> {
        self.intensities.iter().copied().max()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
