//! pews-core: Pure decode library for the earthquake early-warning feed.
//!
//! No async and no network, only bit layouts and time keys. This crate is the
//! shared core used by `pews-client`, which supplies the HTTP fetch
//! collaborator, polling loop and CLI.

pub mod bits;
pub mod clock;
pub mod config;
pub mod message;
pub mod station;
pub mod types;

// Re-export commonly used types at crate root
pub use bits::BitCursor;
pub use clock::{
    Clock, ManualClock, ReplayHandle, ReplayRequest, ReplaySession, SystemClock, TimeKey,
    TimeKeySource,
};
pub use message::{decode_station_data, HeaderLayout};
pub use station::decode_station_list;
pub use types::*;
