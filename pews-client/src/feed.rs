//! Feed client: time key -> resource path -> fetch -> decode.
//!
//! Keeps the most recent station list, since every status message is
//! decoded against it. The list is reloaded when:
//! - none has been loaded yet
//! - the provider sets the station-update flag
//! - the client switches between the live feed and a replay incident
//!
//! Each cycle resolves the time key once. The same session snapshot picks
//! the resource paths and the header layout, so a replay session expiring
//! mid-cycle cannot mix replay paths with a live header.

use std::time::Duration;

use pews_core::clock::{Clock, ReplayRequest, ReplaySession, SystemClock, TimeKey, TimeKeySource};
use pews_core::{
    decode_station_data, decode_station_list, EarthquakeMessage, HeaderLayout, Result, Station,
};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::fetch::Fetch;
use crate::paths::{path_for, Resource};

/// Which feed a station list was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListSource {
    Live,
    Replay(u64),
}

impl ListSource {
    fn of(key: &TimeKey) -> Self {
        match &key.session {
            Some(s) => ListSource::Replay(s.incident_id),
            None => ListSource::Live,
        }
    }
}

/// One completed poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub time_key: String,
    /// Incident being replayed, if this cycle ran under a replay session.
    pub replay_incident_id: Option<u64>,
    pub station_count: usize,
    pub stations_refreshed: bool,
    pub message: EarthquakeMessage,
}

impl Cycle {
    pub fn is_replay(&self) -> bool {
        self.replay_incident_id.is_some()
    }
}

/// Polls the feed through a `Fetch` collaborator.
pub struct FeedClient<F, C = SystemClock> {
    fetcher: F,
    keys: TimeKeySource<C>,
    stations: Vec<Station>,
    list_source: Option<ListSource>,
    stale: bool,
}

impl<F: Fetch> FeedClient<F, SystemClock> {
    /// Client on the system clock.
    pub fn system(fetcher: F) -> Self {
        FeedClient::new(fetcher, TimeKeySource::system())
    }
}

impl<F: Fetch, C: Clock> FeedClient<F, C> {
    pub fn new(fetcher: F, keys: TimeKeySource<C>) -> Self {
        FeedClient {
            fetcher,
            keys,
            stations: Vec::new(),
            list_source: None,
            stale: true,
        }
    }

    pub fn keys(&self) -> &TimeKeySource<C> {
        &self.keys
    }

    /// Station list the next message will be decoded against.
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn replay_active(&self) -> bool {
        self.keys.replay().is_active()
    }

    /// Start replaying an incident. The cached station list is dropped since
    /// replay resources are grouped per incident.
    pub fn begin_replay(&mut self, request: ReplayRequest) -> ReplaySession {
        self.stale = true;
        self.keys.begin_replay(request)
    }

    /// Fetch and decode the station list for the current key.
    pub async fn station_list(&self) -> Result<Vec<Station>> {
        self.fetch_stations(&self.keys.resolve()).await
    }

    /// Fetch and decode the status message for the current key.
    pub async fn station_data(&self, station_count: usize) -> Result<EarthquakeMessage> {
        self.fetch_data(&self.keys.resolve(), station_count).await
    }

    /// Reload the cached station list now. Returns the number of stations.
    pub async fn refresh_stations(&mut self) -> Result<usize> {
        let key = self.keys.resolve();
        self.load_stations(&key).await?;
        Ok(self.stations.len())
    }

    /// Run one poll: reload stations if needed, then fetch one message.
    pub async fn poll_once(&mut self) -> Result<Cycle> {
        let key = self.keys.resolve();
        let source = ListSource::of(&key);
        debug!(key = %key.key, replay = key.is_replay(), "poll cycle");

        let mut stations_refreshed = false;
        if self.stale || self.list_source != Some(source) {
            self.load_stations(&key).await?;
            stations_refreshed = true;
        }

        let message = self.fetch_data(&key, self.stations.len()).await?;
        let station_count = message.intensities.len();

        if message.station_update_needed {
            info!(key = %key.key, "provider flagged station list update");
            match self.load_stations(&key).await {
                Ok(()) => stations_refreshed = true,
                Err(e) => {
                    warn!(error = %e, "station list refresh failed, retrying next cycle");
                    self.stale = true;
                }
            }
        }

        Ok(Cycle {
            time_key: key.key.clone(),
            replay_incident_id: key.session.as_ref().map(|s| s.incident_id),
            station_count,
            stations_refreshed,
            message,
        })
    }

    async fn load_stations(&mut self, key: &TimeKey) -> Result<()> {
        let stations = self.fetch_stations(key).await?;
        info!(
            stations = stations.len(),
            replay = key.is_replay(),
            "station list loaded"
        );
        self.stations = stations;
        self.list_source = Some(ListSource::of(key));
        self.stale = false;
        Ok(())
    }

    async fn fetch_stations(&self, key: &TimeKey) -> Result<Vec<Station>> {
        let path = path_for(Resource::StationList, key);
        let bytes = self.fetcher.fetch(&path).await?;
        decode_station_list(&bytes)
    }

    async fn fetch_data(&self, key: &TimeKey, station_count: usize) -> Result<EarthquakeMessage> {
        let path = path_for(Resource::StationData, key);
        let bytes = self.fetcher.fetch(&path).await?;
        decode_station_data(
            &bytes,
            station_count,
            HeaderLayout::for_replay(key.is_replay()),
        )
    }
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

/// How long and how often to poll.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Stop after this many cycles (successful or not).
    pub max_cycles: Option<usize>,
    /// Stop at the first cycle that runs outside a replay session.
    pub until_replay_ends: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            interval: Duration::from_secs(1),
            max_cycles: None,
            until_replay_ends: false,
        }
    }
}

/// Shortest period the poll loop will tick at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll on a fixed interval, handing each completed cycle to `sink`.
///
/// Failed cycles are logged and skipped. A sink error (e.g. a closed stdout)
/// stops the loop. Returns the number of cycles run.
pub async fn poll_loop<F, C, S>(
    client: &mut FeedClient<F, C>,
    opts: &PollOptions,
    mut sink: S,
) -> usize
where
    F: Fetch,
    C: Clock,
    S: FnMut(&Cycle) -> std::io::Result<()>,
{
    let mut ticker = tokio::time::interval(opts.interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycles = 0usize;

    loop {
        ticker.tick().await;
        cycles += 1;

        match client.poll_once().await {
            Ok(cycle) if opts.until_replay_ends && !cycle.is_replay() => {
                info!("replay finished");
                break;
            }
            Ok(cycle) => {
                if let Err(e) = sink(&cycle) {
                    warn!(error = %e, "output closed");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "poll cycle failed");
                if opts.until_replay_ends && !client.replay_active() {
                    break;
                }
            }
        }

        if opts.max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }
    }

    cycles
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
