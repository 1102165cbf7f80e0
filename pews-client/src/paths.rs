//! Resource paths for the time-keyed feed.
//!
//! Live resources sit at `<key>.<ext>`; replay resources are grouped under
//! the incident id: `<incident>/<key>.<ext>`. Paths are relative to the
//! configured base URL.

use pews_core::clock::{ReplaySession, TimeKey};

/// The two resources the feed publishes per time key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Station coordinate list.
    StationList,
    /// Status and intensity message.
    StationData,
}

impl Resource {
    pub fn extension(self) -> &'static str {
        match self {
            Resource::StationList => "s",
            Resource::StationData => "b",
        }
    }
}

/// Path of `resource` for a key and the session it was resolved under.
pub fn resource_path(resource: Resource, key: &str, session: Option<&ReplaySession>) -> String {
    match session {
        Some(s) => format!("{}/{key}.{}", s.incident_id, resource.extension()),
        None => format!("{key}.{}", resource.extension()),
    }
}

/// Path of `resource` for a resolved time key.
pub fn path_for(resource: Resource, key: &TimeKey) -> String {
    resource_path(resource, &key.key, key.session.as_ref())
}

/// Join a base URL and a relative resource path.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
