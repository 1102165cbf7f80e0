//! Configuration file management for pews.
//!
//! Reads/writes `~/.pews/config.yaml` with the feed location, polling
//! cadence, and an optional default replay session.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;

use crate::clock::{format_time_key, parse_time_key, ReplayRequest};
use crate::types::{PewsError, Result};

/// Provider endpoint serving `.s`/`.b` resources.
pub const DEFAULT_BASE_URL: &str = "https://www.weather.go.kr/pews/data";

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub feed: FeedConfig,
    pub replay: Option<ReplayConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

/// Replay defaults for `pews replay` without arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    pub incident_id: u64,
    /// Time key the replay starts from.
    pub start: String,
    pub duration_secs: i64,
}

impl ReplayConfig {
    pub fn to_request(&self) -> Result<ReplayRequest> {
        Ok(ReplayRequest {
            incident_id: self.incident_id,
            virtual_start: parse_time_key(&self.start)?,
            duration: replay_duration(self.duration_secs)?,
        })
    }
}

/// Replay length from a second count. Negative or out-of-range counts are
/// config errors.
pub fn replay_duration(secs: i64) -> Result<TimeDelta> {
    if secs < 0 {
        return Err(PewsError::Config(format!(
            "replay duration must not be negative (got {secs}s)"
        )));
    }
    TimeDelta::try_seconds(secs)
        .ok_or_else(|| PewsError::Config(format!("replay duration {secs}s is out of range")))
}

impl From<&ReplayRequest> for ReplayConfig {
    fn from(req: &ReplayRequest) -> Self {
        ReplayConfig {
            incident_id: req.incident_id,
            start: format_time_key(req.virtual_start),
            duration_secs: req.duration.num_seconds(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            feed: FeedConfig {
                base_url: DEFAULT_BASE_URL.into(),
                poll_interval_ms: 1000,
                timeout_secs: 5,
            },
            replay: None,
        }
    }
}

/// Get the config directory path (`~/.pews/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".pews")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.pews/config.yaml`.
///
/// Returns default config if the file doesn't exist.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_file())
}

/// Load config from an explicit path. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| PewsError::Config(e.to_string()))?;
    }
    std::fs::write(path, serialize_config(config))
        .map_err(|e| PewsError::Config(e.to_string()))
}

/// Replay section fields as read; all three are needed for a session.
#[derive(Default)]
struct PartialReplay {
    incident_id: Option<u64>,
    start: Option<String>,
    duration_secs: Option<i64>,
}

/// Parse simple YAML-like config text.
pub fn parse_config(text: &str) -> Result<Config> {
    let mut config = Config::default();
    let mut replay = PartialReplay::default();
    let mut current_section: Option<String> = None;

    for (lineno, line) in text.lines().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }

        let Some(section) = current_section.as_deref() else {
            continue;
        };
        match (section, key) {
            ("feed", "base_url") => {
                if let Some(v) = parse_string_value(val) {
                    config.feed.base_url = v;
                }
            }
            ("feed", "poll_interval_ms") => {
                config.feed.poll_interval_ms = parse_number(val, key, lineno)?;
                if config.feed.poll_interval_ms == 0 {
                    return Err(PewsError::Config(format!(
                        "line {}: poll_interval_ms must be at least 1",
                        lineno + 1
                    )));
                }
            }
            ("feed", "timeout_secs") => {
                config.feed.timeout_secs = parse_number(val, key, lineno)?;
            }
            ("replay", "incident_id") => {
                replay.incident_id = parse_optional_number(val, key, lineno)?;
            }
            ("replay", "start") => {
                replay.start = parse_string_value(val);
            }
            ("replay", "duration_secs") => {
                replay.duration_secs = parse_optional_number(val, key, lineno)?;
            }
            _ => {}
        }
    }

    if let (Some(incident_id), Some(start), Some(duration_secs)) =
        (replay.incident_id, replay.start, replay.duration_secs)
    {
        parse_time_key(&start)
            .map_err(|e| PewsError::Config(format!("replay.start: {e}")))?;
        replay_duration(duration_secs)?;
        config.replay = Some(ReplayConfig {
            incident_id,
            start,
            duration_secs,
        });
    }

    Ok(config)
}

fn is_null(val: &str) -> bool {
    val == "null" || val == "~" || val.is_empty()
}

fn parse_string_value(val: &str) -> Option<String> {
    if is_null(val) {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_number<T: std::str::FromStr>(val: &str, key: &str, lineno: usize) -> Result<T> {
    parse_string_value(val)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| PewsError::Config(format!("line {}: {key} must be a number", lineno + 1)))
}

fn parse_optional_number<T: std::str::FromStr>(
    val: &str,
    key: &str,
    lineno: usize,
) -> Result<Option<T>> {
    if is_null(val) {
        return Ok(None);
    }
    parse_number(val, key, lineno).map(Some)
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# pews configuration".to_string(), String::new()];

    lines.push("feed:".into());
    lines.push(format!("  base_url: \"{}\"", config.feed.base_url));
    lines.push(format!("  poll_interval_ms: {}", config.feed.poll_interval_ms));
    lines.push(format!("  timeout_secs: {}", config.feed.timeout_secs));
    lines.push(String::new());

    match &config.replay {
        Some(r) => {
            lines.push("replay:".into());
            lines.push(format!("  incident_id: {}", r.incident_id));
            lines.push(format!("  start: \"{}\"", r.start));
            lines.push(format!("  duration_secs: {}", r.duration_secs));
        }
        None => {
            lines.push("# replay:".into());
            lines.push("#   incident_id: 2021007178".into());
            lines.push("#   start: \"20211214081914\"".into());
            lines.push("#   duration_secs: 420".into());
        }
    }

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.feed.poll_interval_ms, 1000);
        assert!(config.replay.is_none());
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
feed:
  base_url: "http://localhost:9000/pews"
  poll_interval_ms: 500
  timeout_secs: 2

replay:
  incident_id: 2021007178
  start: "20211214081914"
  duration_secs: 420
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.feed.base_url, "http://localhost:9000/pews");
        assert_eq!(config.feed.poll_interval_ms, 500);
        assert_eq!(config.feed.timeout_secs, 2);

        let replay = config.replay.unwrap();
        assert_eq!(replay.incident_id, 2021007178);
        let req = replay.to_request().unwrap();
        assert_eq!(req.virtual_start.timestamp(), 1639469954);
        assert_eq!(req.duration, TimeDelta::minutes(7));
    }

    #[test]
    fn test_partial_replay_section_ignored() {
        let text = "replay:\n  incident_id: 2021007178\n  start: ~\n";
        let config = parse_config(text).unwrap();
        assert!(config.replay.is_none());
    }

    #[test]
    fn test_bad_number_is_error() {
        let text = "feed:\n  poll_interval_ms: soon\n";
        let err = parse_config(text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "config error: line 2: poll_interval_ms must be a number"
        );
    }

    #[test]
    fn test_bad_replay_start_is_error() {
        let text = "replay:\n  incident_id: 1\n  start: \"yesterday\"\n  duration_secs: 5\n";
        assert!(matches!(parse_config(text), Err(PewsError::Config(_))));
    }

    #[test]
    fn test_zero_poll_interval_is_error() {
        let err = parse_config("feed:\n  poll_interval_ms: 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "config error: line 2: poll_interval_ms must be at least 1"
        );
    }

    #[test]
    fn test_replay_duration_bounds() {
        assert_eq!(replay_duration(420).unwrap(), TimeDelta::minutes(7));
        assert_eq!(replay_duration(0).unwrap(), TimeDelta::zero());
        assert!(matches!(replay_duration(-1), Err(PewsError::Config(_))));
        assert!(matches!(replay_duration(i64::MAX), Err(PewsError::Config(_))));
    }

    #[test]
    fn test_huge_replay_duration_is_error() {
        let text = "replay:\n  incident_id: 1\n  start: \"20211214081914\"\n  duration_secs: 9223372036854775807\n";
        assert!(matches!(parse_config(text), Err(PewsError::Config(_))));

        let replay = ReplayConfig {
            incident_id: 1,
            start: "20211214081914".into(),
            duration_secs: -5,
        };
        assert!(matches!(replay.to_request(), Err(PewsError::Config(_))));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let text = "dashboard:\n  port: 8080\nfeed:\n  colour: blue\n  timeout_secs: 9\n";
        let config = parse_config(text).unwrap();
        assert_eq!(config.feed.timeout_secs, 9);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = Config {
            feed: FeedConfig {
                base_url: "http://example.com/data".into(),
                poll_interval_ms: 250,
                timeout_secs: 3,
            },
            replay: Some(ReplayConfig {
                incident_id: 2022000001,
                start: "20221029081227".into(),
                duration_secs: 60,
            }),
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_default_serialization_parses_back() {
        let text = serialize_config(&Config::default());
        assert!(text.contains("# replay:"));
        assert_eq!(parse_config(&text).unwrap(), Config::default());
    }

    #[test]
    fn test_replay_config_from_request() {
        let req = ReplayConfig {
            incident_id: 7,
            start: "20211214081914".into(),
            duration_secs: 30,
        }
        .to_request()
        .unwrap();
        let back = ReplayConfig::from(&req);
        assert_eq!(back.start, "20211214081914");
        assert_eq!(back.duration_secs, 30);
    }
}
