mod common;

use chrono::{DateTime, TimeDelta};
use common::BitWriter;
use pews_core::clock::parse_time_key;
use pews_core::message::{EPICENTER_BYTES, INCIDENT_BLOCK_BITS};
use pews_core::*;

const STATIONS: [(u64, u64); 3] = [(330, 626), (512, 100), (1023, 1023)];

fn station_list_blob() -> Vec<u8> {
    let mut w = BitWriter::new();
    for (lat, lon) in STATIONS {
        w.push(lat, 10).push(lon, 10);
    }
    // pad to a byte boundary, as the provider does
    w.zeros(4);
    w.finish()
}

/// Status message with the given 2-bit status, three station codes and an
/// incident block whose tail is overwritten by the epicenter text.
fn data_blob(layout: HeaderLayout, status_bits: u64, codes: [u64; 3], epicenter: &str) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.push(1, 1).push(status_bits, 2).zeros(3);
    if layout == HeaderLayout::Live {
        w.push(21_007_177, 26);
    } else {
        w.zeros(2);
    }
    for code in codes {
        w.push(code, 4);
    }
    w.zeros(36);

    let block_start = w.bit_len();
    w.push(268, 10) // 3268
        .push(626, 10) // 12626
        .push(49, 7)
        .push(17, 9)
        .push(1_639_470_000, 33)
        .push(21_007_178, 26)
        .push(5, 4)
        .push(0b00000000_00000000_1, 17);
    w.zeros(INCIDENT_BLOCK_BITS - (w.bit_len() - block_start));

    let mut data = w.finish();
    let start = data.len() - EPICENTER_BYTES;
    let mut trailer = vec![b' '; EPICENTER_BYTES];
    trailer[..epicenter.len()].copy_from_slice(epicenter.as_bytes());
    trailer[EPICENTER_BYTES - 1] = 0;
    data[start..].copy_from_slice(&trailer);
    data
}

#[test]
fn test_station_list_then_data() {
    let stations = decode_station_list(&station_list_blob()).unwrap();
    assert_eq!(stations.len(), 3);
    assert_eq!(
        stations[0],
        Station {
            latitude: 3330,
            longitude: 12626
        }
    );
    assert_eq!(
        stations[2],
        Station {
            latitude: 4023,
            longitude: 13023
        }
    );

    let data = data_blob(HeaderLayout::Live, 0b10, [0, 7, 11], "Jeju Seogwipo");
    let msg = decode_station_data(&data, stations.len(), HeaderLayout::Live).unwrap();

    assert!(msg.station_update_needed);
    assert_eq!(msg.status, StatusCode::Alert);
    assert_eq!(msg.last_incident_id.as_deref(), Some("2021007177"));
    assert_eq!(msg.intensities, vec![1, 7, 10]);
    assert_eq!(msg.intensities.len(), stations.len());

    let info = msg.incident_info.as_ref().unwrap();
    assert_eq!((info.latitude, info.longitude), (3268, 12626));
    assert_eq!(info.magnitude, 49);
    assert_eq!(info.depth, 17);
    assert_eq!(info.occurred_at, "1639502400000");
    assert_eq!(info.incident_id, "2021007178");
    assert_eq!(info.max_intensity_class, 5);
    assert_eq!(info.affected_regions, vec![Region::Jeju]);
    assert_eq!(info.epicenter_description, "Jeju Seogwipo");
}

#[test]
fn test_replay_layout_message() {
    let data = data_blob(HeaderLayout::Replay, 0b11, [2, 3, 4], "offshore");
    let msg = decode_station_data(&data, 3, HeaderLayout::Replay).unwrap();
    assert_eq!(msg.status, StatusCode::Info);
    assert_eq!(msg.last_incident_id, None);
    assert_eq!(msg.intensities, vec![2, 3, 4]);
    assert_eq!(msg.incident_info.unwrap().epicenter_description, "offshore");
}

#[test]
fn test_wrong_layout_misreads_but_does_not_panic() {
    // A replay blob read with the live header still decodes; the values are
    // just shifted. Callers must pick the layout from the same session
    // snapshot they used to build the path.
    let data = data_blob(HeaderLayout::Replay, 0b00, [2, 3, 4], "");
    let msg = decode_station_data(&data, 3, HeaderLayout::Live).unwrap();
    assert_eq!(msg.intensities.len(), 3);
}

#[test]
fn test_truncated_data_is_insufficient() {
    let data = data_blob(HeaderLayout::Live, 0b10, [1, 1, 1], "x");
    let err = decode_station_data(&data[..40], 3, HeaderLayout::Live).unwrap_err();
    assert!(err.is_insufficient_data());

    let err = decode_station_data(&data, 10_000, HeaderLayout::Live).unwrap_err();
    assert!(err.is_insufficient_data());
}

#[test]
fn test_message_serializes_with_provider_names() {
    let data = data_blob(HeaderLayout::Live, 0b10, [0, 7, 11], "Jeju");
    let msg = decode_station_data(&data, 3, HeaderLayout::Live).unwrap();
    let v = serde_json::to_value(&msg).unwrap();
    assert_eq!(v["status"], 2);
    assert_eq!(v["incidentInfo"]["incidentId"], "2021007178");
    assert_eq!(v["incidentInfo"]["maxIntensityClass"], 5);
    assert_eq!(v["incidentInfo"]["affectedRegions"][0], "Jeju");
    assert_eq!(v["incidentInfo"]["occurredAt"], "1639502400000");
}

#[test]
fn test_replay_walkthrough_keys() {
    // Walk a 7-minute replay of the 2021-12-14 Jeju event second by second.
    let clock = ManualClock::new(parse_time_key("20261017090000").unwrap());
    let keys = TimeKeySource::new(clock.clone(), ReplayHandle::new());
    let start = DateTime::from_timestamp(1639469954, 0).unwrap();
    keys.begin_replay(ReplayRequest {
        incident_id: 2021007178,
        virtual_start: start,
        duration: TimeDelta::minutes(7),
    });

    for e in 0..420 {
        let key = keys.resolve();
        let session = key.session.as_ref().expect("replay active");
        assert_eq!(session.incident_id, 2021007178);
        let expected = start + TimeDelta::seconds(e);
        assert_eq!(key.key, expected.format("%Y%m%d%H%M%S").to_string());
        assert_eq!(HeaderLayout::for_replay(key.is_replay()), HeaderLayout::Replay);
        clock.advance(TimeDelta::seconds(1));
    }

    let key = keys.resolve();
    assert!(!key.is_replay());
    assert_eq!(key.key, "20261017090659");
}
