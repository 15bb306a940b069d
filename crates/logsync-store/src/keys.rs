//! Key layout of the `records` tree.
//!
//! `profile 0x00 group 0x00 time(8) seq(8)`, both integers big-endian. The
//! time is epoch milliseconds with the sign bit flipped so byte order matches
//! time order, which turns window filters into range scans.

use logsync::Window;

const SEP: u8 = 0;

/// Prefix shared by every record of one profile and group.
pub(crate) fn scope_prefix(profile: &str, group: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(profile.len() + group.len() + 2 + 16);
    key.extend_from_slice(profile.as_bytes());
    key.push(SEP);
    key.extend_from_slice(group.as_bytes());
    key.push(SEP);
    key
}

pub(crate) fn encode_time(millis: i64) -> [u8; 8] {
    ((millis as u64) ^ (1 << 63)).to_be_bytes()
}

/// Unique key for a record; `seq` disambiguates equal timestamps.
pub(crate) fn record_key(profile: &str, group: &str, millis: i64, seq: u64) -> Vec<u8> {
    let mut key = scope_prefix(profile, group);
    key.extend_from_slice(&encode_time(millis));
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Inclusive key bounds covering `window` inside one scope.
pub(crate) fn window_bounds(profile: &str, group: &str, window: &Window) -> (Vec<u8>, Vec<u8>) {
    (
        record_key(profile, group, window.start_millis(), 0),
        record_key(profile, group, window.end_millis(), u64::MAX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_encoding_preserves_order() {
        let times = [i64::MIN, -1_000, -1, 0, 1, 1_700_000_000_000, i64::MAX];
        for pair in times.windows(2) {
            assert!(encode_time(pair[0]) < encode_time(pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn scopes_do_not_overlap() {
        let app = scope_prefix("prod", "app");
        let app2 = record_key("prod", "app2", 0, 0);
        assert!(!app2.starts_with(&app));
    }

    #[test]
    fn equal_times_order_by_sequence() {
        assert!(record_key("p", "g", 5, 1) < record_key("p", "g", 5, 2));
        assert!(record_key("p", "g", 5, u64::MAX) < record_key("p", "g", 6, 0));
    }
}
