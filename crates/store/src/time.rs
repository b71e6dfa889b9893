//! Timestamp canonicalization.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC 3339 UTC, so lexicographic order equals time order.
pub(crate) fn encode(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_order_matches_time_order() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(encode(early) < encode(late));
        assert_eq!(decode(&encode(early)).unwrap(), early);
    }
}
