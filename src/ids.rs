//! Local identities and timestamps
//!
//! Messages created on the client (user messages, synthetic error replies,
//! replies the server sent without an id) get a random positive `i64`.
//! Only uniqueness within one session matters.

use chrono::{SecondsFormat, Utc};
use rand::Rng as _;

/// Returns a fresh random message identity in `1..=i64::MAX`.
pub fn local_message_id() -> i64 {
    rand::rng().random_range(1..=i64::MAX)
}

/// Current time as an ISO-8601 / RFC 3339 string with second precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
