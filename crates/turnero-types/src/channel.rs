use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Credentials and numbering convention of one business phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCredentials {
    /// Provider-side phone-number id, also the path segment of the send endpoint
    pub phone_number_id: String,
    /// Bearer token used to send on behalf of the business
    pub access_token: String,
    /// Position (0-based) of the digit removed from sender numbers before replying
    #[serde(default)]
    pub strip_digit_at: Option<usize>,
}

/// Per-business scheduling rules applied to calendar tool calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarPolicy {
    #[serde(with = "hhmm")]
    pub opens_at: NaiveTime,
    #[serde(with = "hhmm")]
    pub closes_at: NaiveTime,
    /// Length of an event when the assistant does not specify one
    pub slot_minutes: u32,
    /// Business-local offset from UTC
    pub utc_offset_minutes: i32,
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self {
            opens_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            closes_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            slot_minutes: 30,
            utc_offset_minutes: -180,
        }
    }
}

impl CalendarPolicy {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Wall-clock time at the business for a UTC instant
    pub fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.offset()).naive_local()
    }

    /// Whether `[start, end)` fits inside opening hours
    pub fn within_hours(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start >= self.opens_at && end <= self.closes_at && start < end
    }
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
