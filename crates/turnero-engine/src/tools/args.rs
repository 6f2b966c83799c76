use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use thiserror::Error;
use turnero_persist::PersistError;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M";

/// Why a tool call could not be carried out. Rendered into the tool output.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("unknown function {0}")]
    UnknownFunction(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("{0} is in the past")]
    InPast(String),

    #[error("{start}-{end} is outside opening hours ({opens}-{closes})")]
    OutsideHours {
        start: String,
        end: String,
        opens: String,
        closes: String,
    },

    #[error("the slot {date} {start} overlaps event {code}")]
    Overlap {
        date: NaiveDate,
        start: String,
        code: String,
    },

    #[error("the slot {date} {start} was just booked by someone else")]
    SlotTaken { date: NaiveDate, start: String },

    #[error("no event with code {0}")]
    EventNotFound(String),

    #[error("could not allocate an event code")]
    CodeExhausted,

    #[error("storage failure: {0}")]
    Storage(#[from] PersistError),
}

impl ToolError {
    /// Output string submitted for a failed call
    pub fn to_output(&self) -> String {
        format!("error: {}", self)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct InsertEventArgs {
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GetEventsArgs {
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateEventArgs {
    pub code_event: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteEventArgs {
    pub code_event: String,
}

/// Parse a JSON argument object. An empty string counts as `{}`.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, ToolError> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ToolError::InvalidDate(raw.to_string()))
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, ToolError> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .map_err(|_| ToolError::InvalidTime(raw.to_string()))
}
