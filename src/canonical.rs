//! Shared helpers for the canonical JSON forms.
//!
//! Everything that is hashed and signed in this crate goes through explicit
//! per-type "view" structs whose field declaration order is the canonical
//! field order; serde emits struct fields in declaration order, so
//! `serde_json::to_vec` of a view yields the exact canonical byte sequence.
//! The helpers here are the pieces those views share.

use crate::Error;

/// Timestamps in canonical forms are RFC 3339 in UTC, truncated to whole
/// seconds.  Sub-second precision would leak into the signed bytes, so it is
/// stripped at every ingestion point via [truncated_to_seconds].
pub fn format_datetime(datetime: time::OffsetDateTime) -> String {
    truncated_to_seconds(datetime)
        .format(&time::format_description::well_known::Rfc3339)
        .expect("programmer error: whole-second UTC datetime is always RFC 3339 formattable")
}

pub fn parse_datetime(s: &str) -> Result<time::OffsetDateTime, Error> {
    let datetime = time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
        .map_err(|_| Error::IllegalArgument("invalid RFC 3339 datetime".into()))?;
    Ok(truncated_to_seconds(datetime.to_offset(time::UtcOffset::UTC)))
}

pub fn truncated_to_seconds(datetime: time::OffsetDateTime) -> time::OffsetDateTime {
    datetime
        .to_offset(time::UtcOffset::UTC)
        .replace_nanosecond(0)
        .expect("programmer error: 0 is a valid nanosecond")
}

/// The current time, truncated for use in canonical forms.
pub fn now_utc_seconds() -> time::OffsetDateTime {
    truncated_to_seconds(time::OffsetDateTime::now_utc())
}

/// Canonical rendering for fields that collapse to a bare element when
/// singular (controller, proof): one element serializes as the element
/// itself, several as an array.
#[derive(serde::Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn from_vec(mut v: Vec<T>) -> Option<Self> {
        match v.len() {
            0 => None,
            1 => Some(OneOrMany::One(v.remove(0))),
            _ => Some(OneOrMany::Many(v)),
        }
    }
}

/// Deserialization counterpart of [OneOrMany]: accepts either shape and
/// always yields a Vec.
#[derive(serde::Deserialize)]
#[serde(untagged)]
pub enum OneOrManyRaw<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrManyRaw<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrManyRaw::One(value) => vec![value],
            OneOrManyRaw::Many(v) => v,
        }
    }
}
