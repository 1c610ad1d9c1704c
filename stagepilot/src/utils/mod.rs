//! Timestamp helpers shared by events and jobs.

pub mod timestamps;

pub use timestamps::{format_iso8601, iso_timestamp, millis_since, now_utc, Timestamp};
