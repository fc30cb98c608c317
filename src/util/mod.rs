//! Utility functions.

pub mod time;

pub use time::{format_relative_time, format_span, parse_timestamp, parse_timestamp_str};
