//! # Utilities Module
//!
//! Pure, dependency-light helpers shared by every other module. Nothing in
//! here performs I/O or holds state, so these functions are safe to call from
//! any thread and any render path.
//!
//! ## Contained Modules:
//!
//! - **`format`**: value + unit to display string, change and relative-time text.
//! - **`freshness`**: age of the last successful fetch to fresh/recent/stale.
//! - **`sparkline`**: trend direction and polyline projection of a series.
//! - **`time`**: lenient timestamp/date deserializers for upstream payloads.

/// Display formatting for indicator values.
pub mod format;
/// Freshness classification of fetched data.
pub mod freshness;
/// Trend and sparkline helpers over numeric series.
pub mod sparkline;
/// Lenient timestamp parsing for upstream JSON.
pub mod time;
