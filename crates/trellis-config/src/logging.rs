//! Log output settings shared by the controller binary and its tests.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Filter directive applied when neither the environment nor a file sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Output formats understood by the controller's log subscriber.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    #[default]
    Json,
    /// Single-line text for terminals.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Filter directive used by default.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned form of [`default_log_filter`] for serde and the config derive.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Log format used by default.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
