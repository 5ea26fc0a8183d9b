//! How callers receive replies.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Reply destination strategy used by the correlation transport.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReplyStrategy {
    /// Each call creates and deletes its own temporary destination.
    #[default]
    Temporary,
    /// Calls share one named destination and filter on correlation id.
    Shared,
}

/// Errors encountered while parsing a [`ReplyStrategy`] from text.
pub type ReplyStrategyParseError = strum::ParseError;
