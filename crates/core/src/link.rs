//! Download links handed to devices.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A time-limited download link for one artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub uri: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expire: OffsetDateTime,
}

impl Link {
    pub fn new(uri: impl Into<String>, expire: OffsetDateTime) -> Self {
        Self {
            uri: uri.into(),
            expire,
        }
    }
}
