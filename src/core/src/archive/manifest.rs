//! The correlated-traffic metadata document and archive naming.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use super::builder::ArchiveEntry;
use crate::data_capture::correlator::{Correlated, EventCorrelator};
use crate::error_handling::types::ArchiveError;

pub const PACKETS_MANIFEST_PATH: &str = "packets/requests.json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PacketsManifest<'a> {
    created_at: DateTime<Utc>,
    items: Vec<Correlated<'a>>,
}

/// Snapshot of every correlated request as a pretty-printed JSON entry,
/// independent of which bodies were archived.
pub fn packets_manifest(
    correlator: &EventCorrelator,
    created_at: DateTime<Utc>,
) -> Result<ArchiveEntry, ArchiveError> {
    let manifest = PacketsManifest {
        created_at,
        items: correlator.correlated().collect(),
    };
    let bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| ArchiveError::Manifest(e.to_string()))?;
    Ok(ArchiveEntry::new(PACKETS_MANIFEST_PATH, bytes))
}

/// `{prefix}_YYYYMMDD_HHMMSS.zip` in the timezone of `at`.
pub fn archive_name<Tz>(prefix: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{}_{}.zip", prefix, at.format("%Y%m%d_%H%M%S"))
}
