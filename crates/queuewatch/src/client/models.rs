use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-queue counters reported by `GET /jobs`.
///
/// Every field defaults to zero so a server that omits a counter (or adds
/// new ones) still decodes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueCountsDto {
    #[serde(default)]
    pub active: i64,
    #[serde(default)]
    pub completed: i64,
    #[serde(default)]
    pub failed: i64,
    #[serde(default)]
    pub delayed: i64,
    #[serde(default)]
    pub waiting: i64,
    #[serde(default)]
    pub paused: i64,
}

/// One entry of the vendor's queue map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusDto {
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub counts: QueueCountsDto,
}

/// The wire shape of `GET /jobs`: a map keyed by queue identifier.
///
/// Decoding into a map instead of one named field per known queue keeps the
/// client working when the server grows new queue types.
pub type QueueMapDto = BTreeMap<String, QueueStatusDto>;

/// Normalized per-queue status counts as of one poll cycle.
///
/// Ephemeral: produced fresh each cycle, never persisted verbatim. `name`
/// is the only identity a queue has across cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub name: String,
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub paused: i64,
    pub delayed: i64,
    pub is_paused: bool,
}

/// Flatten the vendor map into snapshots, ordered by queue name.
pub fn normalize(map: QueueMapDto) -> Vec<QueueSnapshot> {
    map.into_iter()
        .map(|(name, status)| QueueSnapshot {
            name,
            waiting: status.counts.waiting,
            active: status.counts.active,
            completed: status.counts.completed,
            failed: status.counts.failed,
            paused: status.counts.paused,
            delayed: status.counts.delayed,
            is_paused: status.is_paused,
        })
        .collect()
}
