//! Image artifacts as presented to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::identity::Identity;
use super::task::SnapshotOperation;

/// One volume snapshot attached to an image.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VolumeSnapshot {
    /// Snapshot identifier.
    pub id: String,
    /// Device name of the volume.
    pub name: Option<String>,
    /// Size in GiB.
    pub size: u32,
}

/// An image, either listed by the provider or implied by a task.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Image identifier; `None` before the image exists.
    pub id: Option<String>,
    /// Image name.
    pub name: Option<String>,
    /// Image description.
    pub description: Option<String>,
    /// Provider state or lifecycle status key.
    pub status_text: Option<String>,
    /// Whether the image can be used.
    pub available: bool,
    /// Whether the image is still being built.
    pub pending: bool,
    /// Creation date.
    pub date: DateTime<Utc>,
    /// Author from the audit tag.
    pub author: Option<Identity>,
    /// Volume snapshots.
    pub volumes: Vec<VolumeSnapshot>,
    /// Stop flag of the task the entry was derived from.
    pub stop_requested: Option<bool>,
    /// Operation of the task currently touching this image.
    pub operation: Option<SnapshotOperation>,
}

impl Artifact {
    /// Whether the name, identifier or one volume identifier contains
    /// `criteria`, ignoring case.
    #[must_use]
    pub fn matches(&self, criteria: &str) -> bool {
        let needle = criteria.to_lowercase();
        let contains = |value: &str| value.to_lowercase().contains(&needle);
        contains(self.name.as_deref().unwrap_or_default())
            || self.id.as_deref().is_some_and(contains)
            || self.volumes.iter().any(|volume| contains(&volume.id))
    }

    /// Marks the entry as pending with `status_text`.
    pub(crate) fn set_pending(&mut self, status_text: Option<String>) {
        self.pending = true;
        self.available = false;
        self.status_text = status_text;
    }
}
