//! Snapshot tasks and their explicit transitions.
//!
//! A task records one CREATE or DELETE lifecycle. The orchestrator never
//! mutates it ad hoc: every change is a [`Step`] applied by [`apply`], which
//! returns the [`StoreEffect`] the task store must perform next.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prefix of every status key written to a task.
pub const STATUS_PREFIX: &str = "vm:aws";

/// Number of steps of both lifecycles.
pub const WORKLOAD: u32 = 3;

/// Lifecycle a task runs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SnapshotOperation {
    /// Create and tag a new image.
    Create,
    /// Deregister an image and delete its volume snapshots.
    Delete,
}

/// Phase label of a task.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Requesting the image.
    CreatingAmi,
    /// Tagging the new image.
    TaggingAmi,
    /// Waiting for the image to show up in listings.
    CheckingAvailability,
    /// Looking up the image to delete.
    SearchingAmi,
    /// Deregistering the image.
    DeregisteringAmi,
    /// Deleting the image's volume snapshots.
    DeletingSnapshots,
}

impl Phase {
    /// The label stored with the task.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatingAmi => "creating-ami",
            Self::TaggingAmi => "tagging-ami",
            Self::CheckingAvailability => "checking-availability",
            Self::SearchingAmi => "searching-ami",
            Self::DeregisteringAmi => "deregistering-ami",
            Self::DeletingSnapshots => "deleting-snapshots",
        }
    }
}

/// Failure outcome of a lifecycle step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Failure {
    /// The image could not be requested.
    CreateFailed,
    /// The new image could not be tagged.
    TagFailed,
    /// The image to delete does not exist.
    NotFound,
    /// The image could not be deregistered.
    UnregisteringFailed,
    /// The volume snapshots could not be deleted.
    DeletingSnapshotsFailed,
}

impl Failure {
    /// Status key without the plugin prefix.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::CreateFailed => "ami-create-failed",
            Self::TagFailed => "ami-tag-failed",
            Self::NotFound => "ami-not-found",
            Self::UnregisteringFailed => "ami-unregistering-failed",
            Self::DeletingSnapshotsFailed => "ami-deleting-snapshots-failed",
        }
    }

    /// Status text stored with the task, for example
    /// `vm:aws:ami-create-failed`.
    #[must_use]
    pub fn status_text(self) -> String {
        format!("{STATUS_PREFIX}:{}", self.key())
    }
}

/// State of one snapshot lifecycle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTask {
    /// Subscription owning the task.
    pub subscription: u32,
    /// Lifecycle being run.
    pub operation: SnapshotOperation,
    /// Login of the user who requested the task.
    pub author: String,
    /// When the task started; also names the image.
    pub start: DateTime<Utc>,
    /// When the task finished locally.
    pub end: Option<DateTime<Utc>>,
    /// Whether the instance is stopped before imaging.
    pub stop: bool,
    /// Remote image identifier, once known.
    pub image_id: Option<String>,
    /// Current phase.
    pub phase: Option<Phase>,
    /// Completed steps.
    pub done: u32,
    /// Total steps.
    pub workload: u32,
    /// Whether the task ended in failure.
    pub failed: bool,
    /// Whether the remote side reflects the final outcome.
    pub finished_remote: bool,
    /// Last status key.
    pub status_text: Option<String>,
}

impl SnapshotTask {
    /// Creates a task that has not started any step.
    #[must_use]
    pub fn new(
        subscription: u32,
        operation: SnapshotOperation,
        author: impl Into<String>,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            subscription,
            operation,
            author: author.into(),
            start,
            end: None,
            stop: false,
            image_id: None,
            phase: None,
            done: 0,
            workload: 0,
            failed: false,
            finished_remote: false,
            status_text: None,
        }
    }

    /// Sets the stop-before-imaging flag.
    #[must_use]
    pub const fn with_stop(mut self, stop: bool) -> Self {
        self.stop = stop;
        self
    }

    /// Sets the remote image identifier.
    #[must_use]
    pub fn with_image_id(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    /// Whether the task has ended locally.
    #[must_use]
    pub const fn finished_locally(&self) -> bool {
        self.end.is_some()
    }

    /// Marks the image as visible remotely.
    pub(crate) const fn set_finished_remote(&mut self) {
        self.finished_remote = true;
        self.done = WORKLOAD;
        self.phase = Some(Phase::CheckingAvailability);
    }
}

/// A transition of a task.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Enters the first phase of a lifecycle.
    Begin(Phase),
    /// Enters a later phase, optionally recording the image identifier.
    Advance {
        /// New phase.
        phase: Phase,
        /// Completed steps.
        done: u32,
        /// Image identifier learnt by the previous step.
        image_id: Option<String>,
    },
    /// Ends the task in failure; the remote side will not change further.
    Fail(Failure),
    /// Ends a CREATE task; visibility is checked later.
    CreateSucceeded,
    /// Ends a DELETE task.
    DeleteSucceeded,
}

/// What the task store must do after a step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreEffect {
    /// Persist progress.
    NextStep,
    /// Persist the final state.
    EndTask {
        /// Whether the task failed.
        failed: bool,
    },
}

/// Applies `step` to `task` at `now`.
pub fn apply(task: &mut SnapshotTask, step: Step, now: DateTime<Utc>) -> StoreEffect {
    match step {
        Step::Begin(phase) => {
            task.phase = Some(phase);
            task.workload = WORKLOAD;
            StoreEffect::NextStep
        }
        Step::Advance {
            phase,
            done,
            image_id,
        } => {
            task.phase = Some(phase);
            task.done = done;
            if image_id.is_some() {
                task.image_id = image_id;
            }
            StoreEffect::NextStep
        }
        Step::Fail(failure) => {
            task.status_text = Some(failure.status_text());
            task.finished_remote = true;
            end(task, true, now)
        }
        Step::CreateSucceeded => {
            task.done = 2;
            task.phase = Some(Phase::CheckingAvailability);
            end(task, false, now)
        }
        Step::DeleteSucceeded => {
            task.done = WORKLOAD;
            task.finished_remote = true;
            task.status_text = None;
            end(task, false, now)
        }
    }
}

const fn end(task: &mut SnapshotTask, failed: bool, now: DateTime<Utc>) -> StoreEffect {
    task.failed = failed;
    task.end = Some(now);
    StoreEffect::EndTask { failed }
}

/// Persistence of snapshot tasks, owned by the host application.
///
/// The store guarantees at most one lifecycle in flight per subscription.
pub trait TaskStore: Send + Sync {
    /// Returns the current task of `subscription`.
    fn get_task(&self, subscription: u32) -> Option<SnapshotTask>;

    /// Persists progress of `task`.
    fn next_step(&self, task: &SnapshotTask);

    /// Persists the final state of `task`.
    fn end_task(&self, task: &SnapshotTask, failed: bool);
}
