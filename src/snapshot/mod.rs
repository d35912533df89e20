//! Image snapshot lifecycle and catalog reconciliation.
//!
//! [`SnapshotOrchestrator`] drives CREATE and DELETE tasks against the
//! provider and merges the eventually-consistent image listing with the image
//! implied by the subscription's current task.

mod artifact;
mod catalog;
mod identity;
mod lifecycle;
mod store;
mod task;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::ec2::{Ec2Client, Ec2Error, ParameterSource, SubscriptionParameters};
use crate::gateway::Gateway;

pub use artifact::{Artifact, VolumeSnapshot};
pub use identity::{Identity, IdentityDirectory};
pub use store::{MemoryTaskStore, StoreEvent};
pub use task::{
    Failure, Phase, STATUS_PREFIX, SnapshotOperation, SnapshotTask, Step, StoreEffect, TaskStore,
    WORKLOAD, apply,
};

/// Default prefix of the tags written on created images.
pub const DEFAULT_TAG_PREFIX: &str = "vmsnap:";
/// Default first segment of created image names.
pub const DEFAULT_NAME_PREFIX: &str = "vmsnap-snapshot";
/// Description written on created images.
pub const IMAGE_DESCRIPTION: &str = "Snapshot created from vmsnap";

/// Errors raised by the orchestrator.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SnapshotError {
    /// Wrapper for provider client failures.
    #[error(transparent)]
    Provider(#[from] Ec2Error),
    /// Raised when a task is handed to the wrong lifecycle.
    #[error("task of subscription {subscription} is a {found:?} task, expected {expected:?}")]
    WrongOperation {
        /// Subscription owning the task.
        subscription: u32,
        /// Lifecycle that was invoked.
        expected: SnapshotOperation,
        /// Lifecycle recorded on the task.
        found: SnapshotOperation,
    },
}

/// Naming of created images and their tags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotSettings {
    /// Prefix of the subscription and audit tag keys.
    pub tag_prefix: String,
    /// First segment of image names.
    pub name_prefix: String,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            tag_prefix: DEFAULT_TAG_PREFIX.to_owned(),
            name_prefix: DEFAULT_NAME_PREFIX.to_owned(),
        }
    }
}

impl SnapshotSettings {
    fn subscription_tag(&self) -> String {
        format!("{}subscription", self.tag_prefix)
    }

    fn audit_tag(&self) -> String {
        format!("{}audit", self.tag_prefix)
    }
}

/// Runs snapshot lifecycles for subscriptions.
pub struct SnapshotOrchestrator<G, T, I, P> {
    client: Ec2Client<G>,
    tasks: T,
    identities: I,
    parameters: P,
    settings: SnapshotSettings,
}

impl<G, T, I, P> SnapshotOrchestrator<G, T, I, P>
where
    G: Gateway,
    T: TaskStore,
    I: IdentityDirectory,
    P: ParameterSource,
{
    /// Creates an orchestrator with default naming.
    pub fn new(client: Ec2Client<G>, tasks: T, identities: I, parameters: P) -> Self {
        Self {
            client,
            tasks,
            identities,
            parameters,
            settings: SnapshotSettings::default(),
        }
    }

    /// Replaces the naming settings.
    #[must_use]
    pub fn with_settings(mut self, settings: SnapshotSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The provider client.
    pub const fn client(&self) -> &Ec2Client<G> {
        &self.client
    }

    /// The task store.
    pub const fn tasks(&self) -> &T {
        &self.tasks
    }

    fn parameters_for(&self, subscription: u32) -> Result<SubscriptionParameters, Ec2Error> {
        self.parameters
            .parameters(subscription)
            .ok_or(Ec2Error::UnknownSubscription { subscription })
    }

    fn transition(&self, task: &mut SnapshotTask, step: Step) {
        debug!(subscription = task.subscription, ?step, "snapshot step");
        match apply(task, step, Utc::now()) {
            StoreEffect::NextStep => self.tasks.next_step(task),
            StoreEffect::EndTask { failed } => self.tasks.end_task(task, failed),
        }
    }

    fn expect_operation(
        task: &SnapshotTask,
        expected: SnapshotOperation,
    ) -> Result<(), SnapshotError> {
        if task.operation == expected {
            return Ok(());
        }
        Err(SnapshotError::WrongOperation {
            subscription: task.subscription,
            expected,
            found: task.operation,
        })
    }
}
