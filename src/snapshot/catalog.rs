//! Catalog reconciliation between image listings and the current task.
//!
//! Listings filtered by tag lag behind `CreateImage`: a new image is found by
//! its identifier well before it shows up under the subscription tag. The
//! helpers here fill that gap from the task.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::ec2::xml::{self, ImageRecord};
use crate::ec2::{Ec2Error, ParameterSource, QueryAction, SubscriptionParameters};
use crate::gateway::Gateway;

use super::{
    Artifact, IdentityDirectory, SnapshotError, SnapshotOperation, SnapshotOrchestrator,
    SnapshotTask, TaskStore, VolumeSnapshot,
};

const NOT_CREATED: &str = "not-created";
const NOT_FOUND: &str = "not-found";
const NOT_FINISHED_REMOTE: &str = "not-finished-remote";

impl<G, T, I, P> SnapshotOrchestrator<G, T, I, P>
where
    G: Gateway,
    T: TaskStore,
    I: IdentityDirectory,
    P: ParameterSource,
{
    /// Lists the subscription's images matching `criteria`, newest first,
    /// using the store's current task.
    ///
    /// Task changes made while reconciling are not persisted.
    ///
    /// # Errors
    ///
    /// See [`SnapshotOrchestrator::find_all_matching`].
    pub async fn find_all_snapshots(
        &self,
        subscription: u32,
        criteria: &str,
    ) -> Result<Vec<Artifact>, SnapshotError> {
        let mut task = self.tasks.get_task(subscription);
        self.find_all_matching(subscription, criteria.trim(), task.as_mut())
            .await
    }

    /// Lists the subscription's images matching `criteria`, newest first,
    /// preceded by the image implied by `task` when it is not listed yet.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Provider`] when the subscription has no
    /// parameters or a listing is not XML.
    pub async fn find_all_matching(
        &self,
        subscription: u32,
        criteria: &str,
        task: Option<&mut SnapshotTask>,
    ) -> Result<Vec<Artifact>, SnapshotError> {
        let parameters = self.parameters_for(subscription)?;
        let mut artifacts = self
            .find_by_subscription(&parameters, subscription)
            .await?
            .into_iter()
            .filter(|artifact| artifact.matches(criteria))
            .collect::<Vec<_>>();
        artifacts.sort_by(|lhs, rhs| rhs.date.cmp(&lhs.date));

        if let Some(task) = task {
            if let Some(unlisted) = self
                .unlisted(&parameters, &artifacts, task)
                .await?
                .filter(|artifact| artifact.matches(criteria))
            {
                artifacts.insert(0, unlisted);
            }
            for artifact in &mut artifacts {
                if artifact.id == task.image_id {
                    artifact.operation = Some(task.operation);
                }
            }
        }
        Ok(artifacts)
    }

    /// Confirms remotely the outcome of a CREATE task that ended locally.
    ///
    /// Only acts on a CREATE task that has ended, carries an image identifier
    /// and is not yet confirmed; any other task is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Provider`] when the subscription has no
    /// parameters or a listing is not XML.
    pub async fn complete_status(&self, task: &mut SnapshotTask) -> Result<(), SnapshotError> {
        if task.operation != SnapshotOperation::Create
            || !task.finished_locally()
            || task.finished_remote
        {
            return Ok(());
        }
        let Some(image_id) = task.image_id.clone() else {
            return Ok(());
        };

        let parameters = self.parameters_for(task.subscription)?;
        if self.find_by_id(&parameters, &image_id).await?.is_none() {
            task.failed = true;
            task.end = Some(Utc::now());
            task.finished_remote = true;
            task.status_text = Some(NOT_FOUND.to_owned());
        } else if self
            .find_by_subscription(&parameters, task.subscription)
            .await?
            .iter()
            .any(|artifact| artifact.id.as_deref() == Some(image_id.as_str()))
        {
            task.set_finished_remote();
        } else {
            task.status_text = Some(NOT_FINISHED_REMOTE.to_owned());
        }
        Ok(())
    }

    async fn unlisted(
        &self,
        parameters: &SubscriptionParameters,
        listed: &[Artifact],
        task: &mut SnapshotTask,
    ) -> Result<Option<Artifact>, SnapshotError> {
        if task.failed {
            task.finished_remote = true;
            let mut artifact = self.task_artifact(task, None);
            artifact.pending = false;
            return Ok(Some(artifact));
        }
        let Some(image_id) = task.image_id.clone() else {
            return Ok(Some(self.task_artifact(task, Some(NOT_CREATED))));
        };
        if task.finished_remote {
            return Ok(None);
        }
        if listed
            .iter()
            .any(|artifact| artifact.id.as_deref() == Some(image_id.as_str()))
        {
            task.set_finished_remote();
            return Ok(None);
        }

        let artifact = match self.find_by_id(parameters, &image_id).await? {
            None => self.task_artifact(task, Some(NOT_FOUND)),
            Some(mut found) => {
                found.author = Some(self.identities.resolve(&task.author));
                found.set_pending(Some(NOT_FINISHED_REMOTE.to_owned()));
                found
            }
        };
        Ok(Some(artifact))
    }

    fn task_artifact(&self, task: &SnapshotTask, status_text: Option<&str>) -> Artifact {
        let mut artifact = Artifact {
            id: task.image_id.clone(),
            name: None,
            description: None,
            status_text: None,
            available: false,
            pending: false,
            date: task.start,
            author: Some(self.identities.resolve(&task.author)),
            volumes: Vec::new(),
            stop_requested: Some(task.stop),
            operation: None,
        };
        artifact.set_pending(
            status_text
                .map(str::to_owned)
                .or_else(|| task.status_text.clone()),
        );
        artifact
    }

    async fn find_by_subscription(
        &self,
        parameters: &SubscriptionParameters,
        subscription: u32,
    ) -> Result<Vec<Artifact>, Ec2Error> {
        let filter = [
            (
                String::from("Filter.1.Name"),
                format!("tag:{}", self.settings.subscription_tag()),
            ),
            (String::from("Filter.1.Value"), subscription.to_string()),
        ];
        self.describe_images(parameters, &filter).await
    }

    pub(crate) async fn find_by_id(
        &self,
        parameters: &SubscriptionParameters,
        image_id: &str,
    ) -> Result<Option<Artifact>, Ec2Error> {
        let filter = [(String::from("ImageId.1"), image_id.to_owned())];
        Ok(self
            .describe_images(parameters, &filter)
            .await?
            .into_iter()
            .next())
    }

    async fn describe_images(
        &self,
        parameters: &SubscriptionParameters,
        filter: &[(String, String)],
    ) -> Result<Vec<Artifact>, Ec2Error> {
        let query = QueryAction::new("DescribeImages")
            .param("Owner.1", "self")
            .params(filter);
        let Some(response) = self
            .client
            .process(parameters, &query)
            .await?
            .filter(|body| !body.trim().is_empty())
        else {
            return Ok(Vec::new());
        };
        let records =
            xml::decode_images(&response).map_err(|err| Ec2Error::DescribeImagesFailed {
                filter: render_filter(filter),
                message: err.to_string(),
            })?;
        Ok(records
            .into_iter()
            .map(|record| self.artifact(record))
            .collect())
    }

    fn artifact(&self, record: ImageRecord) -> Artifact {
        let audit = self.settings.audit_tag();
        let author = record
            .tags
            .iter()
            .find(|(key, _)| *key == audit)
            .map(|(_, login)| self.identities.resolve(login));
        let date = parse_date(record.image_id.as_deref(), record.creation_date.as_deref());
        let volumes = record
            .volumes
            .into_iter()
            .filter_map(|volume| {
                Some(VolumeSnapshot {
                    id: volume.snapshot_id?,
                    name: volume.device_name,
                    size: volume
                        .volume_size
                        .as_deref()
                        .and_then(|size| size.trim().parse().ok())
                        .unwrap_or(0),
                })
            })
            .collect();
        let state = record.image_state;
        Artifact {
            id: record.image_id,
            name: record.name,
            description: record
                .description
                .map(|text| text.trim().to_owned())
                .filter(|text| !text.is_empty()),
            available: state.as_deref() == Some("available"),
            pending: state.as_deref() == Some("pending"),
            status_text: state,
            date,
            author,
            volumes,
            stop_requested: None,
            operation: None,
        }
    }
}

fn parse_date(image_id: Option<&str>, value: Option<&str>) -> DateTime<Utc> {
    match value.map(DateTime::parse_from_rfc3339) {
        Some(Ok(date)) => date.with_timezone(&Utc),
        other => {
            info!(
                image = image_id.unwrap_or_default(),
                date = ?other,
                "image creation date cannot be parsed"
            );
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

fn render_filter(filter: &[(String, String)]) -> String {
    filter
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
