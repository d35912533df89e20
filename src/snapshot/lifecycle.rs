//! CREATE and DELETE lifecycles.

use crate::ec2::{ParameterSource, QueryAction, xml};
use crate::gateway::Gateway;

use super::{
    Failure, IMAGE_DESCRIPTION, IdentityDirectory, Phase, SnapshotError, SnapshotOperation,
    SnapshotOrchestrator, SnapshotTask, Step, TaskStore,
};

const IMAGE_DATE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

impl<G, T, I, P> SnapshotOrchestrator<G, T, I, P>
where
    G: Gateway,
    T: TaskStore,
    I: IdentityDirectory,
    P: ParameterSource,
{
    /// Creates an image of the subscription's instance and tags it.
    ///
    /// Provider failures end the task with a failure status instead of
    /// returning an error. On success the task ends in the
    /// `checking-availability` phase; remote visibility is confirmed later by
    /// [`SnapshotOrchestrator::complete_status`].
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::WrongOperation`] for a DELETE task and
    /// [`SnapshotError::Provider`] when the subscription has no parameters or
    /// its request cannot be signed.
    pub async fn create(&self, task: &mut SnapshotTask) -> Result<(), SnapshotError> {
        Self::expect_operation(task, SnapshotOperation::Create)?;
        let parameters = self.parameters_for(task.subscription)?;
        self.transition(task, Step::Begin(Phase::CreatingAmi));

        let name = format!(
            "{}/{}/{}",
            self.settings.name_prefix,
            task.subscription,
            task.start.format(IMAGE_DATE_FORMAT)
        );
        let create = QueryAction::new("CreateImage")
            .param("NoReboot", (!task.stop).to_string())
            .param("InstanceId", parameters.instance_id.as_str())
            .param("Name", name)
            .param("Description", IMAGE_DESCRIPTION);
        let image_id = self
            .client
            .process(&parameters, &create)
            .await?
            .and_then(|response| xml::first_text(&response, "imageId"));
        let Some(image_id) = image_id else {
            self.transition(task, Step::Fail(Failure::CreateFailed));
            return Ok(());
        };

        self.transition(
            task,
            Step::Advance {
                phase: Phase::TaggingAmi,
                done: 1,
                image_id: Some(image_id.clone()),
            },
        );
        let tags = QueryAction::new("CreateTags")
            .param("ResourceId.1", image_id)
            .param("Tag.1.Key", self.settings.subscription_tag())
            .param("Tag.1.Value", task.subscription.to_string())
            .param("Tag.2.Key", self.settings.audit_tag())
            .param("Tag.2.Value", task.author.as_str());
        let response = self.client.process(&parameters, &tags).await?;
        if xml::is_return_true(response.as_deref()) {
            self.transition(task, Step::CreateSucceeded);
        } else {
            self.transition(task, Step::Fail(Failure::TagFailed));
        }
        Ok(())
    }

    /// Deregisters the task's image and deletes its volume snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::WrongOperation`] for a CREATE task and
    /// [`SnapshotError::Provider`] when the subscription has no parameters,
    /// a request cannot be signed or the image lookup is not XML.
    pub async fn delete(&self, task: &mut SnapshotTask) -> Result<(), SnapshotError> {
        Self::expect_operation(task, SnapshotOperation::Delete)?;
        let parameters = self.parameters_for(task.subscription)?;
        self.transition(task, Step::Begin(Phase::SearchingAmi));

        let found = match task.image_id.as_deref() {
            Some(image_id) => self.find_by_id(&parameters, image_id).await?,
            None => None,
        };
        let (Some(image), Some(image_id)) = (found, task.image_id.clone()) else {
            self.transition(task, Step::Fail(Failure::NotFound));
            return Ok(());
        };

        self.transition(
            task,
            Step::Advance {
                phase: Phase::DeregisteringAmi,
                done: 1,
                image_id: None,
            },
        );
        let deregister = QueryAction::new("DeregisterImage").param("ImageId", image_id);
        let response = self.client.process(&parameters, &deregister).await?;
        if !xml::is_return_true(response.as_deref()) {
            self.transition(task, Step::Fail(Failure::UnregisteringFailed));
            return Ok(());
        }

        self.transition(
            task,
            Step::Advance {
                phase: Phase::DeletingSnapshots,
                done: 2,
                image_id: None,
            },
        );
        let delete = image
            .volumes
            .iter()
            .enumerate()
            .fold(QueryAction::new("DeleteSnapshot"), |query, (index, volume)| {
                query.param(format!("SnapshotId.{}", index + 1), volume.id.as_str())
            });
        let response = self.client.process(&parameters, &delete).await?;
        if xml::is_return_true(response.as_deref()) {
            self.transition(task, Step::DeleteSucceeded);
        } else {
            self.transition(task, Step::Fail(Failure::DeletingSnapshotsFailed));
        }
        Ok(())
    }
}
