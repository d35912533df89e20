//! Binary entry point for the vmsnap CLI.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use vmsnap::{
    AwsConfig, ConfigError, Ec2Client, Ec2Error, HttpGateway, Identity, MemoryTaskStore,
    SnapshotError, SnapshotOperation, SnapshotOrchestrator, SnapshotTask, SubscriptionParameters,
    TaskStore, VmOperation,
};

mod cli;

use cli::{Cli, PowerAction, SnapshotCommand};

type Orchestrator = SnapshotOrchestrator<
    HttpGateway,
    MemoryTaskStore,
    BTreeMap<String, Identity>,
    BTreeMap<u32, SubscriptionParameters>,
>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("provider error: {0}")]
    Provider(#[from] Ec2Error),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("failed to write output: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let config = AwsConfig::load_without_cli_args()?;
    run(cli, &config, &mut io::stdout()).await
}

async fn run(cli: Cli, config: &AwsConfig, out: &mut impl Write) -> Result<i32, CliError> {
    let orchestrator = orchestrator(config)?;
    let parameters = subscription_parameters(config)?;
    let client = orchestrator.client();

    match cli {
        Cli::Status => {
            config.require_instance()?;
            write_json(out, &client.vm_details(&parameters).await?)?;
        }
        Cli::Instances(search) => {
            let vms = client
                .find_instances(&parameters, search.criteria.trim())
                .await?;
            write_json(out, &vms)?;
        }
        Cli::Power(power) => {
            config.require_instance()?;
            let operation = vm_operation(power.action);
            let vm = client.execute(&parameters, operation).await?;
            write_json(out, &PowerOutcome { vm, operation })?;
        }
        Cli::Snapshots(search) => {
            let artifacts = orchestrator
                .find_all_snapshots(config.subscription_id, &search.criteria)
                .await?;
            write_json(out, &artifacts)?;
        }
        Cli::Snapshot(snapshot) => {
            let task = run_snapshot(&orchestrator, config, snapshot.command).await?;
            write_json(out, &task)?;
            return Ok(i32::from(task.failed));
        }
        Cli::Check => {
            let valid = client.validate_access(&parameters).await?;
            write_json(out, &AccessCheck { valid })?;
            return Ok(i32::from(!valid));
        }
    }
    Ok(0)
}

async fn run_snapshot(
    orchestrator: &Orchestrator,
    config: &AwsConfig,
    command: SnapshotCommand,
) -> Result<SnapshotTask, CliError> {
    let subscription = config.subscription_id;
    let mut task = match command {
        SnapshotCommand::Create { stop, author } => {
            config.require_instance()?;
            SnapshotTask::new(subscription, SnapshotOperation::Create, author, Utc::now())
                .with_stop(stop)
        }
        SnapshotCommand::Delete { image_id, author } => {
            SnapshotTask::new(subscription, SnapshotOperation::Delete, author, Utc::now())
                .with_image_id(image_id.trim())
        }
    };
    orchestrator.tasks().insert(task.clone());

    match task.operation {
        SnapshotOperation::Create => {
            orchestrator.create(&mut task).await?;
            orchestrator.complete_status(&mut task).await?;
        }
        SnapshotOperation::Delete => orchestrator.delete(&mut task).await?,
    }
    Ok(orchestrator.tasks().get_task(subscription).unwrap_or(task))
}

fn orchestrator(config: &AwsConfig) -> Result<Orchestrator, CliError> {
    let client = Ec2Client::with_settings(HttpGateway::new(), config.client_settings());
    Ok(SnapshotOrchestrator::new(
        client,
        MemoryTaskStore::new(),
        BTreeMap::new(),
        config.as_parameters()?,
    )
    .with_settings(config.snapshot_settings()))
}

fn subscription_parameters(config: &AwsConfig) -> Result<SubscriptionParameters, CliError> {
    config
        .as_parameters()?
        .remove(&config.subscription_id)
        .ok_or(CliError::Provider(Ec2Error::UnknownSubscription {
            subscription: config.subscription_id,
        }))
}

const fn vm_operation(action: PowerAction) -> VmOperation {
    match action {
        PowerAction::On => VmOperation::On,
        PowerAction::Off => VmOperation::Off,
        PowerAction::Shutdown => VmOperation::Shutdown,
        PowerAction::Reboot => VmOperation::Reboot,
        PowerAction::Reset => VmOperation::Reset,
    }
}

#[derive(Debug, Serialize)]
struct PowerOutcome {
    vm: String,
    operation: VmOperation,
}

#[derive(Debug, Serialize)]
struct AccessCheck {
    valid: bool,
}

fn write_json(mut target: impl Write, value: &impl Serialize) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
