//! Command-line interface definitions for the `vmsnap` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI for the `vmsnap` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vmsnap",
    about = "Inspect, power and snapshot an AWS EC2 instance",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Show the configured instance.
    #[command(name = "status", about = "Show the configured instance")]
    Status,
    /// List instances whose name or ID contains the criteria.
    #[command(name = "instances", about = "List instances visible to the credentials")]
    Instances(SearchCommand),
    /// Power the configured instance on or off.
    #[command(name = "power", about = "Power the configured instance on or off")]
    Power(PowerCommand),
    /// List snapshot images of the configured subscription.
    #[command(name = "snapshots", about = "List snapshot images of the subscription")]
    Snapshots(SearchCommand),
    /// Create or delete a snapshot image.
    #[command(name = "snapshot", about = "Create or delete a snapshot image")]
    Snapshot(SnapshotArgs),
    /// Check the configured credentials.
    #[command(name = "check", about = "Check the configured credentials")]
    Check,
}

/// Arguments for listing commands.
#[derive(Debug, Parser)]
pub(crate) struct SearchCommand {
    /// Case-insensitive text to look for; lists everything when omitted.
    #[arg(value_name = "CRITERIA", default_value = "")]
    pub(crate) criteria: String,
}

/// Arguments for the `vmsnap power` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct PowerCommand {
    /// Operation to run.
    #[arg(value_enum)]
    pub(crate) action: PowerAction,
}

/// Power operations accepted on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum PowerAction {
    /// Start the instance.
    On,
    /// Force the instance off.
    Off,
    /// Stop the instance gracefully.
    Shutdown,
    /// Reboot the instance.
    Reboot,
    /// Reset the instance.
    Reset,
}

/// Arguments for the `vmsnap snapshot` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct SnapshotArgs {
    /// Lifecycle to run.
    #[command(subcommand)]
    pub(crate) command: SnapshotCommand,
}

/// Snapshot lifecycles.
#[derive(Debug, Subcommand)]
pub(crate) enum SnapshotCommand {
    /// Image the configured instance.
    #[command(name = "create", about = "Image the configured instance")]
    Create {
        /// Stop the instance while it is imaged.
        #[arg(long)]
        stop: bool,
        /// Login recorded in the audit tag.
        #[arg(long, value_name = "LOGIN", default_value = "vmsnap")]
        author: String,
    },
    /// Deregister an image and delete its volume snapshots.
    #[command(name = "delete", about = "Delete a snapshot image")]
    Delete {
        /// Image identifier.
        #[arg(value_name = "IMAGE_ID")]
        image_id: String,
        /// Login recorded on the task.
        #[arg(long, value_name = "LOGIN", default_value = "vmsnap")]
        author: String,
    },
}
