//! Core library for the vmsnap AWS EC2 snapshot tool.
//!
//! The crate signs EC2 Query API calls with Signature Version 4, sends them
//! through a pluggable [`Gateway`], and drives image snapshot lifecycles for
//! subscriptions whose progress is persisted by the host application.

pub mod config;
pub mod ec2;
pub mod gateway;
pub mod signer;
pub mod snapshot;
pub mod test_support;

pub use config::{AwsConfig, ConfigError};
pub use ec2::{
    ClientSettings, Ec2Client, Ec2Error, ParameterSource, QueryAction, SubscriptionParameters, Vm,
    VmNetwork, VmOperation, VmStatus,
};
pub use gateway::{Gateway, GatewayFuture, HttpGateway};
pub use signer::{SignatureError, SignatureQuery, SignatureQueryBuilder, SignedRequest};
pub use snapshot::{
    Artifact, Failure, Identity, IdentityDirectory, MemoryTaskStore, Phase, SnapshotError,
    SnapshotOperation, SnapshotOrchestrator, SnapshotSettings, SnapshotTask, Step, StoreEffect,
    StoreEvent, TaskStore, VolumeSnapshot,
};
