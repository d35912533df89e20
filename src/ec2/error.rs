//! Error types for the EC2 client.

use thiserror::Error;

use crate::signer::SignatureError;

use super::VmOperation;

/// Errors raised by the EC2 client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Ec2Error {
    /// Raised when no parameters are registered for a subscription.
    #[error("no provider parameters registered for subscription {subscription}")]
    UnknownSubscription {
        /// Subscription identifier passed by the caller.
        subscription: u32,
    },
    /// Raised when the signed request cannot be built.
    #[error("request signing failed: {0}")]
    Signature(#[from] SignatureError),
    /// Raised when an image listing is not readable XML.
    #[error("DescribeImages failed for filter '{filter}': {message}")]
    DescribeImagesFailed {
        /// Filter pairs appended to the base listing query.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Raised when an instance listing is not readable XML.
    #[error("DescribeInstances failed: {message}")]
    DescribeInstancesFailed {
        /// Parser message.
        message: String,
    },
    /// Raised when the subscription's instance is not visible to the credentials.
    #[error("instance {instance_id} not found")]
    InstanceNotFound {
        /// Provider instance identifier.
        instance_id: String,
    },
    /// Raised when a power operation is neither acknowledged nor reflected in
    /// a state transition.
    #[error("operation {operation} on instance {instance_id} was not accepted")]
    OperationFailed {
        /// Requested operation.
        operation: VmOperation,
        /// Provider instance identifier.
        instance_id: String,
    },
}
