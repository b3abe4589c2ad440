//! # Provider Module
//!
//! Boundary to the configuration-recording service that owns the delivery
//! channel.
//!
//! The reconciler talks to the service through the [`ChannelServiceClient`]
//! trait so the state machine can be driven against a scripted stand-in in
//! tests. The production implementation lives in [`aws`].
//!
//! Error classification is kept out of the retry executor: each transient
//! condition the reconciler cares about has its own pure predicate over
//! [`RemoteError`], unit-testable against fabricated error values.

use async_trait::async_trait;
use thiserror::Error;

use crate::SnapshotDeliveryProperties;

/// Error code reported while a destination bucket/topic access policy has
/// not finished propagating
pub const INSUFFICIENT_DELIVERY_POLICY: &str = "InsufficientDeliveryPolicyException";

/// Error code reported when the named channel does not exist
pub const NO_SUCH_DELIVERY_CHANNEL: &str = "NoSuchDeliveryChannelException";

/// Error code reported when the last channel in scope cannot be deleted
pub const LAST_DELIVERY_CHANNEL_DELETE_FAILED: &str = "LastDeliveryChannelDeleteFailedException";

/// Message fragment distinguishing a delete blocked by a recorder that has
/// not stopped yet from other last-channel delete failures
const RUNNING_RECORDER_FRAGMENT: &str = "running configuration recorder";

/// Wire-level delivery channel exchanged with the service.
///
/// Optional fields that are `None` are omitted from the request entirely;
/// the service never sees empty-string placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryChannel {
    pub name: String,
    pub s3_bucket_name: String,
    pub s3_key_prefix: Option<String>,
    pub s3_kms_key_arn: Option<String>,
    pub sns_topic_arn: Option<String>,
    pub snapshot_delivery_properties: Option<SnapshotDeliveryProperties>,
}

/// Classified error returned by the remote service.
///
/// Carries the service's machine-readable code and human-readable message;
/// everything the reconciler needs to classify a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True when the error carries `code` and its message contains
    /// `message_part` (empty fragment matches any message).
    #[must_use]
    pub fn matches(&self, code: &str, message_part: &str) -> bool {
        self.code == code && self.message.contains(message_part)
    }
}

/// The destination access policy has not propagated yet; a put retried
/// shortly is expected to succeed.
#[must_use]
pub fn is_insufficient_delivery_policy(error: &RemoteError) -> bool {
    error.matches(INSUFFICIENT_DELIVERY_POLICY, "")
}

/// The service reports that no channel exists under the requested name.
#[must_use]
pub fn is_no_such_delivery_channel(error: &RemoteError) -> bool {
    error.matches(NO_SUCH_DELIVERY_CHANNEL, "")
}

/// A delete was rejected because the paired configuration recorder is still
/// running. The recorder's stop is asynchronous, so this clears on its own.
///
/// The code alone is not enough: the same code covers other last-channel
/// delete failures that retrying will never fix.
#[must_use]
pub fn is_recorder_blocking_delete(error: &RemoteError) -> bool {
    error.matches(LAST_DELIVERY_CHANNEL_DELETE_FAILED, RUNNING_RECORDER_FRAGMENT)
}

/// Client for the service operations the reconciler needs.
#[async_trait]
pub trait ChannelServiceClient: Send + Sync {
    /// Create or replace the delivery channel. Put is an idempotent
    /// replace-by-name on the service side.
    async fn put_delivery_channel(&self, channel: &DeliveryChannel) -> Result<(), RemoteError>;

    /// Describe the channels matching `names`. A well-formed backend
    /// returns at most one channel per requested name.
    async fn describe_delivery_channels(
        &self,
        names: &[String],
    ) -> Result<Vec<DeliveryChannel>, RemoteError>;

    /// Delete the channel with the given name.
    async fn delete_delivery_channel(&self, name: &str) -> Result<(), RemoteError>;
}

// Production implementation
pub mod aws;
