//! # Reconciler
//!
//! Core reconciliation logic for the delivery channel.
//!
//! The reconciler:
//! - Converts the declared [`ChannelSpec`] into the wire shape, omitting
//!   absent optionals
//! - Puts the channel under a bounded retry while destination access
//!   policies propagate, then reads it back to confirm visibility
//! - Normalizes observed state into [`ChannelState`], treating
//!   service-reported absence as a non-error that clears the identity
//! - Deletes the channel under a shorter retry window while the paired
//!   configuration recorder shuts down
//!
//! ## Reconciliation Flow
//!
//! 1. `upsert` - put (retried) -> record identity -> read back
//! 2. `read` - describe exactly one name -> absent | state | consistency error
//! 3. `delete` - delete (retried); absence is proven by the call's success
//!
//! Calls for the same channel must not overlap; the orchestration layer is
//! responsible for serializing them. The service is the only source of
//! truth, so concurrent writers would race there regardless of local
//! locking.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::{
    DELETE_RETRY_TIMEOUT_SECS, PROPAGATION_TIMEOUT_SECS, READ_BACK_ATTEMPTS,
    RETRY_BACKOFF_MAX_SECS, RETRY_BACKOFF_MIN_SECS,
};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::retry::{RetryOutcome, RetryPolicy};
use crate::provider::{
    is_insufficient_delivery_policy, is_no_such_delivery_channel, is_recorder_blocking_delete,
    ChannelServiceClient, DeliveryChannel, RemoteError,
};
use crate::{ChannelSpec, ChannelState};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("creating delivery channel {name} failed: {source}")]
    Put { name: String, source: RemoteError },

    #[error("describing delivery channel {name} failed: {source}")]
    Describe { name: String, source: RemoteError },

    #[error("deleting delivery channel {name} failed: {source}")]
    Delete { name: String, source: RemoteError },

    /// The service returned several channels for one name. Name is the
    /// unique key, so this indicates backend or scoping corruption and is
    /// never resolved by picking one of the results.
    #[error("received {count} delivery channels under {name} (expected exactly 1): {channels:?}")]
    UnexpectedChannelCount {
        name: String,
        count: usize,
        channels: Vec<DeliveryChannel>,
    },

    /// The put was acknowledged but the channel never became visible to a
    /// describe within the read-back attempt limit.
    #[error("delivery channel {name} was written but never became visible")]
    NotVisibleAfterWrite { name: String },
}

/// Reconciles the declared delivery-channel configuration against the
/// service.
///
/// Holds the service client and the identity of the channel it manages.
/// The identity is recorded on the first successful upsert and cleared when
/// a read observes that the channel no longer exists; the orchestration
/// layer persists it between calls.
pub struct Reconciler {
    client: Arc<dyn ChannelServiceClient>,
    channel_id: Mutex<Option<String>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Reconciler for a channel that has not been created yet.
    #[must_use]
    pub fn new(client: Arc<dyn ChannelServiceClient>) -> Self {
        Self {
            client,
            channel_id: Mutex::new(None),
        }
    }

    /// Resume managing a channel that already exists remotely.
    #[must_use]
    pub fn with_channel_id(
        client: Arc<dyn ChannelServiceClient>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            channel_id: Mutex::new(Some(channel_id.into())),
        }
    }

    /// Identity of the managed channel, if one is currently believed to
    /// exist.
    #[must_use]
    pub fn channel_id(&self) -> Option<String> {
        self.channel_id.lock().unwrap().clone()
    }

    fn set_channel_id(&self, channel_id: Option<String>) {
        *self.channel_id.lock().unwrap() = channel_id;
    }

    /// Create or update the remote channel to match `spec`, then read the
    /// resulting state back.
    ///
    /// The put is retried for up to the propagation window while the
    /// service reports an insufficient delivery policy - granting the
    /// destination bucket/topic its permissions takes effect with a delay.
    /// When the window elapses, one final unretried put decides the
    /// outcome. The upsert is complete only once a describe confirms the
    /// channel is visible.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::Put`] if the service rejects the write,
    /// [`ReconcileError::Describe`] / [`ReconcileError::UnexpectedChannelCount`]
    /// if the confirming read fails, and
    /// [`ReconcileError::NotVisibleAfterWrite`] if the acknowledged write
    /// never becomes visible.
    pub async fn upsert(&self, spec: &ChannelSpec) -> Result<ChannelState, ReconcileError> {
        let channel = channel_from_spec(spec);
        let name = channel.name.clone();

        let policy = RetryPolicy::new(Duration::from_secs(PROPAGATION_TIMEOUT_SECS));
        let outcome = policy
            .run(
                || async { self.client.put_delivery_channel(&channel).await },
                is_insufficient_delivery_policy,
            )
            .await;

        match outcome {
            RetryOutcome::Ok(()) => {}
            RetryOutcome::Terminal(source) => {
                return Err(ReconcileError::Put { name, source });
            }
            RetryOutcome::Exhausted(_) => {
                // The policy may land just after the window closes; the
                // final attempt's own result decides, not the timeout.
                self.client
                    .put_delivery_channel(&channel)
                    .await
                    .map_err(|source| ReconcileError::Put {
                        name: name.clone(),
                        source,
                    })?;
            }
        }

        info!("delivery channel {name} written, confirming visibility");
        self.set_channel_id(Some(name.clone()));

        self.read_back(&name).await
    }

    /// Observe the managed channel.
    ///
    /// Returns `Ok(None)` when the service reports the channel gone -
    /// either via its not-found error or an empty describe result - and
    /// clears the stored identity, so the caller treats it as "no longer
    /// exists", not as a failure. Without a stored identity the service is
    /// not consulted.
    ///
    /// Reads are never retried here: this call has no write side effects
    /// to protect, so retry decisions belong to the caller.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::Describe`] on any other remote error and
    /// [`ReconcileError::UnexpectedChannelCount`] when several channels
    /// come back for the one requested name.
    pub async fn read(&self) -> Result<Option<ChannelState>, ReconcileError> {
        let Some(name) = self.channel_id() else {
            return Ok(None);
        };

        match self.describe_one(&name).await? {
            Some(channel) => Ok(Some(normalize(channel))),
            None => {
                warn!("delivery channel {name} is gone");
                self.set_channel_id(None);
                Ok(None)
            }
        }
    }

    /// Delete the managed channel.
    ///
    /// The delete is retried for a short window while the service reports
    /// the paired configuration recorder still running - stopping the
    /// recorder is itself asynchronous, so the ordering dependency may take
    /// a moment to clear. When the window elapses, one final unretried
    /// delete decides the outcome. No read-back follows: absence is proven
    /// by the delete's own success.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::Delete`] if the service rejects the delete.
    pub async fn delete(&self) -> Result<(), ReconcileError> {
        let Some(name) = self.channel_id() else {
            debug!("no delivery channel recorded, nothing to delete");
            return Ok(());
        };

        let policy = RetryPolicy::new(Duration::from_secs(DELETE_RETRY_TIMEOUT_SECS));
        let outcome = policy
            .run(
                || async { self.client.delete_delivery_channel(&name).await },
                is_recorder_blocking_delete,
            )
            .await;

        match outcome {
            RetryOutcome::Ok(()) => {}
            RetryOutcome::Terminal(source) => {
                return Err(ReconcileError::Delete { name, source });
            }
            RetryOutcome::Exhausted(_) => {
                self.client
                    .delete_delivery_channel(&name)
                    .await
                    .map_err(|source| ReconcileError::Delete {
                        name: name.clone(),
                        source,
                    })?;
            }
        }

        info!("delivery channel {name} deleted");
        Ok(())
    }

    /// Describe exactly one channel by name, mapping service-reported
    /// absence to `None` and rejecting multi-channel responses.
    async fn describe_one(&self, name: &str) -> Result<Option<DeliveryChannel>, ReconcileError> {
        let channels = match self
            .client
            .describe_delivery_channels(&[name.to_string()])
            .await
        {
            Ok(channels) => channels,
            Err(source) if is_no_such_delivery_channel(&source) => return Ok(None),
            Err(source) => {
                return Err(ReconcileError::Describe {
                    name: name.to_string(),
                    source,
                });
            }
        };

        match channels.len() {
            // Some backends signal absence with an empty list instead of
            // the typed not-found error
            0 => Ok(None),
            1 => Ok(channels.into_iter().next()),
            count => Err(ReconcileError::UnexpectedChannelCount {
                name: name.to_string(),
                count,
                channels,
            }),
        }
    }

    /// Confirm a just-written channel is externally visible.
    ///
    /// A successful put can precede visibility on an eventually consistent
    /// backend, so the confirming describe is retried a few times before
    /// the upsert is declared failed.
    async fn read_back(&self, name: &str) -> Result<ChannelState, ReconcileError> {
        let mut backoff = FibonacciBackoff::new(RETRY_BACKOFF_MIN_SECS, RETRY_BACKOFF_MAX_SECS);

        for attempt in 1..=READ_BACK_ATTEMPTS {
            if let Some(channel) = self.describe_one(name).await? {
                return Ok(normalize(channel));
            }

            if attempt < READ_BACK_ATTEMPTS {
                let wait = backoff.next_backoff();
                debug!(
                    "delivery channel {name} not visible yet (attempt {attempt}), retrying in {}s",
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(ReconcileError::NotVisibleAfterWrite {
            name: name.to_string(),
        })
    }
}

/// Build the wire-level channel from the declared spec. Absent optionals
/// stay absent; the service never receives placeholder values.
fn channel_from_spec(spec: &ChannelSpec) -> DeliveryChannel {
    DeliveryChannel {
        name: spec.name.clone(),
        s3_bucket_name: spec.s3_bucket_name.clone(),
        s3_key_prefix: spec.s3_key_prefix.clone(),
        s3_kms_key_arn: spec.s3_kms_key_arn.clone(),
        sns_topic_arn: spec.sns_topic_arn.clone(),
        snapshot_delivery_properties: spec.snapshot_delivery_properties.clone(),
    }
}

/// Map the service's view back onto the caller's representation,
/// field by field. A snapshot block the service does not report stays
/// absent rather than becoming a block with empty fields.
fn normalize(channel: DeliveryChannel) -> ChannelState {
    ChannelState {
        name: channel.name,
        s3_bucket_name: channel.s3_bucket_name,
        s3_key_prefix: channel.s3_key_prefix,
        s3_kms_key_arn: channel.s3_kms_key_arn,
        sns_topic_arn: channel.sns_topic_arn,
        snapshot_delivery_properties: channel.snapshot_delivery_properties,
    }
}
