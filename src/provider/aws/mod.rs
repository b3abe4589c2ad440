//! # AWS Config Client
//!
//! Client for the AWS Config service API.
//!
//! This module provides the production [`ChannelServiceClient`] backed by
//! the official AWS SDK:
//! - Put, describe and delete delivery channels
//! - Map SDK error metadata into the reconciler's [`RemoteError`]
//! - Translate between the controller's wire types and the SDK's

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_config::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_config::types::{ConfigSnapshotDeliveryProperties, MaximumExecutionFrequency};
use aws_sdk_config::Client as ConfigClient;
use tracing::{debug_span, Instrument};

use crate::provider::{ChannelServiceClient, DeliveryChannel, RemoteError};
use crate::{DeliveryFrequency, SnapshotDeliveryProperties};

/// AWS Config service client
pub struct AwsConfigService {
    client: ConfigClient,
    region: String,
}

impl std::fmt::Debug for AwsConfigService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsConfigService")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsConfigService {
    /// Create a client for the given region using the SDK's default
    /// credential chain (environment, profile, IMDS, IRSA).
    #[allow(
        clippy::missing_errors_doc,
        reason = "Construction only fails inside the SDK credential chain"
    )]
    pub async fn new(region: &str) -> Result<Self> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Ok(Self {
            client: ConfigClient::new(&sdk_config),
            region: region.to_string(),
        })
    }
}

#[async_trait]
impl ChannelServiceClient for AwsConfigService {
    async fn put_delivery_channel(&self, channel: &DeliveryChannel) -> Result<(), RemoteError> {
        let span = debug_span!(
            "config.channel.put",
            channel.name = %channel.name,
            region = %self.region
        );

        async {
            self.client
                .put_delivery_channel()
                .delivery_channel(to_sdk_channel(channel))
                .send()
                .await
                .map_err(remote_error)?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn describe_delivery_channels(
        &self,
        names: &[String],
    ) -> Result<Vec<DeliveryChannel>, RemoteError> {
        let span = debug_span!("config.channel.describe", region = %self.region);

        async {
            let output = self
                .client
                .describe_delivery_channels()
                .set_delivery_channel_names(Some(names.to_vec()))
                .send()
                .await
                .map_err(remote_error)?;

            Ok(output
                .delivery_channels()
                .iter()
                .map(from_sdk_channel)
                .collect())
        }
        .instrument(span)
        .await
    }

    async fn delete_delivery_channel(&self, name: &str) -> Result<(), RemoteError> {
        let span = debug_span!(
            "config.channel.delete",
            channel.name = %name,
            region = %self.region
        );

        async {
            self.client
                .delete_delivery_channel()
                .delivery_channel_name(name)
                .send()
                .await
                .map_err(remote_error)?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

/// Collapse an SDK error into the code/message pair the reconciler
/// classifies on. Transport-level failures carry no service metadata and
/// fall back to a generic code, which classifies as terminal.
fn remote_error<E, R>(error: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata,
{
    let code = error.code().unwrap_or("UnknownError").to_string();
    let message = error
        .message()
        .unwrap_or("no message returned by the service")
        .to_string();
    RemoteError { code, message }
}

fn to_sdk_channel(channel: &DeliveryChannel) -> aws_sdk_config::types::DeliveryChannel {
    let mut builder = aws_sdk_config::types::DeliveryChannel::builder()
        .name(&channel.name)
        .s3_bucket_name(&channel.s3_bucket_name);

    if let Some(prefix) = &channel.s3_key_prefix {
        builder = builder.s3_key_prefix(prefix);
    }
    if let Some(key_arn) = &channel.s3_kms_key_arn {
        builder = builder.s3_kms_key_arn(key_arn);
    }
    if let Some(topic_arn) = &channel.sns_topic_arn {
        builder = builder.sns_topic_arn(topic_arn);
    }
    if let Some(properties) = &channel.snapshot_delivery_properties {
        let mut properties_builder = ConfigSnapshotDeliveryProperties::builder();
        if let Some(frequency) = properties.delivery_frequency {
            properties_builder = properties_builder.delivery_frequency(to_sdk_frequency(frequency));
        }
        builder = builder.config_snapshot_delivery_properties(properties_builder.build());
    }

    builder.build()
}

fn from_sdk_channel(channel: &aws_sdk_config::types::DeliveryChannel) -> DeliveryChannel {
    DeliveryChannel {
        name: channel.name().unwrap_or_default().to_string(),
        s3_bucket_name: channel.s3_bucket_name().unwrap_or_default().to_string(),
        s3_key_prefix: channel.s3_key_prefix().map(ToString::to_string),
        s3_kms_key_arn: channel.s3_kms_key_arn().map(ToString::to_string),
        sns_topic_arn: channel.sns_topic_arn().map(ToString::to_string),
        snapshot_delivery_properties: channel.config_snapshot_delivery_properties().map(
            |properties| SnapshotDeliveryProperties {
                delivery_frequency: properties
                    .delivery_frequency()
                    .and_then(from_sdk_frequency),
            },
        ),
    }
}

fn to_sdk_frequency(frequency: DeliveryFrequency) -> MaximumExecutionFrequency {
    match frequency {
        DeliveryFrequency::OneHour => MaximumExecutionFrequency::OneHour,
        DeliveryFrequency::ThreeHours => MaximumExecutionFrequency::ThreeHours,
        DeliveryFrequency::SixHours => MaximumExecutionFrequency::SixHours,
        DeliveryFrequency::TwelveHours => MaximumExecutionFrequency::TwelveHours,
        DeliveryFrequency::TwentyFourHours => MaximumExecutionFrequency::TwentyFourHours,
    }
}

fn from_sdk_frequency(frequency: &MaximumExecutionFrequency) -> Option<DeliveryFrequency> {
    match frequency {
        MaximumExecutionFrequency::OneHour => Some(DeliveryFrequency::OneHour),
        MaximumExecutionFrequency::ThreeHours => Some(DeliveryFrequency::ThreeHours),
        MaximumExecutionFrequency::SixHours => Some(DeliveryFrequency::SixHours),
        MaximumExecutionFrequency::TwelveHours => Some(DeliveryFrequency::TwelveHours),
        MaximumExecutionFrequency::TwentyFourHours => Some(DeliveryFrequency::TwentyFourHours),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sdk_channel_omits_absent_optionals() {
        let channel = DeliveryChannel {
            name: "default".to_string(),
            s3_bucket_name: "my-bucket".to_string(),
            s3_key_prefix: None,
            s3_kms_key_arn: None,
            sns_topic_arn: None,
            snapshot_delivery_properties: None,
        };

        let sdk_channel = to_sdk_channel(&channel);

        assert_eq!(sdk_channel.name(), Some("default"));
        assert_eq!(sdk_channel.s3_bucket_name(), Some("my-bucket"));
        assert_eq!(sdk_channel.s3_key_prefix(), None);
        assert_eq!(sdk_channel.s3_kms_key_arn(), None);
        assert_eq!(sdk_channel.sns_topic_arn(), None);
        assert!(sdk_channel.config_snapshot_delivery_properties().is_none());
    }

    #[test]
    fn test_sdk_channel_round_trip_preserves_all_fields() {
        let channel = DeliveryChannel {
            name: "default".to_string(),
            s3_bucket_name: "my-bucket".to_string(),
            s3_key_prefix: Some("audit/".to_string()),
            s3_kms_key_arn: Some("arn:aws:kms:us-east-1:123456789012:key/abc".to_string()),
            sns_topic_arn: Some("arn:aws:sns:us-east-1:123456789012:config".to_string()),
            snapshot_delivery_properties: Some(SnapshotDeliveryProperties {
                delivery_frequency: Some(DeliveryFrequency::TwentyFourHours),
            }),
        };

        let round_tripped = from_sdk_channel(&to_sdk_channel(&channel));
        assert_eq!(round_tripped, channel);
    }

    #[test]
    fn test_snapshot_block_without_frequency_survives_translation() {
        let channel = DeliveryChannel {
            name: "default".to_string(),
            s3_bucket_name: "my-bucket".to_string(),
            s3_key_prefix: None,
            s3_kms_key_arn: None,
            sns_topic_arn: None,
            snapshot_delivery_properties: Some(SnapshotDeliveryProperties {
                delivery_frequency: None,
            }),
        };

        let sdk_channel = to_sdk_channel(&channel);
        let properties = sdk_channel
            .config_snapshot_delivery_properties()
            .expect("snapshot block should be present on the wire");
        assert!(properties.delivery_frequency().is_none());

        assert_eq!(from_sdk_channel(&sdk_channel), channel);
    }
}
