//! # Delivery Channel Controller
//!
//! This library provides the core reconciliation logic for an AWS Config
//! delivery channel: the remote object that defines where the configuration
//! recorder exports its snapshots and history.
//!
//! The controller converges remote state to a declared [`ChannelSpec`]:
//!
//! 1. **Upsert** - put the channel (retrying while destination access
//!    policies propagate), then read it back to confirm visibility
//! 2. **Read** - describe the channel by name and normalize the observed
//!    state, treating service-reported absence as a non-error
//! 3. **Delete** - delete the channel, retrying while the paired
//!    configuration recorder is still shutting down
//!
//! Tests are included in the module files (e.g. `controller/retry.rs`) and
//! under `tests/`.

use serde::{Deserialize, Serialize};

// Re-export modules so they can be tested
pub mod constants;
pub mod controller;
pub mod provider;

pub use controller::reconciler::{ReconcileError, Reconciler};

/// Desired configuration for the managed delivery channel.
///
/// Assembled from validated caller input. Optional fields left as `None`
/// are never sent to the service; the service fills in its own defaults and
/// the observed values come back through [`ChannelState`].
///
/// The `name` is the channel's identity. The service accepts at most
/// [`constants::MAX_CHANNEL_NAME_LEN`] characters and allows a single
/// channel per account/region scope. Renaming requires destroying and
/// recreating the remote object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    #[serde(default = "default_channel_name")]
    pub name: String,
    pub s3_bucket_name: String,
    #[serde(default)]
    pub s3_key_prefix: Option<String>,
    #[serde(default)]
    pub s3_kms_key_arn: Option<String>,
    #[serde(default)]
    pub sns_topic_arn: Option<String>,
    #[serde(default)]
    pub snapshot_delivery_properties: Option<SnapshotDeliveryProperties>,
}

fn default_channel_name() -> String {
    constants::DEFAULT_CHANNEL_NAME.to_string()
}

/// Snapshot delivery settings for the channel.
///
/// A spec without this block is distinct from one carrying a block whose
/// frequency is unset: only fields actually present are put to the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDeliveryProperties {
    #[serde(default)]
    pub delivery_frequency: Option<DeliveryFrequency>,
}

/// Allowed snapshot delivery cadences.
///
/// Serialized with the service's literal frequency strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DeliveryFrequency {
    #[serde(rename = "One_Hour")]
    OneHour,
    #[serde(rename = "Three_Hours")]
    ThreeHours,
    #[serde(rename = "Six_Hours")]
    SixHours,
    #[serde(rename = "Twelve_Hours")]
    TwelveHours,
    #[serde(rename = "TwentyFour_Hours")]
    TwentyFourHours,
}

impl DeliveryFrequency {
    /// The service's wire string for this cadence.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneHour => "One_Hour",
            Self::ThreeHours => "Three_Hours",
            Self::SixHours => "Six_Hours",
            Self::TwelveHours => "Twelve_Hours",
            Self::TwentyFourHours => "TwentyFour_Hours",
        }
    }
}

/// Observed state of the delivery channel, normalized back into the
/// caller's representation after a read.
///
/// Shape matches [`ChannelSpec`]; a snapshot block absent on the service
/// side stays absent here rather than becoming a block with empty fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    pub name: String,
    pub s3_bucket_name: String,
    pub s3_key_prefix: Option<String>,
    pub s3_kms_key_arn: Option<String>,
    pub sns_topic_arn: Option<String>,
    pub snapshot_delivery_properties: Option<SnapshotDeliveryProperties>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_spec_defaults_name() {
        let spec: ChannelSpec =
            serde_json::from_value(serde_json::json!({ "s3BucketName": "my-bucket" }))
                .expect("minimal spec should deserialize");

        assert_eq!(spec.name, "default");
        assert_eq!(spec.s3_bucket_name, "my-bucket");
        assert_eq!(spec.s3_key_prefix, None);
        assert_eq!(spec.snapshot_delivery_properties, None);
    }

    #[test]
    fn test_delivery_frequency_uses_service_strings() {
        let cases = vec![
            (DeliveryFrequency::OneHour, "One_Hour"),
            (DeliveryFrequency::ThreeHours, "Three_Hours"),
            (DeliveryFrequency::SixHours, "Six_Hours"),
            (DeliveryFrequency::TwelveHours, "Twelve_Hours"),
            (DeliveryFrequency::TwentyFourHours, "TwentyFour_Hours"),
        ];

        for (frequency, expected) in cases {
            assert_eq!(frequency.as_str(), expected);
            let json = serde_json::to_value(frequency).expect("frequency should serialize");
            assert_eq!(json, serde_json::json!(expected));
        }
    }

    #[test]
    fn test_delivery_frequency_rejects_unknown_cadence() {
        let result: Result<DeliveryFrequency, _> =
            serde_json::from_value(serde_json::json!("Two_Hours"));
        assert!(result.is_err(), "unknown cadence should be rejected");
    }

    #[test]
    fn test_snapshot_block_with_unset_frequency_is_preserved() {
        let spec: ChannelSpec = serde_json::from_value(serde_json::json!({
            "s3BucketName": "my-bucket",
            "snapshotDeliveryProperties": {}
        }))
        .expect("spec with empty snapshot block should deserialize");

        assert_eq!(
            spec.snapshot_delivery_properties,
            Some(SnapshotDeliveryProperties {
                delivery_frequency: None
            })
        );
    }
}
