//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Timeout values mirror the service's documented propagation behavior and
//! are deliberately not configurable per call.

/// Name the service assigns a delivery channel when none is given
pub const DEFAULT_CHANNEL_NAME: &str = "default";

/// Maximum channel name length accepted by the service (characters)
pub const MAX_CHANNEL_NAME_LEN: usize = 256;

/// How long to keep retrying a put while destination access policies
/// propagate (seconds)
pub const PROPAGATION_TIMEOUT_SECS: u64 = 120;

/// Retry window for a delete while the paired configuration recorder is
/// still shutting down (seconds)
pub const DELETE_RETRY_TIMEOUT_SECS: u64 = 30;

/// First backoff step between retry attempts (seconds)
pub const RETRY_BACKOFF_MIN_SECS: u64 = 1;

/// Backoff cap between retry attempts (seconds)
pub const RETRY_BACKOFF_MAX_SECS: u64 = 10;

/// How many describes to attempt before declaring a just-written channel
/// missing
pub const READ_BACK_ATTEMPTS: u32 = 5;
