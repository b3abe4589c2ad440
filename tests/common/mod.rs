//! Common test utilities for reconciler behavior tests.
//!
//! Provides a scripted in-memory stand-in for the AWS Config service.
//! Scripted errors are consumed front-to-back, one per call; once a script
//! runs dry the mock falls through to echo semantics - put stores the
//! channel, describe returns whatever is stored under a requested name,
//! delete removes it.

use std::sync::Mutex;

use async_trait::async_trait;
use delivery_channel_controller::provider::{ChannelServiceClient, DeliveryChannel, RemoteError};

#[derive(Default)]
struct MockState {
    stored: Option<DeliveryChannel>,
    put_errors: Vec<RemoteError>,
    describe_errors: Vec<RemoteError>,
    delete_errors: Vec<RemoteError>,
    /// One-shot canned describe responses, served before echo semantics
    describe_script: Vec<Vec<DeliveryChannel>>,
    /// Number of initial describes that observe nothing (visibility lag)
    invisible_describes: u32,
    put_calls: u32,
    describe_calls: u32,
    delete_calls: u32,
}

/// Scripted stand-in for the delivery-channel service.
#[derive(Default)]
pub struct MockChannelService {
    state: Mutex<MockState>,
}

impl std::fmt::Debug for MockChannelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannelService").finish_non_exhaustive()
    }
}

impl MockChannelService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the stored channel, as if it had been created earlier.
    pub fn seed(&self, channel: DeliveryChannel) {
        self.state.lock().unwrap().stored = Some(channel);
    }

    /// Fail the next `count` put calls with copies of `error`.
    pub fn fail_puts(&self, error: &RemoteError, count: u32) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.put_errors.push(error.clone());
        }
    }

    /// Fail the next `count` describe calls with copies of `error`.
    pub fn fail_describes(&self, error: &RemoteError, count: u32) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.describe_errors.push(error.clone());
        }
    }

    /// Fail the next `count` delete calls with copies of `error`.
    pub fn fail_deletes(&self, error: &RemoteError, count: u32) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.delete_errors.push(error.clone());
        }
    }

    /// Serve `response` for the next describe call, bypassing echo
    /// semantics.
    pub fn script_describe(&self, response: Vec<DeliveryChannel>) {
        self.state.lock().unwrap().describe_script.push(response);
    }

    /// Make the first `count` describe calls observe nothing, simulating a
    /// write that has not become visible yet.
    pub fn delay_visibility(&self, count: u32) {
        self.state.lock().unwrap().invisible_describes = count;
    }

    pub fn put_calls(&self) -> u32 {
        self.state.lock().unwrap().put_calls
    }

    pub fn describe_calls(&self) -> u32 {
        self.state.lock().unwrap().describe_calls
    }

    pub fn delete_calls(&self) -> u32 {
        self.state.lock().unwrap().delete_calls
    }

    /// The channel currently held by the fake service, if any.
    pub fn stored(&self) -> Option<DeliveryChannel> {
        self.state.lock().unwrap().stored.clone()
    }
}

#[async_trait]
impl ChannelServiceClient for MockChannelService {
    async fn put_delivery_channel(&self, channel: &DeliveryChannel) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.put_calls += 1;

        if !state.put_errors.is_empty() {
            return Err(state.put_errors.remove(0));
        }

        state.stored = Some(channel.clone());
        Ok(())
    }

    async fn describe_delivery_channels(
        &self,
        names: &[String],
    ) -> Result<Vec<DeliveryChannel>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.describe_calls += 1;

        if !state.describe_errors.is_empty() {
            return Err(state.describe_errors.remove(0));
        }
        if !state.describe_script.is_empty() {
            return Ok(state.describe_script.remove(0));
        }
        if state.invisible_describes > 0 {
            state.invisible_describes -= 1;
            return Ok(Vec::new());
        }

        Ok(state
            .stored
            .iter()
            .filter(|channel| names.contains(&channel.name))
            .cloned()
            .collect())
    }

    async fn delete_delivery_channel(&self, name: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;

        if !state.delete_errors.is_empty() {
            return Err(state.delete_errors.remove(0));
        }

        if state
            .stored
            .as_ref()
            .is_some_and(|channel| channel.name == name)
        {
            state.stored = None;
        }
        Ok(())
    }
}
