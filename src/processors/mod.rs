use dashmap::DashSet;
use std::sync::Arc;

use crate::home_assistant::device::Device;
use crate::home_assistant::topics::Topics;

pub mod discovery_processor;
pub mod ha_processor;
pub mod status_processor;

pub struct ProcessorState {
    pub topics: Topics,
    pub device: Device,
    /// Unique ids whose discovery config went out on the current connection.
    pub published_discovery: Arc<DashSet<String>>,
}

impl ProcessorState {
    pub fn new(topics: Topics) -> Self {
        let device = Device::genset(topics.address(), topics.object_prefix());
        Self {
            topics,
            device,
            published_discovery: Arc::new(DashSet::new()),
        }
    }

    /// Forces discovery and command subscriptions to be sent again.
    pub fn forget_discovery(&self) {
        self.published_discovery.clear();
    }
}
