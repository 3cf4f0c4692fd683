use super::{Consumer, Producer};
use crate::Core::alloc::ChannelRegion;
use std::io;

pub struct ChannelBuilder {
    name: String,
    capacity: usize,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            name: "dmxp_qbench".to_string(),
            capacity: 1024, // 1024 slots
        }
    }
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of ring slots; must be a power of two.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Create the region and return its producer half. An existing region
    /// under the same name is truncated and laid out afresh.
    pub fn build_producer(&self) -> io::Result<Producer> {
        let region = ChannelRegion::create(&self.name, self.capacity)?;
        Ok(Producer::new(region))
    }

    /// Producer over the region already published under this name, keeping
    /// whatever messages it still holds. Falls back to creating the region
    /// when none exists. The existing ring keeps its own capacity.
    pub fn attach_or_build_producer(&self) -> io::Result<Producer> {
        match ChannelRegion::attach(&self.name) {
            Ok(region) => Ok(Producer::new(region)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.build_producer(),
            Err(e) => Err(e),
        }
    }

    /// Attach to an existing region and return its consumer half.
    pub fn build_consumer(&self) -> io::Result<Consumer> {
        let region = ChannelRegion::attach(&self.name)?;
        Ok(Consumer::new(region))
    }
}
