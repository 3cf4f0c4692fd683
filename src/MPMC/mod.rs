mod builder;
mod consumer;
mod producer;

pub use builder::ChannelBuilder;
pub use consumer::Consumer;
pub use producer::Producer;

#[allow(non_snake_case)]
pub mod Buffer {
    pub mod Buffer_impl;
    pub mod layout;
    pub use layout::{Slot, MSG_INLINE};
    pub use Buffer_impl::RingBuffer;
}
