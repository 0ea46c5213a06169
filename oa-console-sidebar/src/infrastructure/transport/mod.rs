pub mod line_delimited;
pub mod memory;

pub use line_delimited::LineDelimitedChannel;
pub use memory::{MemoryChannel, MemoryChannelPeer, memory_channel};
