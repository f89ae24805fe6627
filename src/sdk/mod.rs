pub mod api;
pub mod channel;
pub mod memory;

pub(crate) mod wire_bytes;
