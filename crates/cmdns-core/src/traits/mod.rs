//! Core trait definitions

mod probe;
mod transport;

pub use probe::Resolver;
pub use transport::{FrameReader, FrameWriter, Transport};
