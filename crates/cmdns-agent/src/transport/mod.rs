//! Transport to the measurement service

mod websocket;

pub use websocket::connect;
