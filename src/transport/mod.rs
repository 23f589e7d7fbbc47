// src/transport/mod.rs

//! Notification transport: wire events plus the WebSocket server that
//! carries them.

pub mod events;
pub mod ws;

pub use events::{hub, ClientEvent, Hub, Reply, ServerEvent};
pub use ws::{router, serve};
