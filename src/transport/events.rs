// src/transport/events.rs

//! Wire events exchanged with observers.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::registry::ProgramRecord;

/// Events sent from the daemon to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full registry snapshot, sent to a newly connected observer.
    #[serde(rename = "programs/registered")]
    ProgramsRegistered(Vec<ProgramRecord>),

    /// A record was created or changed status.
    #[serde(rename = "registry/update")]
    RegistryUpdate(ProgramRecord),

    /// A record was pruned together with its artifacts.
    #[serde(rename = "registry/remove")]
    RegistryRemove { id: String },

    /// One progress line for the requester of a registration.
    #[serde(rename = "build/output")]
    BuildOutput { program: String, msg: String },
}

/// Requests observers can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "program/register")]
    Register { location: String },
}

/// Fan-out to every connected observer. Late subscribers miss earlier events.
pub type Hub = broadcast::Sender<ServerEvent>;

/// Channel back to the single observer that made a request.
pub type Reply = mpsc::UnboundedSender<ServerEvent>;

const HUB_CAPACITY: usize = 256;

pub fn hub() -> Hub {
    broadcast::channel(HUB_CAPACITY).0
}
