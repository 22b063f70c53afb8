//! # Wire Format
//!
//! Every exchange on the overlay is exactly one UTF-8 JSON object per
//! connection, dispatched on its `"type"` field. The message set is closed:
//! nine request kinds, and three reply shapes. There is no length framing —
//! the receiver accumulates bytes until a complete object parses or the
//! frame cap is hit (see the transport layer).
//!
//! Replies are deliberately *not* part of the tagged enum: the original
//! protocol answers `register` with a bare `{"status": "pending"}` and
//! `get_peers` with a bare `{"peers": [...]}`, neither of which carries a
//! `type` field. Only `pong` is tagged. Interoperability beats symmetry.
//!
//! Endpoints inside payloads are two-element arrays `[host, port]`; the
//! `register`, `peer_info`, and `dead_node` kinds carry their addresses as
//! flat `ip`/`port` fields instead, because that is what the wire says.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;

// ---------------------------------------------------------------------------
// Message Set
// ---------------------------------------------------------------------------

/// Every tagged frame a seed or peer can receive.
///
/// A closed set: anything with a `type` outside this list is ignored by
/// policy, not parsed by accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Peer → seed. "Please put me in the directory." Answered with a
    /// pending status; admission happens later, by quorum.
    Register { ip: String, port: u16 },
    /// Seed → seed. One seed's vote to admit `peer`.
    RegisterVote { peer: Endpoint, voter: Endpoint },
    /// Peer → seed. "Who is alive?" Answered with a directory snapshot.
    GetPeers,
    /// Peer → peer. Neighbor handshake announcing the sender's identity.
    PeerInfo { ip: String, port: u16 },
    /// Peer → peer. One gossip payload, flooded with de-duplication.
    Gossip { message: String },
    /// Peer → peer. Liveness probe.
    Ping,
    /// Peer → peer. Liveness reply. The only tagged reply in the protocol.
    Pong,
    /// Peer → peer. The sender has escalated `suspect` and asks nothing —
    /// the vote itself is the payload.
    SuspicionVote { suspect: Endpoint, voter: Endpoint },
    /// Peer → seed. A neighborhood quorum agreed `dead_*` is gone.
    DeadNode {
        dead_ip: String,
        dead_port: u16,
        reporter_ip: String,
        reporter_port: u16,
    },
    /// Seed → seed. One seed's vote to evict `peer`.
    DeadVote { peer: Endpoint, voter: Endpoint },
}

impl Message {
    /// The wire tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Register { .. } => "register",
            Message::RegisterVote { .. } => "register_vote",
            Message::GetPeers => "get_peers",
            Message::PeerInfo { .. } => "peer_info",
            Message::Gossip { .. } => "gossip",
            Message::Ping => "ping",
            Message::Pong => "pong",
            Message::SuspicionVote { .. } => "suspicion_vote",
            Message::DeadNode { .. } => "dead_node",
            Message::DeadVote { .. } => "dead_vote",
        }
    }
}

// ---------------------------------------------------------------------------
// Reply Shapes
// ---------------------------------------------------------------------------

/// Untagged acknowledgement reply: `{"status": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
}

impl StatusReply {
    /// Acknowledges a `register`: admission is pending quorum.
    pub fn pending() -> Self {
        Self {
            status: "pending".to_string(),
        }
    }

    /// Acknowledges a `dead_node` report.
    pub fn received() -> Self {
        Self {
            status: "received".to_string(),
        }
    }
}

/// Untagged `get_peers` reply: `{"peers": [[host, port], ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeersReply {
    pub peers: Vec<Endpoint>,
}

// ---------------------------------------------------------------------------
// Encode / Decode
// ---------------------------------------------------------------------------

/// What fell out of an inbound frame.
///
/// `Unknown` is a well-formed JSON object whose `type` is outside the
/// message set — ignored silently per protocol. Anything else that fails
/// to parse is a [`WireError`] and costs the sender its connection.
#[derive(Debug)]
pub enum Inbound {
    Known(Message),
    Unknown(String),
}

/// Errors from encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The bytes do not contain a usable JSON object.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Well-formed JSON, but not an object with a string `type` field.
    #[error("frame is not a tagged object")]
    Untagged,
}

/// Serializes a frame. Infallible for every type this crate sends, but the
/// signature keeps the `?` discipline at call sites.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes a reply of a known shape.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Every tag in the message set. A frame naming one of these with a
/// payload that does not parse is malformed, not "unknown".
const KNOWN_KINDS: [&str; 10] = [
    "register",
    "register_vote",
    "get_peers",
    "peer_info",
    "gossip",
    "ping",
    "pong",
    "suspicion_vote",
    "dead_node",
    "dead_vote",
];

/// Decodes an inbound request frame, distinguishing "kind we do not speak"
/// from "not a frame at all".
pub fn decode_inbound(bytes: &[u8]) -> Result<Inbound, WireError> {
    match serde_json::from_slice::<Message>(bytes) {
        Ok(msg) => Ok(Inbound::Known(msg)),
        Err(tag_err) => {
            // Maybe it parses as JSON but names a kind outside the set.
            let value: serde_json::Value = match serde_json::from_slice(bytes) {
                Ok(v) => v,
                Err(_) => return Err(WireError::Malformed(tag_err)),
            };
            match value.get("type").and_then(|t| t.as_str()) {
                Some(kind) if !KNOWN_KINDS.contains(&kind) => {
                    Ok(Inbound::Unknown(kind.to_string()))
                }
                Some(_) => Err(WireError::Malformed(tag_err)),
                None => Err(WireError::Untagged),
            }
        }
    }
}
