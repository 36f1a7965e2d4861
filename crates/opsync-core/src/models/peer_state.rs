use serde::{Deserialize, Serialize};

/// Connectivity of a remote peer as reported by the orchestrator.
///
/// Transitions are decided entirely server-side; the client is a transport
/// and simply mirrors the most recent snapshot per peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerConnectionState {
    Unknown,
    Pending,
    Connected,
    RetryWait,
    Disconnected,
    ErrorAuth,
    ErrorProtocol,
    ErrorInternal,
}

impl Default for PeerConnectionState {
    fn default() -> Self {
        PeerConnectionState::Unknown
    }
}

/// Full connectivity snapshot for one peer, keyed by `peer_keyid`.
///
/// Peers are never explicitly deleted; a peer that goes away is reported as
/// `Disconnected`. Conflicting snapshots for the same key are last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerState {
    /// Stable key identifier for the peer. The deduplication key.
    pub peer_keyid: String,
    /// Peer-chosen display name.
    pub peer_instance_id: String,
    pub state: PeerConnectionState,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub last_heartbeat_millis: i64,
    /// Repositories the peer is known to hold.
    #[serde(default)]
    pub known_repos: Vec<String>,
}
