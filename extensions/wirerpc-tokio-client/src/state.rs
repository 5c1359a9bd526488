use std::fmt;

/// Lifecycle of a client's transport.
///
/// Transitions are driven from three places: the public `connect` /
/// `disconnect` calls, the reader task observing transport loss, and the
/// reconnect loop. All of them serialize through the client's lifecycle
/// lock, so observers never see a torn transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, never connected.
    Idle,
    /// A connection attempt (initial or reconnect) is in flight.
    Connecting,
    /// Transport is up; requests may be issued.
    Connected,
    /// An explicit `disconnect` is tearing the transport down.
    Disconnecting,
    /// No transport. Reached after a disconnect or a transport loss.
    Disconnected,
    /// A connection attempt failed, or reconnection gave up.
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
