//! Stream reader states.

/// Lifecycle of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Handshake and, for a fresh run, submission in progress.
    Connecting,
    /// Reading frames.
    Streaming,
    /// Transport lost, re-attaching to the same job.
    Reconnecting,
    /// Job drained or caller closed the stream.
    Ended,
    /// Fatal error surfaced to the caller.
    Failed,
}

impl StreamState {
    /// Whether no further events will be produced.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!StreamState::Connecting.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
        assert!(!StreamState::Reconnecting.is_terminal());
        assert!(StreamState::Ended.is_terminal());
        assert!(StreamState::Failed.is_terminal());
    }
}
