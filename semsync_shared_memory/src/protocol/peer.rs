//! Abort path from the consumer to the producer

use crate::cancel::CancellationToken;
use crate::error::SyncResult;

/// Out-of-band link the consumer uses to stop the producer after a race.
///
/// Across processes this is a signal ([`SignalPeer`]); inside one process the
/// producer's [`CancellationToken`] serves directly.
///
/// [`SignalPeer`]: crate::signals::SignalPeer
pub trait PeerLink: Send + Sync {
    /// Ask the producer to stop at its next loop head
    fn raise_abort(&self) -> SyncResult<()>;
}

impl PeerLink for CancellationToken {
    fn raise_abort(&self) -> SyncResult<()> {
        self.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_link_cancels_token() {
        let token = CancellationToken::new();
        let link: &dyn PeerLink = &token;
        link.raise_abort().unwrap();
        assert!(token.is_cancelled());
    }
}
