//! Deadlines for outbound peer calls.
//!
//! The HTTP client already enforces its own request timeout. A
//! [`CallTimeout`] adds a per-method bound on top, which also covers
//! transports that have no timeout of their own. Expiry is reported as a
//! transport failure so callers treat it like any other unreachable peer.

use std::future::Future;
use std::time::Duration;

use crate::error::{RelayError, UnreachableCause};

/// Upper bound on a single peer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeout {
    /// Maximum time to wait for the peer
    pub timeout: Duration,
}

impl CallTimeout {
    /// Create a new call deadline.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `call`, failing with `PeerUnreachable` (cause `Timeout`) if it
    /// does not finish in time. The unfinished future is dropped.
    pub async fn run<F, T>(&self, peer: &str, call: F) -> Result<T, RelayError>
    where
        F: Future<Output = Result<T, RelayError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::PeerUnreachable {
                peer: peer.to_string(),
                cause: UnreachableCause::Timeout,
                reason: format!("no reply within {:?}", self.timeout),
            }),
        }
    }
}

/// Run `call` under `deadline` when one is set, otherwise unbounded.
pub async fn with_deadline<F, T>(
    deadline: Option<CallTimeout>,
    peer: &str,
    call: F,
) -> Result<T, RelayError>
where
    F: Future<Output = Result<T, RelayError>>,
{
    match deadline {
        Some(deadline) => deadline.run(peer, call).await,
        None => call.await,
    }
}
