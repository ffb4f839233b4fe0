use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::SessionError;

/// Connection-local request id bookkeeping.
///
/// Ids increment by 2; the low bit encodes the originator (0 = client,
/// 1 = server). A peer id that repeats or goes backwards is a protocol
/// violation. The peer can cap how many requests we may start via
/// MaxRequestId.
pub(crate) struct RequestIds {
    next: AtomicU64,

    /// Largest request id received from the peer, plus one step.
    peer_floor: Mutex<Option<u64>>,

    /// Our ids must stay below this (from the peer's MaxRequestId).
    max: AtomicU64,
}

impl RequestIds {
    pub fn new(client: bool) -> Self {
        Self {
            next: AtomicU64::new(if client { 0 } else { 1 }),
            peer_floor: Mutex::new(None),
            max: AtomicU64::new(u64::MAX),
        }
    }

    /// Claim the next id for an outgoing request.
    pub fn next(&self) -> Result<u64, SessionError> {
        let id = self.next.fetch_add(2, Ordering::Relaxed);
        if id >= self.max.load(Ordering::Relaxed) {
            return Err(SessionError::TooManyRequests);
        }
        Ok(id)
    }

    /// Validate an id on an incoming request: correct parity, strictly
    /// increasing.
    pub fn check_peer(&self, id: u64) -> Result<(), SessionError> {
        let our_parity = self.next.load(Ordering::Relaxed) & 1;
        if id & 1 == our_parity {
            return Err(SessionError::ProtocolViolation("request id parity"));
        }

        let mut floor = self.peer_floor.lock().unwrap();
        match *floor {
            Some(last) if id <= last => Err(SessionError::DuplicateRequestId(id)),
            _ => {
                *floor = Some(id);
                Ok(())
            }
        }
    }

    /// Raise the ceiling from a MaxRequestId message.
    pub fn set_max(&self, max: u64) {
        self.max.fetch_max(max, Ordering::Relaxed);
    }

    /// The current ceiling, for RequestsBlocked.
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_and_increment() {
        let client = RequestIds::new(true);
        assert_eq!(client.next().unwrap(), 0);
        assert_eq!(client.next().unwrap(), 2);

        let server = RequestIds::new(false);
        assert_eq!(server.next().unwrap(), 1);
        assert_eq!(server.next().unwrap(), 3);
    }

    #[test]
    fn peer_reuse_rejected() {
        // We are the server; the peer (client) uses even ids.
        let ids = RequestIds::new(false);

        ids.check_peer(0).unwrap();
        ids.check_peer(2).unwrap();
        assert!(matches!(
            ids.check_peer(2).unwrap_err(),
            SessionError::DuplicateRequestId(2)
        ));
        assert!(matches!(
            ids.check_peer(0).unwrap_err(),
            SessionError::DuplicateRequestId(0)
        ));

        // Our own parity coming back is a violation.
        assert!(matches!(
            ids.check_peer(5).unwrap_err(),
            SessionError::ProtocolViolation(_)
        ));
    }

    #[test]
    fn request_window() {
        let ids = RequestIds::new(true);
        ids.set_max(2);

        assert_eq!(ids.next().unwrap(), 0);
        assert!(matches!(
            ids.next().unwrap_err(),
            SessionError::TooManyRequests
        ));

        // Window never shrinks.
        ids.set_max(1);
        ids.set_max(100);
        assert!(ids.next().is_ok());
    }
}
