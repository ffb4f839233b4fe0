use std::sync::Arc;

/// Coarse monotonic clock shared by the queues and caches.
///
/// Backed by the tokio clock so tests with a paused runtime control it.
#[derive(Debug)]
pub struct TickService {
    start: tokio::time::Instant,
}

impl TickService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start: tokio::time::Instant::now(),
        })
    }

    /// Milliseconds since the service was created.
    pub fn milliseconds(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Microseconds since the service was created.
    pub fn microseconds(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn advances_with_clock() {
        let tick = TickService::new();
        assert_eq!(tick.milliseconds(), 0);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(tick.milliseconds(), 250);
        assert_eq!(tick.microseconds(), 250_000);
    }
}
