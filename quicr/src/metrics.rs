//! Connection, track and data-context counters, sampled on a fixed period.
//!
//! Counters accumulate between samples; windowed aggregates ([MinMaxAvg])
//! reset each period. Snapshots are `Serialize` so applications can export
//! them however they like.

use serde::Serialize;

/// Default sampling period, milliseconds.
pub const METRICS_SAMPLE_PERIOD_MS: u64 = 5_000;

/// Windowed min/max/average aggregate.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MinMaxAvg {
    pub min: u64,
    pub max: u64,
    pub avg: u64,
    count: u64,
    #[serde(skip)]
    sum: u64,
}

impl MinMaxAvg {
    pub fn sample(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.avg = self.sum / self.count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Start a fresh window.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-connection receive-side counters.
#[derive(Default, Clone, Copy, Debug, Serialize)]
pub struct ConnectionMetrics {
    /// Last sampled time, microseconds since connection start.
    pub last_sample_time: u64,

    /// Received datagram with an unknown track alias.
    pub rx_dgram_unknown_track_alias: u64,
    /// Received datagram with an invalid type.
    pub rx_dgram_invalid_type: u64,
    /// Failed to decode a datagram.
    pub rx_dgram_decode_failed: u64,

    /// Data stream decode failure; the stream was dropped.
    pub rx_stream_buffer_error: u64,
    /// Received stream header with an unknown track alias.
    pub rx_stream_unknown_track_alias: u64,
    /// Received stream header with an invalid type.
    pub rx_stream_invalid_type: u64,

    /// Invalid control stream message. Always fatal, so at most 1.
    pub invalid_ctrl_stream_msg: u64,
}

/// Per-subscription counters.
#[derive(Default, Clone, Copy, Debug, Serialize)]
pub struct SubscribeTrackMetrics {
    pub last_sample_time: u64,

    /// Sum of payload bytes received.
    pub bytes_received: u64,
    /// Count of objects received.
    pub objects_received: u64,
}

/// Egress counters for one publish track's data context.
#[derive(Default, Clone, Copy, Debug, Serialize)]
pub struct DataContextMetrics {
    pub tx_dgrams: u64,
    pub tx_dgram_bytes: u64,
    pub tx_stream_objects: u64,
    pub tx_stream_bytes: u64,

    /// Objects dropped on a reset-and-replace stream transition.
    pub tx_buffer_drops: u64,
    /// Objects discarded by a queue clear on stream transition.
    pub tx_queue_discards: u64,
    /// Objects expired in queue before transmission.
    pub tx_queue_expired: u64,

    /// Queue depth observed at each enqueue, within the sample window.
    pub tx_queue_size: MinMaxAvg,
    /// Time spent in queue per transmitted object (us), within the window.
    pub tx_object_duration_us: MinMaxAvg,
}

impl DataContextMetrics {
    /// Fold a window into the running totals and reset the aggregates.
    pub fn end_window(&mut self) {
        self.tx_queue_size.reset();
        self.tx_object_duration_us.reset();
    }
}

/// Per-publish-track counters.
#[derive(Default, Clone, Copy, Debug, Serialize)]
pub struct PublishTrackMetrics {
    pub last_sample_time: u64,

    /// Sum of payload bytes published.
    pub bytes_published: u64,
    /// Count of objects published.
    pub objects_published: u64,

    /// Objects dropped because the handler status was not OK.
    pub objects_dropped_not_ok: u64,

    /// Egress counters from the track's data context.
    pub quic: DataContextMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_avg() {
        let mut agg = MinMaxAvg::default();

        agg.sample(10);
        agg.sample(30);
        agg.sample(20);

        assert_eq!(agg.min, 10);
        assert_eq!(agg.max, 30);
        assert_eq!(agg.avg, 20);
        assert_eq!(agg.count(), 3);

        agg.reset();
        assert_eq!(agg.count(), 0);

        agg.sample(5);
        assert_eq!(agg.min, 5);
        assert_eq!(agg.max, 5);
        assert_eq!(agg.avg, 5);
    }
}
