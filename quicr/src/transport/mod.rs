//! The egress side of the QUIC transport: data contexts, the priority
//! queue, and the drain task that elects streams vs datagrams.
//!
//! The session enqueues fully framed object bytes; this module owns when
//! and on which stream they leave. Congestion shows up as backpressure on
//! the stream write, during which queued objects keep aging and expiring.

mod egress;
mod priority_queue;
mod tick;

pub use egress::*;
pub use priority_queue::*;
pub use tick::*;
