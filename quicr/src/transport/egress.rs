use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Buf, Bytes};
use tokio::sync::Notify;

use super::{Popped, PriorityQueue, QueueError, TickService};
use crate::metrics::DataContextMetrics;

/// Handle for one logical egress flow: one track, one stream mode, one
/// priority class.
pub type DataContextId = u64;

/// Default per-context queue depth.
pub const TX_QUEUE_LIMIT: usize = 2048;

/// Per-enqueue behavior bits.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EnqueueFlags {
    /// Send on a stream rather than as a datagram.
    pub use_reliable: bool,

    /// Close the context's current stream and open a fresh one first.
    pub new_stream: bool,

    /// Discard anything still queued before accepting this entry.
    pub clear_tx_queue: bool,

    /// When replacing the stream, reset it instead of finishing it.
    pub use_reset: bool,
}

/// What to do with the current stream when a context goes away.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StreamAction {
    #[default]
    None,
    ReplaceWithReset,
    ReplaceWithFin,
}

/// One queued unit: a fully framed object (header included when the entry
/// opens a stream). The scheduler writes entries whole, so two objects'
/// payload bytes are never interleaved on a stream.
pub struct ConnData {
    pub group_id: u64,
    pub subgroup_id: u64,
    pub data: Bytes,
    pub priority: u8,
    pub flags: EnqueueFlags,
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum TransportError {
    #[error("unknown data context: {0}")]
    UnknownDataContext(DataContextId),

    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("webtransport session: {0}")]
    Session(#[from] web_transport::SessionError),

    #[error("webtransport write: {0}")]
    Write(#[from] web_transport::WriteError),
}

struct DataContext {
    reliable: bool,
    priority: u8,
    queue: PriorityQueue<ConnData>,
    stream: Option<web_transport::SendStream>,
    /// The smallest priority value written to the current stream; the
    /// send order already applied to it.
    stream_priority: Option<u8>,
    metrics: DataContextMetrics,
}

#[derive(Default)]
struct Shared {
    contexts: HashMap<DataContextId, DataContext>,
    next_id: DataContextId,
}

enum Next {
    Send {
        ctx_id: DataContextId,
        item: ConnData,
    },
    Wait(u64),
    Idle,
}

/// The egress half of the QUIC transport for one connection.
///
/// Cheaply cloneable; the session spawns [Transport::run] once to drain all
/// contexts while handlers enqueue from anywhere.
#[derive(Clone)]
pub struct Transport {
    session: web_transport::Session,
    shared: Arc<Mutex<Shared>>,
    notify: Arc<Notify>,
    tick: Arc<TickService>,
}

impl Transport {
    pub fn new(session: web_transport::Session, tick: Arc<TickService>) -> Self {
        Self {
            session,
            shared: Default::default(),
            notify: Arc::new(Notify::new()),
            tick,
        }
    }

    pub fn tick(&self) -> Arc<TickService> {
        self.tick.clone()
    }

    /// Create an egress flow. `reliable` elects streams vs datagrams;
    /// `priority` is the default priority for its streams.
    pub fn create_data_context(&self, reliable: bool, priority: u8) -> DataContextId {
        let mut shared = self.shared.lock().unwrap();

        let ctx_id = shared.next_id;
        shared.next_id += 1;

        shared.contexts.insert(
            ctx_id,
            DataContext {
                reliable,
                priority,
                queue: PriorityQueue::new(self.tick.clone(), TX_QUEUE_LIMIT),
                stream: None,
                stream_priority: None,
                metrics: Default::default(),
            },
        );

        ctx_id
    }

    /// Queue framed bytes for transmission.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue(
        &self,
        ctx_id: DataContextId,
        group_id: u64,
        subgroup_id: u64,
        data: Bytes,
        priority: u8,
        ttl_ms: Option<u32>,
        delay_ms: u32,
        flags: EnqueueFlags,
    ) -> Result<(), TransportError> {
        let mut shared = self.shared.lock().unwrap();
        let ctx = shared
            .contexts
            .get_mut(&ctx_id)
            .ok_or(TransportError::UnknownDataContext(ctx_id))?;

        if flags.clear_tx_queue {
            ctx.queue.clear();
            ctx.metrics.tx_queue_discards += ctx.queue.take_discarded();
        }

        ctx.queue.push(
            ConnData {
                group_id,
                subgroup_id,
                data,
                priority,
                flags,
            },
            priority,
            ttl_ms,
            delay_ms,
        )?;

        let depth = ctx.queue.len() as u64;
        ctx.metrics.tx_queue_size.sample(depth);

        drop(shared);
        self.notify.notify_one();

        Ok(())
    }

    /// Tear a context down, applying `action` to its current stream.
    /// Returns how many queued entries were dropped.
    pub fn close_context(&self, ctx_id: DataContextId, action: StreamAction) -> usize {
        let ctx = self.shared.lock().unwrap().contexts.remove(&ctx_id);

        let Some(mut ctx) = ctx else { return 0 };

        let dropped = ctx.queue.clear();
        if let Some(mut stream) = ctx.stream.take() {
            if action == StreamAction::ReplaceWithReset {
                stream.reset(0);
            }
            // FIN on drop otherwise.
        }

        dropped
    }

    /// Snapshot a context's egress metrics, folding in the queue counters.
    pub fn metrics(&self, ctx_id: DataContextId) -> Option<DataContextMetrics> {
        let mut shared = self.shared.lock().unwrap();
        let ctx = shared.contexts.get_mut(&ctx_id)?;

        ctx.metrics.tx_queue_expired += ctx.queue.take_expired();
        ctx.metrics.tx_queue_discards += ctx.queue.take_discarded();

        let snapshot = ctx.metrics;
        ctx.metrics.end_window();
        Some(snapshot)
    }

    /// Drain queued objects onto streams and datagrams until the session
    /// dies. Runs as a single task per connection, so objects leave whole
    /// and in priority order.
    pub async fn run(mut self) -> Result<(), TransportError> {
        loop {
            match self.pop_next() {
                Next::Send { ctx_id, item } => self.send(ctx_id, item).await?,
                Next::Wait(ms) => {
                    tokio::select! {
                        _ = self.notify.notified() => (),
                        _ = tokio::time::sleep(Duration::from_millis(ms)) => (),
                    }
                }
                Next::Idle => self.notify.notified().await,
            }
        }
    }

    fn pop_next(&self) -> Next {
        let mut shared = self.shared.lock().unwrap();
        let mut min_wait: Option<u64> = None;

        for (&ctx_id, ctx) in shared.contexts.iter_mut() {
            let popped = ctx.queue.pop();
            ctx.metrics.tx_queue_expired += ctx.queue.take_expired();

            match popped {
                Popped::Item { value, queued_ms } => {
                    ctx.metrics
                        .tx_object_duration_us
                        .sample(queued_ms * 1_000);
                    return Next::Send {
                        ctx_id,
                        item: value,
                    };
                }
                Popped::Waiting(wait) => {
                    min_wait = Some(min_wait.map_or(wait, |w| w.min(wait)));
                }
                Popped::Empty => (),
            }
        }

        match min_wait {
            Some(wait) => Next::Wait(wait),
            None => Next::Idle,
        }
    }

    async fn send(&mut self, ctx_id: DataContextId, item: ConnData) -> Result<(), TransportError> {
        let (reliable, default_priority) = {
            let shared = self.shared.lock().unwrap();
            match shared.contexts.get(&ctx_id) {
                Some(ctx) => (ctx.reliable, ctx.priority),
                // Context was torn down while the item was in flight.
                None => return Ok(()),
            }
        };

        if !reliable || !item.flags.use_reliable {
            let size = item.data.len() as u64;
            self.session.send_datagram(item.data).await?;

            if let Some(ctx) = self.shared.lock().unwrap().contexts.get_mut(&ctx_id) {
                ctx.metrics.tx_dgrams += 1;
                ctx.metrics.tx_dgram_bytes += size;
            }
            return Ok(());
        }

        // Stream path: replace the current stream at announced boundaries.
        let (stream, mut applied_priority) = {
            let mut shared = self.shared.lock().unwrap();
            let ctx = match shared.contexts.get_mut(&ctx_id) {
                Some(ctx) => ctx,
                None => return Ok(()),
            };

            match ctx.stream.take() {
                Some(mut stream) if item.flags.new_stream => {
                    if item.flags.use_reset {
                        stream.reset(0);
                        ctx.metrics.tx_buffer_drops += 1;
                    }
                    // FIN on drop otherwise.
                    ctx.stream_priority = None;
                    (None, None)
                }
                other => (other, ctx.stream_priority),
            }
        };

        let mut stream = match stream {
            Some(stream) => stream,
            None => self.session.open_uni().await?,
        };

        // A stream's priority is the smallest value among its objects, so
        // retune the send order whenever a more urgent object lands on it.
        // Smaller value is higher priority on the wire; the QUIC stack
        // transmits larger send orders first.
        let priority = item.priority.min(default_priority);
        if applied_priority.map_or(true, |applied| priority < applied) {
            stream.set_priority(-(priority as i32));
            applied_priority = Some(priority);
        }

        let size = item.data.len() as u64;
        let mut data = item.data;
        while data.has_remaining() {
            stream.write_buf(&mut data).await?;
        }

        if let Some(ctx) = self.shared.lock().unwrap().contexts.get_mut(&ctx_id) {
            ctx.metrics.tx_stream_objects += 1;
            ctx.metrics.tx_stream_bytes += size;
            ctx.stream = Some(stream);
            ctx.stream_priority = applied_priority;
        }
        // If the context disappeared meanwhile the stream drops with a FIN.

        Ok(())
    }
}
