//! The connection state machine: setup handshake, control message
//! dispatch, data stream routing and the background tasks that drive one
//! connection.

mod announce;
mod error;
mod fetch;
mod fetch_requested;
mod publisher;
mod reader;
mod request;
mod subscribe;
mod subscribed;
mod subscriber;
mod track_status;
mod writer;

pub use announce::*;
pub use error::*;
pub use fetch::*;
pub use fetch_requested::*;
pub use publisher::*;
pub use subscribe::*;
pub use subscribed::*;
pub use subscriber::*;
pub use track_status::*;

use reader::*;
use request::*;
use writer::*;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{stream::FuturesUnordered, StreamExt};

use crate::message::Message;
use crate::metrics::{ConnectionMetrics, METRICS_SAMPLE_PERIOD_MS};
use crate::setup::{self, ParameterType, Version};
use crate::transport::{TickService, Transport};
use crate::watch::{Queue, State};

/// How long a draining peer gets to close after GoAway.
pub const GOAWAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection lifecycle, watchable via [Session::status].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    PendingServerSetup,
    Ready,
    Draining,
    Closed,
}

/// A watch on the connection lifecycle.
#[derive(Clone)]
pub struct SessionWatch {
    status: State<SessionStatus>,
}

impl SessionWatch {
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Wait for the next status change.
    pub async fn changed(&self) -> SessionStatus {
        if let Some(modified) = self.status.lock().modified() {
            modified.await;
        }
        *self.status.lock()
    }
}

#[must_use = "run() must be called"]
pub struct Session {
    webtransport: web_transport::Session,

    sender: Writer,
    recver: Reader,

    publisher: Publisher,
    subscriber: Subscriber,

    outgoing: Queue<Message>,
    transport: Transport,
    requests: Arc<RequestIds>,

    status: State<SessionStatus>,
    goaway: State<Option<tokio::time::Instant>>,
    metrics: Arc<Mutex<ConnectionMetrics>>,
    tick: Arc<TickService>,

    pub version: Version,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    fn new(
        webtransport: web_transport::Session,
        sender: Writer,
        recver: Reader,
        requests: Arc<RequestIds>,
        status: State<SessionStatus>,
        version: Version,
    ) -> (Self, Publisher, Subscriber) {
        let tick = TickService::new();
        let transport = Transport::new(webtransport.clone(), tick.clone());
        let metrics = Arc::new(Mutex::new(ConnectionMetrics::default()));

        let outgoing = Queue::default().split();
        let publisher = Publisher::new(
            outgoing.0.clone(),
            webtransport.clone(),
            transport.clone(),
            requests.clone(),
        );
        let subscriber = Subscriber::new(outgoing.0, requests.clone(), metrics.clone());

        let session = Self {
            webtransport,
            sender,
            recver,
            publisher: publisher.clone(),
            subscriber: subscriber.clone(),
            outgoing: outgoing.1,
            transport,
            requests,
            status,
            goaway: State::new(None),
            metrics,
            tick,
            version,
        };

        (session, publisher, subscriber)
    }

    /// Open the control stream and perform the client side of the setup
    /// handshake.
    pub async fn connect(
        mut session: web_transport::Session,
        endpoint_id: &str,
    ) -> Result<(Session, Publisher, Subscriber), SessionError> {
        let status = State::new(SessionStatus::Connecting);

        let control = session.open_bi().await?;
        let mut sender = Writer::new(control.0);
        let mut recver = Reader::new(control.1);

        let client = setup::Client::new(Version::SUPPORTED.into(), endpoint_id);
        log::debug!("sending CLIENT_SETUP: {:?}", client);
        sender.encode(&Message::ClientSetup(client)).await?;

        if let Some(mut status) = status.lock_mut() {
            *status = SessionStatus::PendingServerSetup;
        }

        let server = match recver.decode().await? {
            Message::ServerSetup(server) => server,
            _ => return Err(SessionError::ProtocolViolation("expected SERVER_SETUP")),
        };
        log::debug!("received SERVER_SETUP: {:?}", server);

        if !Version::SUPPORTED.contains(&server.selected_version) {
            return Err(SessionError::Version(
                [server.selected_version].into(),
                Version::SUPPORTED.into(),
            ));
        }

        let requests = Arc::new(RequestIds::new(true));
        if let Some(max) = server.params.get_int(ParameterType::MaxRequestId.into()) {
            requests.set_max(max);
        }

        if let Some(mut status) = status.lock_mut() {
            *status = SessionStatus::Ready;
        }

        Ok(Self::new(
            session,
            sender,
            recver,
            requests,
            status,
            server.selected_version,
        ))
    }

    /// Accept the control stream and perform the server side of the setup
    /// handshake.
    pub async fn accept(
        mut session: web_transport::Session,
        endpoint_id: &str,
    ) -> Result<(Session, Publisher, Subscriber), SessionError> {
        let status = State::new(SessionStatus::Connecting);

        let control = session.accept_bi().await?;
        let mut sender = Writer::new(control.0);
        let mut recver = Reader::new(control.1);

        // The first control message MUST be the client setup.
        let client = match recver.decode().await? {
            Message::ClientSetup(client) => client,
            _ => return Err(SessionError::ProtocolViolation("expected CLIENT_SETUP")),
        };
        log::debug!("received CLIENT_SETUP: {:?}", client);

        if client.versions.is_empty() {
            return Err(SessionError::ProtocolViolation("no versions offered"));
        }

        let version = client
            .versions
            .select(&Version::SUPPORTED)
            .ok_or_else(|| {
                SessionError::Version(client.versions.clone(), Version::SUPPORTED.into())
            })?;

        let server = setup::Server::new(version, endpoint_id);
        log::debug!("sending SERVER_SETUP: {:?}", server);
        sender.encode(&Message::ServerSetup(server)).await?;

        let requests = Arc::new(RequestIds::new(false));
        if let Some(max) = client.params.get_int(ParameterType::MaxRequestId.into()) {
            requests.set_max(max);
        }

        if let Some(mut status) = status.lock_mut() {
            *status = SessionStatus::Ready;
        }

        Ok(Self::new(session, sender, recver, requests, status, version))
    }

    /// Watch the connection lifecycle.
    pub fn status(&self) -> SessionWatch {
        SessionWatch {
            status: self.status.clone(),
        }
    }

    pub fn metrics(&self) -> ConnectionMetrics {
        *self.metrics.lock().unwrap()
    }

    /// Close the connection with an application code.
    pub fn close(&mut self, code: u32, reason: &str) {
        if let Some(mut status) = self.status.lock_mut() {
            *status = SessionStatus::Closed;
        }
        self.webtransport.clone().close(code, reason);
    }

    /// Drive the connection until it dies. Closes the connection with the
    /// matching termination code on a fatal error.
    pub async fn run(self) -> Result<(), SessionError> {
        let mut webtransport = self.webtransport.clone();
        let status = self.status.clone();

        let res = tokio::select! {
            res = Self::run_recv(
                self.recver,
                self.publisher.clone(),
                self.subscriber.clone(),
                self.requests.clone(),
                self.status.clone(),
                self.goaway.clone(),
            ) => res,
            res = Self::run_send(self.sender, self.outgoing) => res,
            res = Self::run_streams(self.webtransport.clone(), self.subscriber.clone()) => res,
            res = Self::run_datagrams(self.webtransport, self.subscriber.clone()) => res,
            res = self.transport.clone().run() => res.map_err(Into::into),
            res = Self::run_goaway(self.goaway.clone()) => res,
            res = Self::run_metrics(
                self.publisher,
                self.subscriber,
                self.transport,
                self.metrics,
                self.tick,
            ) => res,
        };

        if let Err(err) = &res {
            log::warn!("session terminated: {}", err);
            webtransport.close(err.code() as u32, &err.to_string());
        }

        if let Some(mut status) = status.lock_mut() {
            *status = SessionStatus::Closed;
        }

        res
    }

    async fn run_send(
        mut sender: Writer,
        mut outgoing: Queue<Message>,
    ) -> Result<(), SessionError> {
        while let Some(msg) = outgoing.pop().await {
            log::debug!("sending message: {:?}", msg);
            sender.encode(&msg).await?;
        }

        Ok(())
    }

    async fn run_recv(
        mut recver: Reader,
        mut publisher: Publisher,
        mut subscriber: Subscriber,
        requests: Arc<RequestIds>,
        status: State<SessionStatus>,
        goaway: State<Option<tokio::time::Instant>>,
    ) -> Result<(), SessionError> {
        loop {
            let msg: Message = recver.decode().await?;
            log::debug!("received message: {:?}", msg);

            // Session-level messages first.
            let msg = match msg {
                Message::ClientSetup(_) | Message::ServerSetup(_) => {
                    return Err(SessionError::ProtocolViolation("setup after handshake"));
                }
                Message::GoAway(msg) => {
                    log::info!("peer is going away: uri={:?}", msg.new_session_uri.0);
                    if let Some(mut status) = status.lock_mut() {
                        *status = SessionStatus::Draining;
                    }
                    if let Some(mut goaway) = goaway.lock_mut() {
                        *goaway = Some(tokio::time::Instant::now() + GOAWAY_DRAIN_TIMEOUT);
                    }
                    continue;
                }
                Message::MaxRequestId(msg) => {
                    requests.set_max(msg.id);
                    continue;
                }
                Message::RequestsBlocked(msg) => {
                    log::debug!("peer blocked on request ids: max={}", msg.max_request_id);
                    continue;
                }
                msg => msg,
            };

            // Then messages a publisher sends, handled by our subscriber half.
            let msg = match TryInto::<crate::message::Publisher>::try_into(msg) {
                Ok(msg) => {
                    subscriber.recv_message(msg)?;
                    continue;
                }
                Err(msg) => msg,
            };

            // Then messages a subscriber sends, handled by our publisher half.
            match TryInto::<crate::message::Subscriber>::try_into(msg) {
                Ok(msg) => publisher.recv_message(msg)?,
                Err(msg) => {
                    log::error!("no handler for message: {:?}", msg);
                    return Err(SessionError::ProtocolViolation("unhandled message"));
                }
            }
        }
    }

    async fn run_streams(
        mut webtransport: web_transport::Session,
        subscriber: Subscriber,
    ) -> Result<(), SessionError> {
        let mut tasks = FuturesUnordered::new();

        loop {
            tokio::select! {
                res = webtransport.accept_uni() => {
                    let stream = res?;
                    let subscriber = subscriber.clone();

                    tasks.push(async move {
                        if let Err(err) = subscriber.recv_stream(stream).await {
                            log::warn!("failed to serve stream: {}", err);
                        };
                    });
                },
                _ = tasks.next(), if !tasks.is_empty() => {},
            };
        }
    }

    async fn run_datagrams(
        mut webtransport: web_transport::Session,
        mut subscriber: Subscriber,
    ) -> Result<(), SessionError> {
        loop {
            let datagram = webtransport.recv_datagram().await?;
            subscriber.recv_datagram(datagram)?;
        }
    }

    async fn run_goaway(
        goaway: State<Option<tokio::time::Instant>>,
    ) -> Result<(), SessionError> {
        // Wait for a drain deadline to appear, then enforce it.
        let deadline = loop {
            {
                let state = goaway.lock();
                if let Some(deadline) = *state {
                    break deadline;
                }
                match state.modified() {
                    Some(notified) => notified,
                    None => return Ok(()),
                }
            }
            .await;
        };

        tokio::time::sleep_until(deadline).await;
        Err(SessionError::GoAwayTimeout)
    }

    async fn run_metrics(
        publisher: Publisher,
        subscriber: Subscriber,
        transport: Transport,
        metrics: Arc<Mutex<ConnectionMetrics>>,
        tick: Arc<TickService>,
    ) -> Result<(), SessionError> {
        let mut interval =
            tokio::time::interval(Duration::from_millis(METRICS_SAMPLE_PERIOD_MS));

        loop {
            interval.tick().await;

            let now_us = tick.microseconds();
            metrics.lock().unwrap().last_sample_time = now_us;
            publisher.sample_metrics(now_us, &transport);
            subscriber.sample_metrics(now_us);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn goaway_drain_timeout() {
        let goaway = State::new(None);

        let task = tokio::spawn(Session::run_goaway(goaway.clone()));
        tokio::task::yield_now().await;

        // The peer announced GoAway; the drain clock starts.
        if let Some(mut state) = goaway.lock_mut() {
            *state = Some(tokio::time::Instant::now() + GOAWAY_DRAIN_TIMEOUT);
        }

        tokio::time::advance(GOAWAY_DRAIN_TIMEOUT + Duration::from_millis(10)).await;

        let res = task.await.unwrap();
        assert!(matches!(res.unwrap_err(), SessionError::GoAwayTimeout));
    }
}
