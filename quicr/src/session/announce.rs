use std::{collections::VecDeque, ops};

use crate::coding::{ReasonPhrase, TrackNamespace};
use crate::message;
use crate::serve::ServeError;
use crate::watch::State;

use super::{Publisher, Subscribed, TrackStatusRequested};

#[derive(Debug, Clone)]
pub struct AnnounceInfo {
    pub request_id: u64,
    pub namespace: TrackNamespace,
}

pub(super) struct AnnounceState {
    subscribers: VecDeque<Subscribed>,
    track_statuses: VecDeque<TrackStatusRequested>,
    ok: bool,
    closed: Result<(), ServeError>,
}

impl Default for AnnounceState {
    fn default() -> Self {
        Self {
            subscribers: Default::default(),
            track_statuses: Default::default(),
            ok: false,
            closed: Ok(()),
        }
    }
}

impl Drop for AnnounceState {
    fn drop(&mut self) {
        for subscriber in self.subscribers.drain(..) {
            subscriber.reject(ServeError::NotFound).ok();
        }
    }
}

/// An outbound namespace announcement. Unannounces on drop.
#[must_use = "unannounce on drop"]
pub struct Announce {
    publisher: Publisher,
    state: State<AnnounceState>,

    pub info: AnnounceInfo,
}

impl Announce {
    pub(super) fn new(
        mut publisher: Publisher,
        request_id: u64,
        namespace: TrackNamespace,
    ) -> (Announce, AnnounceRecv) {
        let info = AnnounceInfo {
            request_id,
            namespace: namespace.clone(),
        };

        publisher.send_message(message::Announce {
            id: request_id,
            track_namespace: namespace,
            params: Default::default(),
        });

        let (send, recv) = State::default().split();

        let send = Self {
            publisher,
            info,
            state: send,
        };
        let recv = AnnounceRecv {
            state: recv,
            request_id,
        };

        (send, recv)
    }

    /// Wait until an AnnounceOk is received.
    pub async fn ok(&self) -> Result<(), ServeError> {
        loop {
            {
                let state = self.state.lock();
                if state.ok {
                    return Ok(());
                }
                state.closed.clone()?;

                match state.modified() {
                    Some(notified) => notified,
                    None => return Ok(()),
                }
            }
            .await;
        }
    }

    /// Run until an error is received.
    pub async fn closed(&self) -> Result<(), ServeError> {
        loop {
            {
                let state = self.state.lock();
                state.closed.clone()?;

                match state.modified() {
                    Some(notified) => notified,
                    None => return Ok(()),
                }
            }
            .await;
        }
    }

    /// The next subscription routed to this namespace.
    pub async fn subscribed(&self) -> Result<Option<Subscribed>, ServeError> {
        loop {
            {
                let state = self.state.lock();
                if !state.subscribers.is_empty() {
                    return Ok(state
                        .into_mut()
                        .and_then(|mut state| state.subscribers.pop_front()));
                }

                state.closed.clone()?;
                match state.modified() {
                    Some(notified) => notified,
                    None => return Ok(None),
                }
            }
            .await;
        }
    }

    /// The next track status request for this namespace.
    pub async fn track_status_requested(&self) -> Result<Option<TrackStatusRequested>, ServeError> {
        loop {
            {
                let state = self.state.lock();
                if !state.track_statuses.is_empty() {
                    return Ok(state
                        .into_mut()
                        .and_then(|mut state| state.track_statuses.pop_front()));
                }

                state.closed.clone()?;
                match state.modified() {
                    Some(notified) => notified,
                    None => return Ok(None),
                }
            }
            .await;
        }
    }

}

impl Drop for Announce {
    fn drop(&mut self) {
        if self.state.lock().closed.is_err() {
            return;
        }

        self.publisher.send_message(message::Unannounce {
            track_namespace: self.namespace.clone(),
        });
    }
}

impl ops::Deref for Announce {
    type Target = AnnounceInfo;

    fn deref(&self) -> &Self::Target {
        &self.info
    }
}

pub(super) struct AnnounceRecv {
    state: State<AnnounceState>,
    pub request_id: u64,
}

impl AnnounceRecv {
    pub fn recv_ok(&mut self) -> Result<(), ServeError> {
        if let Some(mut state) = self.state.lock_mut() {
            if state.ok {
                return Err(ServeError::Duplicate);
            }

            state.ok = true;
        }

        Ok(())
    }

    pub fn recv_error(self, err: ServeError) -> Result<(), ServeError> {
        let state = self.state.lock();
        state.closed.clone()?;

        let mut state = state.into_mut().ok_or(ServeError::Done)?;
        state.closed = Err(err);

        Ok(())
    }

    pub fn recv_subscribe(&mut self, subscriber: Subscribed) -> Result<(), ServeError> {
        let mut state = self.state.lock_mut().ok_or(ServeError::Done)?;
        state.subscribers.push_back(subscriber);

        Ok(())
    }

    pub fn recv_track_status_requested(
        &mut self,
        request: TrackStatusRequested,
    ) -> Result<(), ServeError> {
        let mut state = self.state.lock_mut().ok_or(ServeError::Done)?;
        state.track_statuses.push_back(request);
        Ok(())
    }

}

/// An inbound namespace announcement, delivered by
/// [super::Subscriber::announced].
pub struct Announced {
    subscriber: super::Subscriber,
    state: State<AnnouncedState>,

    pub info: AnnounceInfo,

    ok: bool,
    error: Option<ServeError>,
}

#[derive(Default)]
pub(super) struct AnnouncedState {}

impl Announced {
    pub(super) fn new(
        subscriber: super::Subscriber,
        request_id: u64,
        namespace: TrackNamespace,
    ) -> (Announced, AnnouncedRecv) {
        let info = AnnounceInfo {
            request_id,
            namespace,
        };

        let (send, recv) = State::default().split();
        let send = Self {
            subscriber,
            info,
            ok: false,
            error: None,
            state: send,
        };
        let recv = AnnouncedRecv { _state: recv };

        (send, recv)
    }

    /// Accept the announcement.
    pub fn ok(&mut self) -> Result<(), ServeError> {
        if self.ok {
            return Err(ServeError::Duplicate);
        }

        self.subscriber.send_message(message::AnnounceOk {
            id: self.info.request_id,
        });

        self.ok = true;

        Ok(())
    }

    /// Run until the publisher unannounces.
    pub async fn closed(&self) -> Result<(), ServeError> {
        loop {
            self.state
                .lock()
                .modified()
                .ok_or(ServeError::Cancel)?
                .await;
        }
    }

    pub fn close(mut self, err: ServeError) -> Result<(), ServeError> {
        self.error = Some(err);
        Ok(())
    }
}

impl ops::Deref for Announced {
    type Target = AnnounceInfo;

    fn deref(&self) -> &AnnounceInfo {
        &self.info
    }
}

impl Drop for Announced {
    fn drop(&mut self) {
        let err = self.error.clone().unwrap_or(ServeError::Done);

        if self.ok {
            self.subscriber.send_message(message::AnnounceCancel {
                track_namespace: self.namespace.clone(),
                error_code: err.code(),
                reason: ReasonPhrase(err.to_string()),
            });
        } else {
            self.subscriber.send_message(message::AnnounceError {
                id: self.info.request_id,
                error_code: err.code(),
                reason: ReasonPhrase(err.to_string()),
            });
        }
    }
}

pub(super) struct AnnouncedRecv {
    _state: State<AnnouncedState>,
}

impl AnnouncedRecv {
    pub fn recv_unannounce(self) -> Result<(), ServeError> {
        // Dropping the state wakes anyone in closed().
        Ok(())
    }
}
