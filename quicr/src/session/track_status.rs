use crate::coding::{Location, ReasonPhrase};
use crate::message::{self, GroupOrder};
use crate::serve::ServeError;
use crate::watch::State;

use super::{Publisher, Subscriber};

/// What the publisher reported in TrackStatusOk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackStatusInfo {
    pub track_alias: u64,
    pub expires: u64,
    pub group_order: GroupOrder,
    pub largest: Option<Location>,
}

pub(super) struct TrackStatusState {
    pub response: Option<TrackStatusInfo>,
    pub closed: Result<(), ServeError>,
}

impl Default for TrackStatusState {
    fn default() -> Self {
        Self {
            response: None,
            closed: Ok(()),
        }
    }
}

/// An outbound track status request.
pub struct TrackStatus {
    state: State<TrackStatusState>,

    pub request_id: u64,
}

impl TrackStatus {
    pub(super) fn new(state: State<TrackStatusState>, request_id: u64) -> Self {
        Self { state, request_id }
    }

    /// Wait for the publisher's answer.
    pub async fn response(&self) -> Result<TrackStatusInfo, ServeError> {
        loop {
            {
                let state = self.state.lock();
                if let Some(response) = state.response {
                    return Ok(response);
                }
                state.closed.clone()?;

                match state.modified() {
                    Some(notified) => notified,
                    None => return Err(ServeError::Done),
                }
            }
            .await;
        }
    }
}

pub(super) struct TrackStatusRecv {
    pub state: State<TrackStatusState>,
}

impl TrackStatusRecv {
    pub fn recv_ok(&mut self, msg: &message::TrackStatusOk) -> Result<(), ServeError> {
        let mut state = self.state.lock_mut().ok_or(ServeError::Cancel)?;
        state.response = Some(TrackStatusInfo {
            track_alias: msg.track_alias,
            expires: msg.expires,
            group_order: msg.group_order,
            largest: msg.largest_location,
        });
        Ok(())
    }

    pub fn recv_error(&mut self, err: ServeError) -> Result<(), ServeError> {
        let mut state = self.state.lock_mut().ok_or(ServeError::Cancel)?;
        if state.closed.is_ok() {
            state.closed = Err(err);
        }
        Ok(())
    }
}

/// An inbound track status request, answered from a track's cache state.
pub struct TrackStatusRequested {
    publisher: Publisher,
    responded: bool,

    pub msg: message::TrackStatusRequest,
}

impl TrackStatusRequested {
    pub(super) fn new(publisher: Publisher, msg: message::TrackStatusRequest) -> Self {
        Self {
            publisher,
            responded: false,
            msg,
        }
    }

    pub fn respond_ok(
        mut self,
        track_alias: u64,
        largest: Option<Location>,
    ) -> Result<(), ServeError> {
        self.responded = true;
        self.publisher.send_message(message::TrackStatusOk {
            id: self.msg.id,
            track_alias,
            expires: 0,
            group_order: GroupOrder::Ascending,
            content_exists: largest.is_some(),
            largest_location: largest,
            params: Default::default(),
        });
        Ok(())
    }

    pub fn respond_error(mut self, err: ServeError) -> Result<(), ServeError> {
        self.responded = true;
        self.publisher.send_message(message::TrackStatusError {
            id: self.msg.id,
            error_code: err.code(),
            reason: ReasonPhrase(err.to_string()),
        });
        Ok(())
    }
}

impl Drop for TrackStatusRequested {
    fn drop(&mut self) {
        // The dialog always completes; an unanswered request is an error.
        if !self.responded {
            self.publisher.send_message(message::TrackStatusError {
                id: self.msg.id,
                error_code: ServeError::NotFound.code(),
                reason: ReasonPhrase("unknown track".to_string()),
            });
        }
    }
}

/// Used by [Subscriber] to build the dialog pair.
pub(super) fn track_status_pair(
    subscriber: &mut Subscriber,
    request_id: u64,
    namespace: crate::coding::TrackNamespace,
    name: Vec<u8>,
) -> (TrackStatus, TrackStatusRecv) {
    subscriber.send_message(message::TrackStatusRequest {
        id: request_id,
        track_namespace: namespace,
        track_name: name,
        params: Default::default(),
    });

    let (send, recv) = State::default().split();
    (
        TrackStatus::new(send, request_id),
        TrackStatusRecv { state: recv },
    )
}
