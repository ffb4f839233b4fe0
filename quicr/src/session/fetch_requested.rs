use crate::cache::CacheObject;
use crate::coding::ReasonPhrase;
use crate::data;
use crate::message::{self, GroupOrder};
use crate::serve::ServeError;
use crate::watch::State;

use super::{Publisher, SessionError, Writer};

#[derive(Default)]
pub(super) struct FetchCancelState {
    pub cancelled: bool,
}

pub(super) struct FetchRequestedRecv {
    pub state: State<FetchCancelState>,
}

impl FetchRequestedRecv {
    pub fn recv_cancel(&mut self) {
        if let Some(mut state) = self.state.lock_mut() {
            state.cancelled = true;
        }
    }
}

/// An inbound fetch, served from cached objects over a dedicated stream.
///
/// The fetch stream bypasses the egress queue: historical replay is bulk
/// data whose priority is applied at the QUIC stream level.
pub struct FetchRequested {
    publisher: Publisher,
    cancel: State<FetchCancelState>,
    responded: bool,

    pub msg: message::Fetch,
}

impl FetchRequested {
    pub(super) fn new(publisher: Publisher, msg: message::Fetch) -> (Self, FetchRequestedRecv) {
        let (send, recv) = State::default().split();

        let requested = Self {
            publisher,
            cancel: send,
            responded: false,
            msg,
        };

        (requested, FetchRequestedRecv { state: recv })
    }

    pub fn error(mut self, err: ServeError) -> Result<(), SessionError> {
        self.responded = true;
        self.publisher.send_message(message::FetchError {
            id: self.msg.id,
            error_code: err.code(),
            reason: ReasonPhrase(err.to_string()),
        });
        Ok(())
    }

    /// Send FetchOk and stream the objects in the requested group order,
    /// ending with a clean FIN.
    pub async fn serve(
        mut self,
        mut objects: Vec<CacheObject>,
        end_of_track: bool,
    ) -> Result<(), SessionError> {
        if objects.is_empty() {
            return self.error(ServeError::NoObjects);
        }

        let group_order = match self.msg.group_order {
            GroupOrder::Descending => GroupOrder::Descending,
            _ => GroupOrder::Ascending,
        };

        // Objects ascend within a group either way.
        objects.sort_by_key(|object| object.headers.location());
        let end_location = objects
            .last()
            .map(|object| object.headers.location())
            .unwrap_or_default();
        if group_order == GroupOrder::Descending {
            objects.sort_by(|a, b| {
                b.headers
                    .group_id
                    .cmp(&a.headers.group_id)
                    .then(a.headers.object_id.cmp(&b.headers.object_id))
            });
        }

        self.responded = true;
        self.publisher.send_message(message::FetchOk {
            id: self.msg.id,
            group_order,
            end_of_track,
            end_location,
            params: Default::default(),
        });

        let stream = self.publisher.open_uni().await?;
        let mut writer = Writer::new(stream);
        writer.set_priority(-(self.msg.subscriber_priority as i32));

        writer
            .encode(&data::FetchHeader {
                request_id: self.msg.id,
            })
            .await?;

        for object in objects {
            if self.cancelled() {
                log::debug!("fetch cancelled: id={}", self.msg.id);
                break;
            }

            let headers = object.headers;
            writer
                .encode(&data::FetchObject {
                    group_id: headers.group_id,
                    subgroup_id: headers.subgroup_id.unwrap_or(0),
                    object_id: headers.object_id,
                    publisher_priority: headers.priority,
                    extension_headers: headers.extensions.clone().unwrap_or_default(),
                    status: Some(headers.status),
                    payload: object.payload,
                })
                .await?;
        }

        // FIN on drop.
        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.cancel.lock().cancelled
    }
}

impl Drop for FetchRequested {
    fn drop(&mut self) {
        if !self.responded {
            self.publisher.send_message(message::FetchError {
                id: self.msg.id,
                error_code: ServeError::NotFound.code(),
                reason: ReasonPhrase("unknown track".to_string()),
            });
        }
        self.publisher.drop_fetch_requested(self.msg.id);
    }
}
