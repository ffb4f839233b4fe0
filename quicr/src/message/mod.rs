//! Control messages sent over the bidirectional control stream.
//!
//! Every message is framed as `type (varint) | length (u16) | payload`.
//! Messages are processed in strict receive order; the only data that
//! bypasses the control stream are objects, which travel on dedicated
//! unidirectional streams or datagrams (see [crate::data]).

mod announce;
mod announce_cancel;
mod announce_error;
mod announce_ok;
mod fetch;
mod fetch_cancel;
mod fetch_error;
mod fetch_ok;
mod fetch_type;
mod filter_type;
mod go_away;
mod group_order;
mod max_request_id;
mod new_group_request;
mod publisher;
mod requests_blocked;
mod subscribe;
mod subscribe_announces;
mod subscribe_announces_error;
mod subscribe_announces_ok;
mod subscribe_done;
mod subscribe_error;
mod subscribe_ok;
mod subscribe_update;
mod subscriber;
mod track_status_error;
mod track_status_ok;
mod track_status_request;
mod unannounce;
mod unsubscribe;
mod unsubscribe_announces;

pub use announce::*;
pub use announce_cancel::*;
pub use announce_error::*;
pub use announce_ok::*;
pub use fetch::*;
pub use fetch_cancel::*;
pub use fetch_error::*;
pub use fetch_ok::*;
pub use fetch_type::*;
pub use filter_type::*;
pub use go_away::*;
pub use group_order::*;
pub use max_request_id::*;
pub use new_group_request::*;
pub use publisher::*;
pub use requests_blocked::*;
pub use subscribe::*;
pub use subscribe_announces::*;
pub use subscribe_announces_error::*;
pub use subscribe_announces_ok::*;
pub use subscribe_done::*;
pub use subscribe_error::*;
pub use subscribe_ok::*;
pub use subscribe_update::*;
pub use subscriber::*;
pub use track_status_error::*;
pub use track_status_ok::*;
pub use track_status_request::*;
pub use unannounce::*;
pub use unsubscribe::*;
pub use unsubscribe_announces::*;

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use crate::setup::{Client as ClientSetup, Server as ServerSetup};
use std::fmt;

// Generate the Message enum plus framing encode/decode rather than
// copy-pasting the dispatch for every type.
macro_rules! message_types {
    {$($name:ident = $val:expr,)*} => {
		/// All supported control messages.
		#[derive(Clone)]
		pub enum Message {
			$($name($name)),*
		}

		impl Decode for Message {
			fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
				let t = u64::decode(r)?;
				let len = u16::decode(r)? as usize;

				// Wait for the full payload, then decode from an exact view
				// so a length mismatch is always caught.
				Self::decode_remaining(r, len)?;
				let mut payload = r.copy_to_bytes(len);

				let msg = match t {
					$($val => {
						Self::$name($name::decode(&mut payload)?)
					})*
					_ => return Err(DecodeError::InvalidMessage(t)),
				};

				if !payload.is_empty() {
					return Err(DecodeError::LengthMismatch {
						declared: len,
						consumed: len - payload.len(),
					});
				}

				Ok(msg)
			}
		}

		impl Encode for Message {
			fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
				match self {
					$(Self::$name(ref m) => {
						self.id().encode(w)?;

						// Encode the payload to a scratch buffer first; the
						// length prefix is not known until after.
						let mut buf = Vec::new();
						m.encode(&mut buf)?;
						if buf.len() > u16::MAX as usize {
							return Err(EncodeError::MsgBoundsExceeded);
						}
						(buf.len() as u16).encode(w)?;

						Self::encode_remaining(w, buf.len())?;
						w.put_slice(&buf);
						Ok(())
					},)*
				}
			}
		}

		impl Message {
			pub fn id(&self) -> u64 {
				match self {
					$(Self::$name(_) => {
						$val
					},)*
				}
			}

			pub fn name(&self) -> &'static str {
				match self {
					$(Self::$name(_) => {
						stringify!($name)
					},)*
				}
			}
		}

		$(impl From<$name> for Message {
			fn from(m: $name) -> Self {
				Message::$name(m)
			}
		})*

		impl fmt::Debug for Message {
			// Delegate to the message formatter
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				match self {
					$(Self::$name(ref m) => m.fmt(f),)*
				}
			}
		}
    }
}

// Each message is prefixed with the given varint type.
message_types! {
    // SUBSCRIBE family, sent by subscriber
    SubscribeUpdate = 0x2,
    Subscribe = 0x3,
    Unsubscribe = 0xa,
    // SUBSCRIBE family, sent by publisher
    SubscribeOk = 0x4,
    SubscribeError = 0x5,
    SubscribeDone = 0xb,

    // ANNOUNCE family, sent by publisher
    Announce = 0x6,
    Unannounce = 0x9,
    // ANNOUNCE family, sent by subscriber
    AnnounceOk = 0x7,
    AnnounceError = 0x8,
    AnnounceCancel = 0xc,

    // TRACK_STATUS family, sent by subscriber
    TrackStatusRequest = 0xd,
    // TRACK_STATUS family, sent by publisher
    TrackStatusOk = 0xe,
    TrackStatusError = 0xf,

    // Session management
    GoAway = 0x10,
    MaxRequestId = 0x15,
    RequestsBlocked = 0x1a,

    // SUBSCRIBE_ANNOUNCES family, sent by subscriber
    SubscribeAnnounces = 0x11,
    UnsubscribeAnnounces = 0x14,
    // SUBSCRIBE_ANNOUNCES family, sent by publisher
    SubscribeAnnouncesOk = 0x12,
    SubscribeAnnouncesError = 0x13,

    // FETCH family, sent by subscriber
    Fetch = 0x16,
    FetchCancel = 0x17,
    // FETCH family, sent by publisher
    FetchOk = 0x18,
    FetchError = 0x19,

    // Subscriber asks the publisher to start a fresh group
    NewGroupRequest = 0x1b,

    // Setup handshake
    ClientSetup = 0x20,
    ServerSetup = 0x21,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::ReasonPhrase;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn frame_round_trip() {
        let mut buf = BytesMut::new();

        let msg: Message = Unsubscribe { id: 9 }.into();
        msg.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x0a, 0x00, 0x01, 0x09]);

        let decoded = Message::decode(&mut buf).unwrap();
        assert_eq!(decoded.id(), 0x0a);
        assert_eq!(decoded.name(), "Unsubscribe");
    }

    #[test]
    fn frame_unknown_type() {
        let mut buf = Bytes::from_static(&[0x3f, 0x00, 0x00]);
        assert!(matches!(
            Message::decode(&mut buf).unwrap_err(),
            DecodeError::InvalidMessage(0x3f)
        ));
    }

    #[test]
    fn frame_length_mismatch() {
        let mut buf = BytesMut::new();
        let msg: Message = AnnounceOk { id: 1 }.into();
        msg.encode(&mut buf).unwrap();

        // Declare one extra byte of payload.
        buf[2] += 1;
        buf.extend_from_slice(&[0x00]);

        assert!(matches!(
            Message::decode(&mut buf).unwrap_err(),
            DecodeError::LengthMismatch { .. }
        ));
    }

    #[test]
    fn frame_partial() {
        let mut buf = BytesMut::new();
        let msg: Message = AnnounceError {
            id: 1,
            error_code: 0x1,
            reason: ReasonPhrase::from("not authorized"),
        }
        .into();
        msg.encode(&mut buf).unwrap();

        // Only half the frame has arrived.
        let half = buf.len() / 2;
        let mut partial = Bytes::copy_from_slice(&buf[..half]);
        assert!(matches!(
            Message::decode(&mut partial).unwrap_err(),
            DecodeError::More(_)
        ));
    }
}
