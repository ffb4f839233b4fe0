use std::io;

use bytes::{Buf, BytesMut};

use crate::coding::{Decode, DecodeError};

use super::SessionError;

/// Reassembles typed values from a QUIC receive stream.
///
/// Bytes accumulate in a buffer; decoding retries from the start of the
/// buffer whenever the decoder reports it needs more input, so partially
/// received frames are handled transparently.
pub struct Reader {
    stream: web_transport::RecvStream,
    buffer: BytesMut,
}

impl Reader {
    pub fn new(stream: web_transport::RecvStream) -> Self {
        Self {
            stream,
            buffer: Default::default(),
        }
    }

    pub async fn decode<T: Decode>(&mut self) -> Result<T, SessionError> {
        loop {
            let mut cursor = io::Cursor::new(&self.buffer);

            // Try to decode with the current buffer.
            let required = match T::decode(&mut cursor) {
                Ok(msg) => {
                    let consumed = cursor.position() as usize;
                    self.buffer.advance(consumed);
                    log::trace!(
                        "decoded {} ({} bytes)",
                        std::any::type_name::<T>(),
                        consumed
                    );
                    return Ok(msg);
                }
                Err(DecodeError::More(required)) => self.buffer.len() + required,
                Err(err) => return Err(err.into()),
            };

            // Read more data until we reach the requested amount.
            // Always read at least once to avoid spinning on remain=0.
            loop {
                if !self.stream.read_buf(&mut self.buffer).await? {
                    // The stream ended mid-frame.
                    return Err(DecodeError::More(required - self.buffer.len()).into());
                };

                if self.buffer.len() >= required {
                    break;
                }
            }
        }
    }

    /// Like [Reader::decode], for framings whose layout depends on the
    /// stream header type rather than a Decode impl alone.
    pub async fn decode_object<T, F>(&mut self, decode: F) -> Result<T, SessionError>
    where
        F: Fn(&mut io::Cursor<&[u8]>) -> Result<T, DecodeError>,
    {
        loop {
            let mut cursor = io::Cursor::new(self.buffer.as_ref());

            let required = match decode(&mut cursor) {
                Ok(value) => {
                    let consumed = cursor.position() as usize;
                    self.buffer.advance(consumed);
                    return Ok(value);
                }
                Err(DecodeError::More(required)) => self.buffer.len() + required,
                Err(err) => return Err(err.into()),
            };

            loop {
                if !self.stream.read_buf(&mut self.buffer).await? {
                    return Err(DecodeError::More(required - self.buffer.len()).into());
                };

                if self.buffer.len() >= required {
                    break;
                }
            }
        }
    }

    /// True once the stream has ended and the buffer is drained.
    pub async fn done(&mut self) -> Result<bool, SessionError> {
        if !self.buffer.is_empty() {
            return Ok(false);
        }

        Ok(!self.stream.read_buf(&mut self.buffer).await?)
    }
}
