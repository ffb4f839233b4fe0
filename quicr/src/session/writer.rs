use crate::coding::Encode;

use super::SessionError;

/// Encodes typed values onto a QUIC send stream.
pub struct Writer {
    stream: web_transport::SendStream,
    buffer: bytes::BytesMut,
}

impl Writer {
    pub fn new(stream: web_transport::SendStream) -> Self {
        Self {
            stream,
            buffer: Default::default(),
        }
    }

    pub async fn encode<T: Encode>(&mut self, msg: &T) -> Result<(), SessionError> {
        self.buffer.clear();
        msg.encode(&mut self.buffer)?;

        log::trace!(
            "sending {} ({} bytes)",
            std::any::type_name::<T>(),
            self.buffer.len()
        );

        while !self.buffer.is_empty() {
            self.stream.write_buf(&mut self.buffer).await?;
        }

        Ok(())
    }

    pub fn set_priority(&mut self, order: i32) {
        self.stream.set_priority(order);
    }
}
