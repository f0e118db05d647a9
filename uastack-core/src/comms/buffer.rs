// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! The staged send buffer of a connection: logical messages are chunked as they are
//! submitted, then chunks are secured and streamed to the socket one at a time,
//! respecting the limits negotiated in the hello/acknowledge handshake.

use std::collections::VecDeque;
use std::io::Cursor;

use log::trace;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use uastack_types::{EncodingResult, Error, StatusCode};

use crate::{Message, RequestMessage};

use super::{
    chunker::{next_sequence_number, Chunker},
    message_chunk::MessageChunk,
    secure_channel::SecureChannel,
};

/// Outgoing message buffer. Messages are chunked when submitted with [`SendBuffer::write`],
/// the pending chunks are secured one at a time with [`SendBuffer::encode_next_chunk`],
/// and the secured bytes drained to the socket with [`SendBuffer::read_into_async`].
pub struct SendBuffer {
    /// The send buffer, holding at most one secured chunk at a time.
    buffer: Cursor<Vec<u8>>,
    /// Queue of chunks waiting to be secured and sent.
    chunks: VecDeque<MessageChunk>,
    /// The largest frame the server will accept, revised by the acknowledge message.
    send_buffer_size: usize,
    /// The largest message the server will accept, 0 for no limit.
    max_message_size: usize,
    /// The largest number of chunks per message the server accepts, 0 for no limit.
    max_chunk_count: usize,
    /// The sequence number of the next chunk to be submitted.
    next_sequence_number: u32,
    /// End of the readable region in `buffer`.
    read_limit: usize,
}

impl SendBuffer {
    /// Create a send buffer with the local limits. Call [`SendBuffer::revise`] with the
    /// server's acknowledge before use.
    pub fn new(buffer_size: usize, max_message_size: usize, max_chunk_count: usize) -> Self {
        Self {
            buffer: Cursor::new(vec![0u8; buffer_size + 1024]),
            chunks: VecDeque::new(),
            send_buffer_size: buffer_size,
            max_message_size,
            max_chunk_count,
            next_sequence_number: 1,
            read_limit: 0,
        }
    }

    /// Apply the server's limits from the acknowledge message. The negotiated value of
    /// each limit is the element-wise minimum, where 0 counts as unlimited.
    pub fn revise(
        &mut self,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) {
        if send_buffer_size > 0 && send_buffer_size < self.send_buffer_size {
            self.send_buffer_size = send_buffer_size;
        }
        if max_message_size > 0 && (self.max_message_size == 0 || max_message_size < self.max_message_size) {
            self.max_message_size = max_message_size;
        }
        if max_chunk_count > 0 && (self.max_chunk_count == 0 || max_chunk_count < self.max_chunk_count) {
            self.max_chunk_count = max_chunk_count;
        }
    }

    /// The negotiated per-chunk byte limit.
    pub fn send_buffer_size(&self) -> usize {
        self.send_buffer_size
    }

    /// Chunk a message and queue its chunks for sending. Chunk sequence numbers are
    /// assigned here, so messages go on the wire in submission order.
    pub fn write(
        &mut self,
        request_id: u32,
        message: RequestMessage,
        secure_channel: &SecureChannel,
    ) -> EncodingResult<u32> {
        trace!("Writing request to buffer");
        let chunks = Chunker::encode(
            self.next_sequence_number,
            request_id,
            self.max_message_size,
            self.send_buffer_size,
            secure_channel,
            &message,
        )
        .map_err(|e| {
            e.with_context(
                Some(request_id),
                Some(Message::request_handle(&message)),
            )
        })?;

        if self.max_chunk_count > 0 && chunks.len() > self.max_chunk_count {
            return Err(Error::new(
                StatusCode::BadRequestTooLarge,
                format!(
                    "Message would be sent in {} chunks, exceeding the negotiated limit of {}",
                    chunks.len(),
                    self.max_chunk_count
                ),
            )
            .with_context(Some(request_id), Some(Message::request_handle(&message))));
        }

        for _ in 0..chunks.len() {
            self.next_sequence_number = next_sequence_number(self.next_sequence_number);
        }
        self.chunks.extend(chunks);
        Ok(request_id)
    }

    /// Whether chunks are pending and the buffer has room to secure the next one.
    pub fn should_encode_chunks(&self) -> bool {
        !self.chunks.is_empty() && !self.can_read()
    }

    /// Secure the next pending chunk into the buffer.
    pub fn encode_next_chunk(&mut self, secure_channel: &SecureChannel) -> Result<(), StatusCode> {
        let Some(chunk) = self.chunks.pop_front() else {
            return Ok(());
        };
        let dst = self.buffer.get_mut();
        let size = secure_channel.apply_security(&chunk, dst)?;
        self.buffer.set_position(0);
        self.read_limit = size;
        Ok(())
    }

    /// Whether secured bytes are waiting to be written to the socket.
    pub fn can_read(&self) -> bool {
        (self.buffer.position() as usize) < self.read_limit
    }

    /// Write the buffered bytes to the stream. Cancel safe: the position advances only
    /// past bytes actually written.
    pub async fn read_into_async<W: AsyncWrite + Unpin>(
        &mut self,
        write: &mut W,
    ) -> std::io::Result<()> {
        let position = self.buffer.position() as usize;
        let data = &self.buffer.get_ref()[position..self.read_limit];
        let written = write.write(data).await?;
        self.buffer.set_position((position + written) as u64);
        if !self.can_read() {
            self.read_limit = 0;
            self.buffer.set_position(0);
        }
        Ok(())
    }
}
