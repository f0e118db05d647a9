//! Transport state shared by transport implementations: the outgoing queue, the
//! in-flight request table, and chunk reassembly for incoming messages.

use std::{sync::Arc, time::Instant};

use hashbrown::HashMap;

use log::{debug, error, warn};
use parking_lot::RwLock;

use uastack_core::{
    comms::{
        chunker::{next_sequence_number, Chunker},
        message_chunk::{MessageChunk, MessageIsFinalType},
        secure_channel::SecureChannel,
        tcp_codec::Message,
    },
    trace_read_lock, trace_write_lock, RequestMessage, ResponseMessage,
};
use uastack_types::{Error, StatusCode};

/// The result of polling the transport once.
#[derive(Debug, Clone, Copy)]
pub enum TransportPollResult {
    /// An outgoing message was accepted into the send buffer.
    OutgoingMessage,
    /// Bytes of an outgoing message were written to the socket.
    OutgoingMessageSent,
    /// An incoming frame was processed.
    IncomingMessage,
    /// A single request failed in a way that does not poison the connection.
    RecoverableError(StatusCode),
    /// The connection is closed. Terminal.
    Closed(StatusCode),
}

/// Callback resolved when the response correlated with a request arrives.
pub type ResponseSend = tokio::sync::oneshot::Sender<Result<ResponseMessage, StatusCode>>;

/// A request submitted to the transport together with the callback to resolve
/// when its response arrives.
pub struct OutgoingMessage {
    /// The request to send.
    pub request: RequestMessage,
    /// Resolver for the response future, `None` for fire-and-forget messages.
    pub callback: Option<ResponseSend>,
    /// When the caller stops caring about the response.
    pub deadline: Instant,
}

/// A message being reassembled from chunks.
struct PartialMessageState {
    chunks: Vec<MessageChunk>,
}

/// State of the in-flight table and incoming reassembly, shared by transport
/// implementations.
pub(crate) struct TransportState {
    /// The secure channel securing this connection.
    pub(crate) secure_channel: Arc<RwLock<SecureChannel>>,
    /// Queue of messages waiting to enter the send buffer.
    outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
    /// In-flight table: request id to response callback and deadline.
    message_states: HashMap<u32, (Option<ResponseSend>, Instant)>,
    /// Messages being reassembled, keyed by request id.
    partial_messages: HashMap<u32, PartialMessageState>,
    /// The maximum number of chunks pending reassembly across all messages.
    max_pending_incoming: usize,
    /// The negotiated maximum size of an incoming frame.
    receive_buffer_size: usize,
    /// The sequence number expected on the next incoming chunk.
    expected_sequence_number: u32,
    /// Monotonic request id source for this connection.
    last_request_id: u32,
}

impl TransportState {
    /// The first request id assigned on a connection. Ids below this are reserved.
    const FIRST_REQUEST_ID: u32 = 1000;

    pub(crate) fn new(
        secure_channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        max_pending_incoming: usize,
        receive_buffer_size: usize,
    ) -> Self {
        Self {
            secure_channel,
            outgoing_recv,
            message_states: HashMap::new(),
            partial_messages: HashMap::new(),
            max_pending_incoming,
            receive_buffer_size,
            expected_sequence_number: 1,
            last_request_id: Self::FIRST_REQUEST_ID,
        }
    }

    /// Wait for the next outgoing message, assign it a request id and register its
    /// callback in the in-flight table. Returns `None` when the sender side closed,
    /// meaning the connection should shut down.
    pub(crate) async fn wait_for_outgoing_message(&mut self) -> Option<(RequestMessage, u32)> {
        loop {
            // Drop requests whose local timer expired while queued.
            let message = self.outgoing_recv.recv().await?;
            if message.deadline <= Instant::now() {
                if let Some(callback) = message.callback {
                    let _ = callback.send(Err(StatusCode::BadTimeout));
                }
                continue;
            }

            let request_id = self.next_request_id();
            if let Some(callback) = message.callback {
                self.message_states
                    .insert(request_id, (Some(callback), message.deadline));
            }
            return Some((message.request, request_id));
        }
    }

    /// Called when a message failed to even encode, failing its future.
    pub(crate) fn message_send_failed(&mut self, request_id: u32, status: StatusCode) {
        if let Some((Some(callback), _)) = self.message_states.remove(&request_id) {
            let _ = callback.send(Err(status));
        }
    }

    /// Handle one incoming frame.
    pub(crate) fn handle_incoming_message(&mut self, message: Message) -> Result<(), StatusCode> {
        match message {
            Message::Acknowledge(ack) => {
                error!("Unexpected acknowledge after handshake: {:?}", ack);
                Err(StatusCode::BadTcpMessageTypeInvalid)
            }
            Message::Error(error) => {
                let status = error.status_code();
                error!("Received error message from server: {status}, {}", error.reason);
                Err(status)
            }
            Message::Chunk(chunk) => self.process_chunk(chunk).map_err(|e| {
                error!("Error processing chunk: {e}");
                e.status()
            }),
        }
    }

    /// Fail every outstanding request with `status` and drain queued outgoing messages.
    /// Called exactly once when the transport closes.
    pub(crate) async fn close(&mut self, status: StatusCode) -> StatusCode {
        let status = if status.is_good() {
            StatusCode::BadConnectionClosed
        } else {
            status
        };
        for (_, (callback, _)) in self.message_states.drain() {
            if let Some(callback) = callback {
                let _ = callback.send(Err(status));
            }
        }
        self.partial_messages.clear();
        self.outgoing_recv.close();
        while let Some(message) = self.outgoing_recv.recv().await {
            if let Some(callback) = message.callback {
                let _ = callback.send(Err(status));
            }
        }
        status
    }

    /// Sweep the in-flight table for requests whose local timer expired, failing them
    /// with BadTimeout. Returns the next deadline, for arming a timer.
    pub(crate) fn check_deadlines(&mut self) -> Option<Instant> {
        let now = Instant::now();
        let expired = self
            .message_states
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for request_id in expired {
            debug!("Request {request_id} timed out locally");
            if let Some((Some(callback), _)) = self.message_states.remove(&request_id) {
                let _ = callback.send(Err(StatusCode::BadTimeout));
            }
            self.partial_messages.remove(&request_id);
        }
        self.message_states
            .values()
            .map(|(_, deadline)| *deadline)
            .min()
    }

    fn next_request_id(&mut self) -> u32 {
        self.last_request_id = self.last_request_id.wrapping_add(1);
        self.last_request_id
    }

    fn process_chunk(&mut self, chunk: MessageChunk) -> Result<(), Error> {
        if chunk.data.len() > self.receive_buffer_size {
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                format!(
                    "Received chunk of {} bytes, exceeding the negotiated buffer of {}",
                    chunk.data.len(),
                    self.receive_buffer_size
                ),
            ));
        }

        let chunk = {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.verify_and_remove_security(&chunk.data)?
        };

        let secure_channel = trace_read_lock!(self.secure_channel);
        let chunk_info = chunk.chunk_info(&secure_channel)?;

        // Every chunk on the channel carries the next sequence number, whatever message
        // it belongs to.
        if chunk_info.sequence_header.sequence_number != self.expected_sequence_number {
            return Err(Error::new(
                StatusCode::BadSequenceNumberInvalid,
                format!(
                    "Expected sequence number {}, got {}",
                    self.expected_sequence_number, chunk_info.sequence_header.sequence_number
                ),
            ));
        }
        self.expected_sequence_number = next_sequence_number(self.expected_sequence_number);

        let request_id = chunk_info.sequence_header.request_id;
        match chunk_info.message_header.is_final {
            MessageIsFinalType::Intermediate => {
                let state = self
                    .partial_messages
                    .entry(request_id)
                    .or_insert_with(|| PartialMessageState { chunks: Vec::new() });
                state.chunks.push(chunk);

                let pending = self
                    .partial_messages
                    .values()
                    .map(|m| m.chunks.len())
                    .sum::<usize>();
                if self.max_pending_incoming > 0 && pending > self.max_pending_incoming {
                    return Err(Error::new(
                        StatusCode::BadEncodingLimitsExceeded,
                        format!(
                            "Too many chunks pending reassembly: {pending} > {}",
                            self.max_pending_incoming
                        ),
                    ));
                }
                let max_chunk_count = secure_channel.decoding_options().max_chunk_count;
                if max_chunk_count > 0 && state_len(&self.partial_messages, request_id) > max_chunk_count {
                    return Err(Error::new(
                        StatusCode::BadTcpMessageTooLarge,
                        format!("Message exceeds the chunk count limit of {max_chunk_count}"),
                    ));
                }
                Ok(())
            }
            MessageIsFinalType::FinalError => {
                // The peer abandoned the message. Partial chunks are discarded and the
                // outstanding request fails.
                warn!("Received an abort chunk for request {request_id}");
                self.partial_messages.remove(&request_id);
                if let Some((Some(callback), _)) = self.message_states.remove(&request_id) {
                    let _ = callback.send(Err(StatusCode::BadRequestInterrupted));
                }
                Ok(())
            }
            MessageIsFinalType::Final => {
                let mut chunks = self
                    .partial_messages
                    .remove(&request_id)
                    .map(|m| m.chunks)
                    .unwrap_or_default();
                chunks.push(chunk);

                let message: ResponseMessage = Chunker::decode(&chunks, &secure_channel, None)?;
                drop(secure_channel);
                self.deliver(request_id, message);
                Ok(())
            }
        }
    }

    fn deliver(&mut self, request_id: u32, message: ResponseMessage) {
        match self.message_states.remove(&request_id) {
            Some((Some(callback), _)) => {
                let _ = callback.send(Ok(message));
            }
            Some((None, _)) => (),
            None => {
                // Either the caller went away or the server invented a request id.
                // Both are dropped silently.
                debug!("Discarding response for unknown request id {request_id}");
            }
        }
    }
}

fn state_len(map: &HashMap<u32, PartialMessageState>, request_id: u32) -> usize {
    map.get(&request_id).map(|m| m.chunks.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uastack_core::comms::message_chunk::MessageChunkType;
    use uastack_core::comms::secure_channel::SecureChannel;
    use uastack_types::{ReadResponse, RequestHeader, ResponseHeader};

    use super::*;

    fn test_state() -> (
        TransportState,
        tokio::sync::mpsc::Sender<OutgoingMessage>,
    ) {
        let channel = Arc::new(RwLock::new(SecureChannel::new_no_certificate_store()));
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        (TransportState::new(channel, rx, 0, 1 << 20), tx)
    }

    async fn submit_request(
        state: &mut TransportState,
        tx: &tokio::sync::mpsc::Sender<OutgoingMessage>,
    ) -> (
        u32,
        tokio::sync::oneshot::Receiver<Result<ResponseMessage, StatusCode>>,
    ) {
        let (callback, receiver) = tokio::sync::oneshot::channel();
        let request: RequestMessage = uastack_types::ReadRequest {
            request_header: RequestHeader::dummy(),
            ..Default::default()
        }
        .into();
        tx.send(OutgoingMessage {
            request,
            callback: Some(callback),
            deadline: Instant::now() + Duration::from_secs(30),
        })
        .await
        .unwrap();
        let (_message, request_id) = state.wait_for_outgoing_message().await.unwrap();
        (request_id, receiver)
    }

    fn make_chunk(
        state: &TransportState,
        sequence_number: u32,
        request_id: u32,
        is_final: MessageIsFinalType,
        body: &[u8],
    ) -> MessageChunk {
        let channel = state.secure_channel.read();
        MessageChunk::new(
            sequence_number,
            request_id,
            MessageChunkType::Message,
            is_final,
            &channel,
            body,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn response_resolves_pending_request() {
        let (mut state, tx) = test_state();
        let (request_id, receiver) = submit_request(&mut state, &tx).await;

        let response: ResponseMessage = ReadResponse {
            response_header: ResponseHeader::new_service_result(1, StatusCode::Good),
            results: None,
            diagnostic_infos: None,
        }
        .into();
        let chunks = {
            let channel = state.secure_channel.read();
            Chunker::encode(1, request_id, 0, 0, &channel, &response).unwrap()
        };
        for chunk in chunks {
            state
                .handle_incoming_message(Message::Chunk(chunk))
                .unwrap();
        }

        let delivered = receiver.await.unwrap().unwrap();
        assert!(matches!(delivered, ResponseMessage::Read(_)));
    }

    #[tokio::test]
    async fn abort_chunk_interrupts_request() {
        let (mut state, tx) = test_state();
        let (request_id, receiver) = submit_request(&mut state, &tx).await;

        let intermediate = make_chunk(
            &state,
            1,
            request_id,
            MessageIsFinalType::Intermediate,
            &[1, 2, 3],
        );
        state
            .handle_incoming_message(Message::Chunk(intermediate))
            .unwrap();

        // The abort discards the partial message and fails the caller; the
        // connection itself stays up.
        let abort = make_chunk(&state, 2, request_id, MessageIsFinalType::FinalError, &[]);
        state.handle_incoming_message(Message::Chunk(abort)).unwrap();

        assert_eq!(
            receiver.await.unwrap().unwrap_err(),
            StatusCode::BadRequestInterrupted
        );
        assert!(state.partial_messages.is_empty());
    }

    #[tokio::test]
    async fn non_contiguous_sequence_number_faults_channel() {
        let (mut state, tx) = test_state();
        let (request_id, _receiver) = submit_request(&mut state, &tx).await;

        // First chunk must carry sequence number 1.
        let chunk = make_chunk(&state, 5, request_id, MessageIsFinalType::Final, &[]);
        assert_eq!(
            state
                .handle_incoming_message(Message::Chunk(chunk))
                .unwrap_err(),
            StatusCode::BadSequenceNumberInvalid
        );
    }

    #[tokio::test]
    async fn close_drains_in_flight_and_queued_requests() {
        let (mut state, tx) = test_state();
        let (_request_id, receiver) = submit_request(&mut state, &tx).await;

        // A second request that never even gets dequeued.
        let (callback, queued_receiver) = tokio::sync::oneshot::channel();
        let request: RequestMessage = uastack_types::ReadRequest {
            request_header: RequestHeader::dummy(),
            ..Default::default()
        }
        .into();
        tx.send(OutgoingMessage {
            request,
            callback: Some(callback),
            deadline: Instant::now() + Duration::from_secs(30),
        })
        .await
        .unwrap();

        let status = state.close(StatusCode::BadConnectionClosed).await;
        assert_eq!(status, StatusCode::BadConnectionClosed);
        assert_eq!(
            receiver.await.unwrap().unwrap_err(),
            StatusCode::BadConnectionClosed
        );
        assert_eq!(
            queued_receiver.await.unwrap().unwrap_err(),
            StatusCode::BadConnectionClosed
        );
    }

    #[tokio::test]
    async fn expired_deadline_times_out_locally() {
        let (mut state, tx) = test_state();
        let (callback, receiver) = tokio::sync::oneshot::channel();
        let request: RequestMessage = uastack_types::ReadRequest {
            request_header: RequestHeader::dummy(),
            ..Default::default()
        }
        .into();
        tx.send(OutgoingMessage {
            request,
            callback: Some(callback),
            deadline: Instant::now() - Duration::from_millis(1),
        })
        .await
        .unwrap();
        // The expired request is dropped while dequeueing; the sender side is gone so
        // the wait returns None.
        drop(tx);
        assert!(state.wait_for_outgoing_message().await.is_none());
        assert_eq!(receiver.await.unwrap().unwrap_err(), StatusCode::BadTimeout);
    }
}
