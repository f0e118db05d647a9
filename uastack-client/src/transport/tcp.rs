//! The TCP transport: connection establishment with the hello/acknowledge handshake,
//! and the poll loop moving frames in both directions.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error, trace, warn};
use parking_lot::RwLock;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

use uastack_core::comms::{
    buffer::SendBuffer,
    secure_channel::SecureChannel,
    tcp_codec::{Message, TcpCodec},
    tcp_types::{AcknowledgeMessage, HelloMessage},
    url::hostname_port_from_url,
};
use uastack_core::{trace_read_lock, RequestMessage};
use uastack_types::{SimpleBinaryEncodable, StatusCode};

use super::connect::{Connector, Transport};
use super::core::{OutgoingMessage, TransportPollResult, TransportState};

#[derive(Debug, Clone, Copy)]
enum TransportCloseState {
    Open,
    Closing(StatusCode),
    Closed(StatusCode),
}

/// Transport limits, from the client configuration. These are the local limits offered
/// in the hello message; the negotiated limits are the element-wise minimum with the
/// server's acknowledge.
#[derive(Debug, Clone)]
pub struct TransportConfiguration {
    /// Maximum number of chunks pending reassembly.
    pub max_pending_incoming: usize,
    /// Local send buffer size.
    pub send_buffer_size: usize,
    /// Local receive buffer size.
    pub recv_buffer_size: usize,
    /// Maximum incoming message size, 0 for no limit.
    pub max_message_size: usize,
    /// Maximum incoming chunk count per message, 0 for no limit.
    pub max_chunk_count: usize,
}

/// A connected TCP transport.
pub struct TcpTransport {
    state: TransportState,
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    send_buffer: SendBuffer,
    should_close: bool,
    closed: TransportCloseState,
}

/// Connector establishing a plain TCP connection.
pub struct TcpConnector;

impl TcpConnector {
    async fn connect_inner(
        secure_channel: &RwLock<SecureChannel>,
        config: &TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<
        (
            FramedRead<ReadHalf<TcpStream>, TcpCodec>,
            WriteHalf<TcpStream>,
            AcknowledgeMessage,
        ),
        StatusCode,
    > {
        let (host, port) = hostname_port_from_url(
            endpoint_url,
            uastack_core::constants::DEFAULT_OPC_UA_SERVER_PORT,
        )?;

        let addr = {
            let addr = format!("{}:{}", host, port);
            match tokio::net::lookup_host(addr).await {
                Ok(mut addrs) => {
                    if let Some(addr) = addrs.next() {
                        addr
                    } else {
                        error!(
                            "Invalid address {}, does not resolve to any socket",
                            endpoint_url
                        );
                        return Err(StatusCode::BadTcpEndpointUrlInvalid);
                    }
                }
                Err(e) => {
                    error!("Invalid address {}, cannot be parsed {:?}", endpoint_url, e);
                    return Err(StatusCode::BadTcpEndpointUrlInvalid);
                }
            }
        };

        debug!("Connecting to {} with url {}", addr, endpoint_url);

        let socket = TcpStream::connect(&addr).await.map_err(|err| {
            error!("Could not connect to host {}, {:?}", addr, err);
            StatusCode::BadCommunicationError
        })?;

        let (reader, mut writer) = tokio::io::split(socket);

        let hello = HelloMessage::new(
            endpoint_url,
            config.send_buffer_size,
            config.recv_buffer_size,
            config.max_message_size,
            config.max_chunk_count,
        );
        trace!("Sending hello message: {hello:?}");
        let mut framed_read = {
            let secure_channel = trace_read_lock!(secure_channel);
            FramedRead::new(reader, TcpCodec::new(secure_channel.decoding_options()))
        };

        writer
            .write_all(&hello.encode_to_vec())
            .await
            .map_err(|err| {
                error!("Cannot send hello to server, err = {}", err);
                StatusCode::BadCommunicationError
            })?;

        let ack = match framed_read.next().await {
            Some(Ok(Message::Acknowledge(ack))) => {
                if ack.send_buffer_size > hello.receive_buffer_size {
                    warn!("Acknowledged send buffer size is greater than the receive buffer size offered in hello");
                }
                if ack.receive_buffer_size > hello.send_buffer_size {
                    warn!("Acknowledged receive buffer size is greater than the send buffer size offered in hello");
                }
                trace!("Received acknowledgement: {:?}", ack);
                ack
            }
            Some(Ok(Message::Error(e))) => {
                error!(
                    "Server rejected the hello with {}: {}",
                    e.status_code(),
                    e.reason
                );
                return Err(e.status_code());
            }
            other => {
                error!(
                    "Unexpected result while waiting for server ACK: {:?}",
                    other
                );
                return Err(StatusCode::BadConnectionClosed);
            }
        };

        Ok((framed_read, writer, ack))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<TcpTransport, StatusCode> {
        let (framed_read, writer, ack) =
            Self::connect_inner(&channel, &config, endpoint_url).await?;

        let mut buffer = SendBuffer::new(
            config.send_buffer_size,
            config.max_message_size,
            config.max_chunk_count,
        );
        buffer.revise(
            ack.receive_buffer_size as usize,
            ack.max_message_size as usize,
            ack.max_chunk_count as usize,
        );

        Ok(TcpTransport {
            state: TransportState::new(
                channel,
                outgoing_recv,
                config.max_pending_incoming,
                ack.send_buffer_size.min(config.recv_buffer_size as u32) as usize,
            ),
            read: framed_read,
            write: writer,
            send_buffer: buffer,
            should_close: false,
            closed: TransportCloseState::Open,
        })
    }
}

impl TcpTransport {
    fn handle_incoming_message(
        &mut self,
        incoming: Option<Result<Message, std::io::Error>>,
    ) -> TransportPollResult {
        let Some(incoming) = incoming else {
            return TransportPollResult::Closed(StatusCode::BadCommunicationError);
        };
        match incoming {
            Ok(message) => {
                if let Err(e) = self.state.handle_incoming_message(message) {
                    TransportPollResult::Closed(e)
                } else {
                    TransportPollResult::IncomingMessage
                }
            }
            Err(err) => {
                error!("Error reading from stream {}", err);
                TransportPollResult::Closed(StatusCode::BadConnectionClosed)
            }
        }
    }

    async fn wait_for_deadline(next: Option<Instant>) {
        match next {
            Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
            None => futures::future::pending().await,
        }
    }

    async fn poll_inner(&mut self) -> TransportPollResult {
        // Requests whose local timer expired fail here, whether or not the server
        // ever answers.
        let next_deadline = self.state.check_deadlines();

        // If there's nothing in the send buffer, but there are chunks available,
        // secure them into the send buffer before proceeding.
        if self.send_buffer.should_encode_chunks() {
            let secure_channel = trace_read_lock!(self.state.secure_channel);
            if let Err(e) = self.send_buffer.encode_next_chunk(&secure_channel) {
                return TransportPollResult::Closed(e);
            }
        }

        // If there is something in the send buffer, write it to the stream. If not,
        // wait for outgoing messages. Either way, listen to incoming messages and
        // request deadlines while doing so.
        if self.send_buffer.can_read() {
            tokio::select! {
                r = self.send_buffer.read_into_async(&mut self.write) => {
                    if let Err(e) = r {
                        error!("write bytes task failed: {}", e);
                        return TransportPollResult::Closed(StatusCode::BadCommunicationError);
                    }
                    TransportPollResult::OutgoingMessageSent
                }
                incoming = self.read.next() => {
                    self.handle_incoming_message(incoming)
                }
                _ = Self::wait_for_deadline(next_deadline) => {
                    TransportPollResult::RecoverableError(StatusCode::BadTimeout)
                }
            }
        } else {
            if self.should_close {
                debug!("Writer is setting the connection state to finished(good)");
                return TransportPollResult::Closed(StatusCode::Good);
            }
            tokio::select! {
                outgoing = self.state.wait_for_outgoing_message() => {
                    let Some((outgoing, request_id)) = outgoing else {
                        return TransportPollResult::Closed(StatusCode::Good);
                    };
                    if matches!(outgoing, RequestMessage::CloseSecureChannel(_)) {
                        self.should_close = true;
                        debug!("Writer is about to send a CloseSecureChannelRequest which means it should close in a moment");
                    }
                    let secure_channel = trace_read_lock!(self.state.secure_channel);
                    if let Err(e) = self.send_buffer.write(request_id, outgoing, &secure_channel) {
                        drop(secure_channel);
                        if let Some((request_id, request_handle)) = e.full_context() {
                            error!("Failed to send message with request handle {}: {}", request_handle, e.status());
                            self.state.message_send_failed(request_id, e.status());
                            TransportPollResult::RecoverableError(e.status())
                        } else {
                            TransportPollResult::Closed(e.status())
                        }
                    } else {
                        TransportPollResult::OutgoingMessage
                    }
                }
                incoming = self.read.next() => {
                    self.handle_incoming_message(incoming)
                }
                _ = Self::wait_for_deadline(next_deadline) => {
                    TransportPollResult::RecoverableError(StatusCode::BadTimeout)
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    async fn poll(&mut self) -> TransportPollResult {
        // Poll must be cancel safe: if a future returned from poll is dropped, no data
        // is lost and the state stays consistent. `poll_inner` only ever completes one
        // inner future, each of which is itself cancel safe. Closing is the exception:
        // `close` may need several calls to finish, so the close state is tracked and
        // re-entered until it completes.
        match self.closed {
            TransportCloseState::Open => {}
            TransportCloseState::Closing(c) => {
                let r = self.state.close(c).await;
                self.closed = TransportCloseState::Closed(c);
                return TransportPollResult::Closed(r);
            }
            TransportCloseState::Closed(c) => {
                return TransportPollResult::Closed(c);
            }
        }

        let r = self.poll_inner().await;
        if let TransportPollResult::Closed(status) = &r {
            self.closed = TransportCloseState::Closing(*status);
            let r = self.state.close(*status).await;
            self.closed = TransportCloseState::Closed(r);
        }
        r
    }
}
