//! UDP and TCP transports for a single query attempt. Every blocking I/O is
//! raced against the attempt deadline and the caller's cancellation signal;
//! sockets are owned by the attempt and dropped on every exit path.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dns::message::Message;
use crate::error::{ClientError, Result};

/// Race a transport future against the deadline and the cancellation
/// signal. Cancellation wins ties so a cancelled call never reports Timeout.
async fn bounded<T>(
    deadline: Instant,
    cancel: &CancellationToken,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        _ = tokio::time::sleep_until(deadline) => Err(ClientError::Timeout),
        r = fut => r.map_err(ClientError::from),
    }
}

/// One UDP query attempt: bind an ephemeral socket, send, then receive until
/// a datagram matches the query or the deadline passes. Datagrams from the
/// wrong source or with a foreign transaction ID / question are dropped and
/// the wait continues.
///
/// A matching response carrying TC=1 is surfaced as [`ClientError::Truncated`]
/// when TCP is available so the engine can upgrade; with TCP unavailable the
/// truncated message is returned as-is, TC preserved.
pub async fn udp_exchange(
    server: SocketAddr,
    query: &Message,
    query_bytes: &[u8],
    max_payload: usize,
    tcp_available: bool,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<Message> {
    let bind_addr = if server.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    bounded(deadline, cancel, socket.send_to(query_bytes, server)).await?;

    let mut buf = vec![0u8; max_payload];
    loop {
        let (len, src) = bounded(deadline, cancel, socket.recv_from(&mut buf)).await?;

        // Source address must match the server we queried (RFC 5452)
        if src.ip() != server.ip() {
            debug!("dropping datagram from unexpected source {}", src);
            continue;
        }

        let msg = Message::parse(&buf[..len])?;
        if !msg.is_response_to(query) {
            debug!(
                "dropping non-matching response from {} (id {:04x})",
                src, msg.id
            );
            continue;
        }

        if msg.flags.tc && tcp_available {
            debug!("response from {} truncated, signalling TCP upgrade", server);
            return Err(ClientError::Truncated);
        }
        return Ok(msg);
    }
}

/// A TCP connection to one server, framing messages with the 2-byte
/// big-endian length prefix. One connection carries the whole continuation
/// stream of a single query.
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    pub async fn connect(
        server: SocketAddr,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let stream = bounded(deadline, cancel, TcpStream::connect(server)).await?;
        Ok(TcpConnection { stream })
    }

    /// Send one message, length-prefixed.
    pub async fn send(
        &mut self,
        payload: &[u8],
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if payload.len() > u16::MAX as usize {
            return Err(ClientError::InvalidArgument(format!(
                "message too large for TCP framing: {} bytes",
                payload.len()
            )));
        }
        let prefix = (payload.len() as u16).to_be_bytes();
        bounded(deadline, cancel, self.stream.write_all(&prefix)).await?;
        bounded(deadline, cancel, self.stream.write_all(payload)).await?;
        Ok(())
    }

    /// Read one length-prefixed frame. Returns None when the server closes
    /// the stream cleanly before the next frame.
    pub async fn read_frame(
        &mut self,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 2];
        match bounded(deadline, cancel, self.stream.read_exact(&mut len_buf)).await {
            Ok(_) => {}
            Err(ClientError::Transport(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let len = u16::from_be_bytes(len_buf) as usize;
        if len == 0 {
            return Ok(None);
        }

        let mut frame = vec![0u8; len];
        bounded(deadline, cancel, self.stream.read_exact(&mut frame)).await?;
        Ok(Some(frame))
    }
}
