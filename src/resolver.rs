//! Resolution engine: walks the configured servers strictly in order, gives
//! each attempt a fair slice of the remaining time budget, upgrades from UDP
//! to TCP on truncation, and drains multi-message TCP streams.

use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dns::message::Message;
use crate::error::{ClientError, Result};
use crate::transport::{self, TcpConnection};

pub struct QueryEngine {
    pub servers: Vec<SocketAddr>,
    pub timeout: Duration,
    pub udp_enabled: bool,
    pub tcp_enabled: bool,
    pub udp_payload_size: u16,
}

impl QueryEngine {
    /// Run one query to completion against the server list. Per-server
    /// transport, format and timeout failures demote to "try the next
    /// server"; cancellation and caller errors abort immediately.
    pub async fn send_query(&self, query: &Message, cancel: &CancellationToken) -> Result<Message> {
        if self.servers.is_empty() {
            return Err(ClientError::InvalidArgument(
                "no servers configured".into(),
            ));
        }
        if !self.udp_enabled && !self.tcp_enabled {
            return Err(ClientError::InvalidArgument(
                "both transports disabled".into(),
            ));
        }

        let deadline = Instant::now() + self.timeout;
        let mut last_err: Option<ClientError> = None;

        for (i, &server) in self.servers.iter().enumerate() {
            let now = Instant::now();
            if now >= deadline {
                return Err(ClientError::Timeout);
            }
            // Fair share of what is left for this attempt
            let remaining = deadline - now;
            let slice = remaining / (self.servers.len() - i) as u32;
            let attempt_deadline = now + slice;

            // Fresh transaction ID per server attempt so stale datagrams
            // from an earlier attempt cannot match (RFC 5452)
            let mut attempt = query.clone();
            attempt.id = OsRng.gen();
            let attempt_bytes = attempt.encode()?;

            debug!(
                "querying {} (attempt {}/{}, slice {:?})",
                server,
                i + 1,
                self.servers.len(),
                slice
            );

            match self
                .attempt_server(server, &attempt, &attempt_bytes, attempt_deadline, cancel)
                .await
            {
                Ok(msg) => return Ok(msg),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(ClientError::Timeout);
                    }
                    debug!("server {} failed: {}", server, e);
                    last_err = Some(e);
                }
            }
        }

        Err(ClientError::NoResponse {
            last: last_err.map(Box::new),
        })
    }

    /// One server: UDP when enabled and the query fits the cap, then TCP on
    /// truncation or UDP failure.
    async fn attempt_server(
        &self,
        server: SocketAddr,
        query: &Message,
        query_bytes: &[u8],
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let mut udp_err: Option<ClientError> = None;

        if self.udp_enabled && query_bytes.len() <= self.udp_payload_size as usize {
            match transport::udp_exchange(
                server,
                query,
                query_bytes,
                self.udp_payload_size as usize,
                self.tcp_enabled,
                deadline,
                cancel,
            )
            .await
            {
                Ok(msg) => return Ok(msg),
                Err(ClientError::Truncated) => {
                    debug!("upgrading to TCP after truncated response from {}", server);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => udp_err = Some(e),
            }
        }

        if self.tcp_enabled {
            return self
                .tcp_attempt(server, query, query_bytes, deadline, cancel)
                .await;
        }

        Err(udp_err.unwrap_or_else(|| {
            ClientError::InvalidArgument("query exceeds UDP payload cap and TCP is disabled".into())
        }))
    }

    /// TCP leg: one connection carries the query and every continuation
    /// frame. Frames are read while the response says more are coming;
    /// their sections are concatenated into one message.
    async fn tcp_attempt(
        &self,
        server: SocketAddr,
        query: &Message,
        query_bytes: &[u8],
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let mut conn = TcpConnection::connect(server, deadline, cancel).await?;
        conn.send(query_bytes, deadline, cancel).await?;

        let first = conn
            .read_frame(deadline, cancel)
            .await?
            .ok_or_else(|| closed_early(server))?;
        let mut combined = Message::parse(&first)?;
        if !combined.is_response_to(query) {
            return Err(ClientError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("tcp response from {} does not match query", server),
            )));
        }

        // ゾーン転送は複数フレームで届く (締めのSOAで終了)
        let mut soa_seen = combined.soa_count();
        while combined.expects_continuation(soa_seen) {
            match conn.read_frame(deadline, cancel).await? {
                None => break,
                Some(frame) => {
                    let next = Message::parse(&frame)?;
                    soa_seen += next.soa_count();
                    combined.absorb(next);
                }
            }
        }

        Ok(combined)
    }
}

fn closed_early(server: SocketAddr) -> ClientError {
    ClientError::Transport(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("{} closed the connection before responding", server),
    ))
}
