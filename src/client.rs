//! Client facade: builds query messages from (name, type, class, options)
//! and hands them to the engine. Both async and blocking entry points.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{parse_server, ClientConfig};
use crate::dns::message::{Flags, Message, Question, ResourceRecord};
use crate::dns::name::Name;
use crate::dns::rdata::RData;
use crate::dns::types::{OpCode, RecordClass, RecordType};
use crate::error::{ClientError, Result};
use crate::resolver::QueryEngine;

/// Recognized per-query options.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub recursion_desired: bool,
    pub checking_disabled: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            recursion_desired: true,
            checking_disabled: false,
        }
    }
}

/// A DNS client bound to an ordered resolver list and a total query timeout.
/// Holds no mutable cross-query state; queries issued concurrently from the
/// same client are independent.
pub struct DnsClient {
    engine: QueryEngine,
}

impl DnsClient {
    /// Build a client from server strings (port defaults to 53) and a total
    /// per-query timeout in milliseconds.
    pub fn new<S: AsRef<str>>(servers: &[S], timeout_ms: u64) -> Result<Self> {
        let servers = servers
            .iter()
            .map(|s| parse_server(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if servers.is_empty() {
            return Err(ClientError::InvalidArgument(
                "at least one server is required".into(),
            ));
        }
        Ok(DnsClient {
            engine: QueryEngine {
                servers,
                timeout: Duration::from_millis(timeout_ms),
                udp_enabled: true,
                tcp_enabled: true,
                udp_payload_size: 512,
            },
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut client = Self::new(&config.servers, config.timeout_ms)?;
        client.engine.udp_enabled = config.udp_enabled;
        client.engine.tcp_enabled = config.tcp_enabled;
        client.engine.udp_payload_size = config.udp_payload_size;
        Ok(client)
    }

    pub fn is_udp_enabled(&self) -> bool {
        self.engine.udp_enabled
    }

    pub fn set_udp_enabled(&mut self, enabled: bool) {
        self.engine.udp_enabled = enabled;
    }

    pub fn is_tcp_enabled(&self) -> bool {
        self.engine.tcp_enabled
    }

    pub fn set_tcp_enabled(&mut self, enabled: bool) {
        self.engine.tcp_enabled = enabled;
    }

    /// UDP receive cap; sizes above 512 are advertised via an EDNS OPT
    /// record on outgoing queries.
    pub fn set_udp_payload_size(&mut self, size: u16) {
        self.engine.udp_payload_size = size.max(512);
    }

    /// Resolve `name` with the given type and class.
    pub async fn resolve(
        &self,
        name: &str,
        rtype: RecordType,
        rclass: RecordClass,
        options: Option<QueryOptions>,
    ) -> Result<Message> {
        self.resolve_with_cancel(name, rtype, rclass, options, &CancellationToken::new())
            .await
    }

    /// Like [`resolve`](Self::resolve), aborting as soon as `cancel` fires.
    pub async fn resolve_with_cancel(
        &self,
        name: &str,
        rtype: RecordType,
        rclass: RecordClass,
        options: Option<QueryOptions>,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let name: Name = name.parse()?;
        let query = self.build_query(name, rtype, rclass, options.unwrap_or_default());
        self.send_message_with_cancel(query, cancel).await
    }

    /// Submit a prebuilt message.
    pub async fn send_message(&self, msg: Message) -> Result<Message> {
        self.send_message_with_cancel(msg, &CancellationToken::new())
            .await
    }

    pub async fn send_message_with_cancel(
        &self,
        msg: Message,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        validate_message(&msg)?;
        debug!("sending query: {}", msg);
        self.engine.send_query(&msg, cancel).await
    }

    /// Blocking wrapper around [`resolve`](Self::resolve). Must not be
    /// called from inside an async runtime.
    pub fn resolve_blocking(
        &self,
        name: &str,
        rtype: RecordType,
        rclass: RecordClass,
        options: Option<QueryOptions>,
    ) -> Result<Message> {
        blocking_runtime()?.block_on(self.resolve(name, rtype, rclass, options))
    }

    /// Blocking wrapper around [`send_message`](Self::send_message).
    pub fn send_message_blocking(&self, msg: Message) -> Result<Message> {
        blocking_runtime()?.block_on(self.send_message(msg))
    }

    fn build_query(
        &self,
        name: Name,
        rtype: RecordType,
        rclass: RecordClass,
        options: QueryOptions,
    ) -> Message {
        let mut msg = Message {
            // The engine assigns a fresh random ID per server attempt
            id: 0,
            flags: Flags {
                rd: options.recursion_desired,
                cd: options.checking_disabled,
                ..Flags::default()
            },
            questions: vec![Question::new(name, rtype, rclass)],
            ..Message::default()
        };

        if self.engine.udp_payload_size > 512 {
            msg.additionals.push(ResourceRecord {
                name: Name::root(),
                rtype: RecordType::OPT,
                // OPT reuses the class field as the payload-size advertisement
                rclass: RecordClass::from(self.engine.udp_payload_size),
                ttl: 0,
                rdata: RData::Opt(Vec::new()),
            });
        }
        msg
    }
}

fn blocking_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn validate_message(msg: &Message) -> Result<()> {
    if msg.questions.is_empty() {
        return Err(ClientError::InvalidArgument(
            "message carries no question".into(),
        ));
    }
    if msg.flags.opcode == OpCode::Update {
        // In update messages the first entry names the zone
        let zone = &msg.questions[0];
        if zone.name.is_root() {
            return Err(ClientError::InvalidArgument(
                "update message requires a zone name".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DnsClient {
        DnsClient::new(&["127.0.0.1"], 1000).unwrap()
    }

    #[test]
    fn test_new_validates_servers() {
        assert!(DnsClient::new::<&str>(&[], 1000).is_err());
        assert!(DnsClient::new(&["bogus address"], 1000).is_err());
        assert!(DnsClient::new(&["8.8.8.8", "1.1.1.1:53"], 1000).is_ok());
    }

    #[test]
    fn test_build_query_flags() {
        let msg = client().build_query(
            "example.com".parse().unwrap(),
            RecordType::A,
            RecordClass::IN,
            QueryOptions::default(),
        );
        assert!(!msg.flags.qr);
        assert_eq!(msg.flags.opcode, OpCode::Query);
        assert!(msg.flags.rd);
        assert!(!msg.flags.cd);
        assert_eq!(msg.questions.len(), 1);
        assert!(msg.additionals.is_empty());

        let no_rd = client().build_query(
            "example.com".parse().unwrap(),
            RecordType::A,
            RecordClass::IN,
            QueryOptions {
                recursion_desired: false,
                checking_disabled: true,
            },
        );
        assert!(!no_rd.flags.rd);
        assert!(no_rd.flags.cd);
    }

    #[test]
    fn test_edns_opt_attached_above_512() {
        let mut c = client();
        c.set_udp_payload_size(4096);
        let msg = c.build_query(
            "example.com".parse().unwrap(),
            RecordType::TXT,
            RecordClass::IN,
            QueryOptions::default(),
        );
        assert_eq!(msg.additionals.len(), 1);
        let opt = &msg.additionals[0];
        assert!(opt.name.is_root());
        assert_eq!(opt.rtype, RecordType::OPT);
        assert_eq!(opt.rclass.to_u16(), 4096);
    }

    #[test]
    fn test_validate_message() {
        assert!(validate_message(&Message::default()).is_err());

        let mut update = Message {
            questions: vec![Question::new(
                Name::root(),
                RecordType::SOA,
                RecordClass::IN,
            )],
            ..Message::default()
        };
        update.flags.opcode = OpCode::Update;
        assert!(validate_message(&update).is_err());

        update.questions[0].name = "example.com".parse().unwrap();
        assert!(validate_message(&update).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_name() {
        let err = client()
            .resolve("", RecordType::A, RecordClass::IN, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }
}
