//! Full DNS message codec: header flags, question and record sections,
//! compression-aware encoding with buffer sizing, and the continuation
//! predicate for multi-message TCP streams.

use std::fmt;

use crate::dns::name::Name;
use crate::dns::rdata::RData;
use crate::dns::types::{OpCode, Rcode, RecordClass, RecordType};
use crate::dns::wire::{self, NameCompressor};
use crate::error::WireError;

pub const HEADER_LEN: usize = 12;

/// Decomposed 16-bit header flags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub qr: bool,
    pub opcode: OpCode,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: bool,
    pub ad: bool,
    pub cd: bool,
    pub rcode: Rcode,
}

impl Flags {
    pub fn to_u16(&self) -> u16 {
        (self.qr as u16) << 15
            | (self.opcode.to_u8() as u16) << 11
            | (self.aa as u16) << 10
            | (self.tc as u16) << 9
            | (self.rd as u16) << 8
            | (self.ra as u16) << 7
            | (self.z as u16) << 6
            | (self.ad as u16) << 5
            | (self.cd as u16) << 4
            | (self.rcode.to_u8() as u16)
    }

    pub fn from_u16(v: u16) -> Self {
        Flags {
            qr: v & 0x8000 != 0,
            opcode: OpCode::from(((v >> 11) & 0xF) as u8),
            aa: v & 0x0400 != 0,
            tc: v & 0x0200 != 0,
            rd: v & 0x0100 != 0,
            ra: v & 0x0080 != 0,
            z: v & 0x0040 != 0,
            ad: v & 0x0020 != 0,
            cd: v & 0x0010 != 0,
            rcode: Rcode::from((v & 0xF) as u8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: Name,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

impl Question {
    pub fn new(name: Name, qtype: RecordType, qclass: RecordClass) -> Self {
        Question {
            name,
            qtype,
            qclass,
        }
    }

    /// Upper bound used for buffer sizing: name without compression + 4.
    pub fn max_len(&self) -> usize {
        self.name.max_encoded_len() + 4
    }

    fn encode(
        &self,
        buf: &mut Vec<u8>,
        compressor: Option<&mut NameCompressor>,
    ) -> Result<(), WireError> {
        wire::write_name(buf, &self.name, compressor)?;
        wire::put_u16(buf, self.qtype.to_u16());
        wire::put_u16(buf, self.qclass.to_u16());
        Ok(())
    }

    fn parse(buf: &[u8], offset: usize) -> Result<(Self, usize), WireError> {
        let (name, after_name) = wire::read_name(buf, offset)?;
        let qtype = RecordType::from(wire::get_u16(buf, after_name)?);
        let qclass = RecordClass::from(wire::get_u16(buf, after_name + 2)?);
        Ok((
            Question {
                name,
                qtype,
                qclass,
            },
            after_name + 4,
        ))
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.name,
            self.qclass.name(),
            self.qtype.name()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: Name,
    pub rtype: RecordType,
    pub rclass: RecordClass,
    pub ttl: u32,
    pub rdata: RData,
}

impl ResourceRecord {
    /// Upper bound used for buffer sizing: name + fixed 10-byte header + rdata.
    pub fn max_len(&self) -> usize {
        self.name.max_encoded_len() + 10 + self.rdata.max_len()
    }

    fn encode(
        &self,
        buf: &mut Vec<u8>,
        mut compressor: Option<&mut NameCompressor>,
    ) -> Result<(), WireError> {
        wire::write_name(buf, &self.name, compressor.as_deref_mut())?;
        wire::put_u16(buf, self.rtype.to_u16());
        wire::put_u16(buf, self.rclass.to_u16());
        wire::put_u32(buf, self.ttl);

        // RDLENGTH placeholder, patched once the rdata is written
        let len_at = buf.len();
        wire::put_u16(buf, 0);
        let rdata_compressor = if self.rdata.compressible() {
            compressor
        } else {
            None
        };
        self.rdata.encode(buf, rdata_compressor)?;
        let rdlength = (buf.len() - len_at - 2) as u16;
        buf[len_at..len_at + 2].copy_from_slice(&rdlength.to_be_bytes());
        Ok(())
    }

    fn parse(buf: &[u8], offset: usize) -> Result<(Self, usize), WireError> {
        let (name, after_name) = wire::read_name(buf, offset)?;
        let rtype = RecordType::from(wire::get_u16(buf, after_name)?);
        let rclass = RecordClass::from(wire::get_u16(buf, after_name + 2)?);
        let ttl = wire::get_u32(buf, after_name + 4)?;
        let rdlength = wire::get_u16(buf, after_name + 8)? as usize;
        let rdata_at = after_name + 10;
        let rdata = RData::parse(rtype, buf, rdata_at, rdlength)?;
        Ok((
            ResourceRecord {
                name,
                rtype,
                rclass,
                ttl,
                rdata,
            },
            rdata_at + rdlength,
        ))
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name,
            self.ttl,
            self.rclass.name(),
            self.rtype.name(),
            self.rdata
        )
    }
}

/// A whole DNS message. Section counts are derived from the vector lengths
/// at encode time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub flags: Flags,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    pub fn first_question(&self) -> Option<&Question> {
        self.questions.first()
    }

    pub fn rcode(&self) -> Rcode {
        self.flags.rcode
    }

    /// Upper bound on the encoded size over all four sections.
    pub fn max_len(&self) -> usize {
        HEADER_LEN
            + self.questions.iter().map(|q| q.max_len()).sum::<usize>()
            + self.answers.iter().map(|r| r.max_len()).sum::<usize>()
            + self.authorities.iter().map(|r| r.max_len()).sum::<usize>()
            + self.additionals.iter().map(|r| r.max_len()).sum::<usize>()
    }

    /// Serialize with name compression.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        self.encode_impl(true)
    }

    /// Canonical serialization: compression off, every label lowercased.
    /// Deterministic for equal messages.
    pub fn encode_canonical(&self) -> Result<Vec<u8>, WireError> {
        self.lowercased().encode_impl(false)
    }

    fn encode_impl(&self, compress: bool) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(self.max_len());
        let mut table = NameCompressor::new();

        wire::put_u16(&mut buf, self.id);
        wire::put_u16(&mut buf, self.flags.to_u16());
        wire::put_u16(&mut buf, self.questions.len() as u16);
        wire::put_u16(&mut buf, self.answers.len() as u16);
        wire::put_u16(&mut buf, self.authorities.len() as u16);
        wire::put_u16(&mut buf, self.additionals.len() as u16);

        for q in &self.questions {
            q.encode(&mut buf, compress.then_some(&mut table))?;
        }
        for section in [&self.answers, &self.authorities, &self.additionals] {
            for r in section {
                r.encode(&mut buf, compress.then_some(&mut table))?;
            }
        }
        Ok(buf)
    }

    /// Parse a complete message from raw bytes.
    pub fn parse(buf: &[u8]) -> Result<Message, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::TooShort(buf.len()));
        }
        let id = wire::get_u16(buf, 0)?;
        let flags = Flags::from_u16(wire::get_u16(buf, 2)?);
        let qd_count = wire::get_u16(buf, 4)?;
        let an_count = wire::get_u16(buf, 6)?;
        let ns_count = wire::get_u16(buf, 8)?;
        let ar_count = wire::get_u16(buf, 10)?;

        let mut offset = HEADER_LEN;
        let mut questions = Vec::with_capacity(qd_count as usize);
        for _ in 0..qd_count {
            let (q, next) = Question::parse(buf, offset)?;
            questions.push(q);
            offset = next;
        }

        let mut sections: [Vec<ResourceRecord>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for (section, count) in sections.iter_mut().zip([an_count, ns_count, ar_count]) {
            for _ in 0..count {
                let (r, next) = ResourceRecord::parse(buf, offset)?;
                section.push(r);
                offset = next;
            }
        }
        let [answers, authorities, additionals] = sections;

        Ok(Message {
            id,
            flags,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// True when this response is part of a multi-message TCP stream and
    /// more frames should be read from the same connection. Zone transfers
    /// stream until the opening SOA appears again; `soa_seen` is the
    /// cumulative SOA count over the stream including this message.
    pub fn expects_continuation(&self, soa_seen: usize) -> bool {
        let is_xfr = self
            .first_question()
            .map(|q| q.qtype.is_zone_transfer())
            .unwrap_or(false);
        is_xfr && soa_seen < 2
    }

    /// SOA records in the answer section, for zone-transfer accounting.
    pub fn soa_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|r| r.rtype == RecordType::SOA)
            .count()
    }

    /// Fold a continuation frame into this message: record sections are
    /// concatenated, the first frame's header and questions stand.
    pub fn absorb(&mut self, other: Message) {
        self.answers.extend(other.answers);
        self.authorities.extend(other.authorities);
        self.additionals.extend(other.additionals);
    }

    /// Whether this message is a plausible response to `query`: matching
    /// transaction ID, QR set, and the same first question.
    pub fn is_response_to(&self, query: &Message) -> bool {
        self.id == query.id
            && self.flags.qr
            && match (self.first_question(), query.first_question()) {
                (Some(a), Some(b)) => a.name == b.name && a.qtype == b.qtype && a.qclass == b.qclass,
                // Some servers echo no question; accept on ID + QR alone
                (None, _) => true,
                _ => false,
            }
    }

    fn lowercased(&self) -> Message {
        let mut msg = self.clone();
        for q in &mut msg.questions {
            q.name = q.name.to_lowercase();
        }
        for section in [
            &mut msg.answers,
            &mut msg.authorities,
            &mut msg.additionals,
        ] {
            for r in section.iter_mut() {
                r.name = r.name.to_lowercase();
                r.rdata = lowercase_rdata_names(&r.rdata);
            }
        }
        msg
    }
}

fn lowercase_rdata_names(rdata: &RData) -> RData {
    match rdata {
        RData::Ns(n) => RData::Ns(n.to_lowercase()),
        RData::Cname(n) => RData::Cname(n.to_lowercase()),
        RData::Ptr(n) => RData::Ptr(n.to_lowercase()),
        RData::Mx {
            preference,
            exchange,
        } => RData::Mx {
            preference: *preference,
            exchange: exchange.to_lowercase(),
        },
        RData::Soa {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        } => RData::Soa {
            mname: mname.to_lowercase(),
            rname: rname.to_lowercase(),
            serial: *serial,
            refresh: *refresh,
            retry: *retry,
            expire: *expire,
            minimum: *minimum,
        },
        RData::Srv {
            priority,
            weight,
            port,
            target,
        } => RData::Srv {
            priority: *priority,
            weight: *weight,
            port: *port,
            target: target.to_lowercase(),
        },
        other => other.clone(),
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(q) = self.first_question() {
            write!(
                f,
                "{} {} (answers: {})",
                q.name,
                q.qtype.name(),
                self.answers.len()
            )
        } else {
            write!(f, "(empty message)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn example_query() -> Message {
        Message {
            id: 0x1234,
            flags: Flags {
                rd: true,
                ..Flags::default()
            },
            questions: vec![Question::new(
                "example.com".parse().unwrap(),
                RecordType::A,
                RecordClass::IN,
            )],
            ..Message::default()
        }
    }

    #[test]
    fn test_query_wire_bytes() {
        let buf = example_query().encode().unwrap();
        // Header: ID=0x1234, flags RD only, QD=1
        assert_eq!(
            &buf[..12],
            &[0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        // QNAME, QTYPE=A, QCLASS=IN
        assert_eq!(&buf[12..], b"\x07example\x03com\x00\x00\x01\x00\x01");
    }

    #[test]
    fn test_message_roundtrip() {
        let mut msg = example_query();
        msg.flags.qr = true;
        msg.flags.ra = true;
        msg.answers.push(ResourceRecord {
            name: "example.com".parse().unwrap(),
            rtype: RecordType::A,
            rclass: RecordClass::IN,
            ttl: 300,
            rdata: RData::A(Ipv4Addr::new(93, 184, 216, 34)),
        });
        msg.authorities.push(ResourceRecord {
            name: "example.com".parse().unwrap(),
            rtype: RecordType::NS,
            rclass: RecordClass::IN,
            ttl: 86400,
            rdata: RData::Ns("ns1.example.com".parse().unwrap()),
        });

        let buf = msg.encode().unwrap();
        assert!(buf.len() <= msg.max_len());
        let parsed = Message::parse(&buf).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_roundtrip_over_covered_rdata_types() {
        let mut msg = example_query();
        msg.flags.qr = true;
        let name: Name = "example.com".parse().unwrap();
        let rdatas = [
            (RecordType::A, RData::A(Ipv4Addr::new(192, 0, 2, 1))),
            (
                RecordType::AAAA,
                RData::Aaaa("2001:db8::1".parse().unwrap()),
            ),
            (
                RecordType::MX,
                RData::Mx {
                    preference: 10,
                    exchange: "mail.example.com".parse().unwrap(),
                },
            ),
            (
                RecordType::TXT,
                RData::Txt(vec!["v=spf1".into(), "-all".into()]),
            ),
            (
                RecordType::SRV,
                RData::Srv {
                    priority: 0,
                    weight: 5,
                    port: 5060,
                    target: "sip.example.com".parse().unwrap(),
                },
            ),
            (RecordType::Unknown(4242), RData::Raw(vec![1, 2, 3])),
        ];
        for (rtype, rdata) in rdatas {
            msg.answers.push(ResourceRecord {
                name: name.clone(),
                rtype,
                rclass: RecordClass::IN,
                ttl: 120,
                rdata,
            });
        }

        let buf = msg.encode().unwrap();
        let parsed = Message::parse(&buf).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.id, msg.id);
        assert_eq!(parsed.flags, msg.flags);
    }

    #[test]
    fn test_parser_survives_garbage() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x6b6f6e656b6f);
        for _ in 0..2000 {
            let len = rng.gen_range(0..200);
            let buf: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            // Either a Message or a format error; never a panic or a hang
            let _ = Message::parse(&buf);
        }

        // Single-byte mutations of a valid response
        let mut valid = example_query();
        valid.flags.qr = true;
        valid.answers.push(ResourceRecord {
            name: "a.example.com".parse().unwrap(),
            rtype: RecordType::CNAME,
            rclass: RecordClass::IN,
            ttl: 60,
            rdata: RData::Cname("example.com".parse().unwrap()),
        });
        let valid = valid.encode().unwrap();
        for _ in 0..2000 {
            let mut buf = valid.clone();
            let idx = rng.gen_range(0..buf.len());
            buf[idx] = rng.gen();
            let _ = Message::parse(&buf);
        }
    }

    #[test]
    fn test_compressed_ns_pointing_at_question() {
        // Hand-built response: question at offset 12, NS rdata = pointer to it
        let mut buf = Vec::new();
        wire::put_u16(&mut buf, 0xBEEF);
        wire::put_u16(&mut buf, 0x8180); // QR, RD, RA
        wire::put_u16(&mut buf, 1); // QDCOUNT
        wire::put_u16(&mut buf, 1); // ANCOUNT
        wire::put_u16(&mut buf, 0);
        wire::put_u16(&mut buf, 0);
        buf.extend_from_slice(b"\x07example\x03com\x00");
        buf.extend_from_slice(&[0x00, 0x02, 0x00, 0x01]); // NS IN
        buf.extend_from_slice(&[0xC0, 0x0C]); // owner: pointer to QNAME
        buf.extend_from_slice(&[0x00, 0x02, 0x00, 0x01]); // NS IN
        wire::put_u32(&mut buf, 3600);
        wire::put_u16(&mut buf, 2); // RDLENGTH
        buf.extend_from_slice(&[0xC0, 0x0C]); // NSDNAME: pointer to offset 12

        let msg = Message::parse(&buf).unwrap();
        assert_eq!(
            msg.answers[0].rdata,
            RData::Ns("example.com".parse().unwrap())
        );
    }

    #[test]
    fn test_compression_preserves_semantics() {
        let mut msg = example_query();
        msg.flags.qr = true;
        for host in ["a.example.com", "b.example.com", "example.com"] {
            msg.answers.push(ResourceRecord {
                name: host.parse().unwrap(),
                rtype: RecordType::CNAME,
                rclass: RecordClass::IN,
                ttl: 60,
                rdata: RData::Cname("target.example.com".parse().unwrap()),
            });
        }

        let compressed = msg.encode().unwrap();
        let canonical = msg.encode_canonical().unwrap();
        assert!(compressed.len() < canonical.len());
        assert_eq!(
            Message::parse(&compressed).unwrap(),
            Message::parse(&canonical).unwrap()
        );
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let mut upper = example_query();
        upper.questions[0].name = "EXAMPLE.Com".parse().unwrap();
        let lower = example_query();
        assert_eq!(
            upper.encode_canonical().unwrap(),
            lower.encode_canonical().unwrap()
        );
    }

    #[test]
    fn test_flags_roundtrip() {
        for bits in [0x0000u16, 0x8180, 0x8403, 0x2910, 0xFFFF] {
            let flags = Flags::from_u16(bits);
            assert_eq!(flags.to_u16(), bits);
        }
    }

    #[test]
    fn test_is_response_to() {
        let query = example_query();
        let mut resp = query.clone();
        resp.flags.qr = true;
        assert!(resp.is_response_to(&query));

        let mut wrong_id = resp.clone();
        wrong_id.id = 0x4321;
        assert!(!wrong_id.is_response_to(&query));

        let mut not_response = query.clone();
        not_response.flags.qr = false;
        assert!(!not_response.is_response_to(&query));

        let mut other_question = resp.clone();
        other_question.questions[0].name = "other.com".parse().unwrap();
        assert!(!other_question.is_response_to(&query));
    }

    #[test]
    fn test_axfr_continuation_predicate() {
        let mut msg = example_query();
        msg.questions[0].qtype = RecordType::AXFR;
        msg.flags.qr = true;
        assert!(msg.expects_continuation(1));
        assert!(!msg.expects_continuation(2));

        let plain = example_query();
        assert!(!plain.expects_continuation(0));
    }

    #[test]
    fn test_parse_rejects_short_buffers() {
        assert!(matches!(
            Message::parse(&[0u8; 5]),
            Err(WireError::TooShort(5))
        ));
    }
}
