//! Record-data payloads as a sum type keyed by [`RecordType`], with
//! parse / encode / max_len dispatch. Unknown types keep their opaque bytes
//! so they survive a round-trip untouched (RFC 3597).

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::dns::name::Name;
use crate::dns::types::RecordType;
use crate::dns::wire::{self, NameCompressor};
use crate::error::WireError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(Name),
    Cname(Name),
    Ptr(Name),
    Mx {
        preference: u16,
        exchange: Name,
    },
    /// TXT character-strings, chunk boundaries preserved
    Txt(Vec<String>),
    Soa {
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: Name,
    },
    /// EDNS OPT pseudo-record payload, carried opaquely
    Opt(Vec<u8>),
    /// Any type without a dedicated parser
    Raw(Vec<u8>),
}

impl RData {
    /// Parse RDATA for `rtype` out of the enclosing message buffer. `buf` is
    /// the whole message so embedded names may follow compression pointers.
    /// Exactly `rdlength` bytes must be consumed.
    pub fn parse(
        rtype: RecordType,
        buf: &[u8],
        offset: usize,
        rdlength: usize,
    ) -> Result<RData, WireError> {
        let end = offset + rdlength;
        if end > buf.len() {
            return Err(WireError::Truncated(offset));
        }

        match rtype {
            RecordType::A => {
                expect_len(rtype, rdlength, 4)?;
                Ok(RData::A(Ipv4Addr::new(
                    buf[offset],
                    buf[offset + 1],
                    buf[offset + 2],
                    buf[offset + 3],
                )))
            }
            RecordType::AAAA => {
                expect_len(rtype, rdlength, 16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[offset..end]);
                Ok(RData::Aaaa(Ipv6Addr::from(octets)))
            }
            RecordType::NS | RecordType::CNAME | RecordType::PTR => {
                let (name, consumed_to) = wire::read_name(buf, offset)?;
                check_consumed(rtype, consumed_to - offset, rdlength)?;
                Ok(match rtype {
                    RecordType::NS => RData::Ns(name),
                    RecordType::CNAME => RData::Cname(name),
                    _ => RData::Ptr(name),
                })
            }
            RecordType::MX => {
                let preference = wire::get_u16(buf, offset)?;
                let (exchange, consumed_to) = wire::read_name(buf, offset + 2)?;
                check_consumed(rtype, consumed_to - offset, rdlength)?;
                Ok(RData::Mx {
                    preference,
                    exchange,
                })
            }
            RecordType::TXT => {
                let mut strings = Vec::new();
                let mut pos = offset;
                while pos < end {
                    let len = buf[pos] as usize;
                    pos += 1;
                    if pos + len > end {
                        return Err(WireError::Truncated(pos));
                    }
                    strings.push(String::from_utf8_lossy(&buf[pos..pos + len]).into_owned());
                    pos += len;
                }
                Ok(RData::Txt(strings))
            }
            RecordType::SOA => {
                let (mname, after_mname) = wire::read_name(buf, offset)?;
                let (rname, after_rname) = wire::read_name(buf, after_mname)?;
                if after_rname + 20 > buf.len() {
                    return Err(WireError::Truncated(after_rname));
                }
                check_consumed(rtype, after_rname + 20 - offset, rdlength)?;
                Ok(RData::Soa {
                    mname,
                    rname,
                    serial: wire::get_u32(buf, after_rname)?,
                    refresh: wire::get_u32(buf, after_rname + 4)?,
                    retry: wire::get_u32(buf, after_rname + 8)?,
                    expire: wire::get_u32(buf, after_rname + 12)?,
                    minimum: wire::get_u32(buf, after_rname + 16)?,
                })
            }
            RecordType::SRV => {
                if rdlength < 7 {
                    return Err(WireError::Truncated(offset));
                }
                let (target, consumed_to) = wire::read_name(buf, offset + 6)?;
                check_consumed(rtype, consumed_to - offset, rdlength)?;
                Ok(RData::Srv {
                    priority: wire::get_u16(buf, offset)?,
                    weight: wire::get_u16(buf, offset + 2)?,
                    port: wire::get_u16(buf, offset + 4)?,
                    target,
                })
            }
            RecordType::OPT => Ok(RData::Opt(buf[offset..end].to_vec())),
            _ => Ok(RData::Raw(buf[offset..end].to_vec())),
        }
    }

    /// Append the RDATA bytes (without RDLENGTH) to `buf`. The compressor is
    /// only passed in by the message encoder for types whose embedded names
    /// the RFC 1035 well-known set allows to be compressed.
    pub fn encode(
        &self,
        buf: &mut Vec<u8>,
        mut compressor: Option<&mut NameCompressor>,
    ) -> Result<(), WireError> {
        match self {
            RData::A(ip) => buf.extend_from_slice(&ip.octets()),
            RData::Aaaa(ip) => buf.extend_from_slice(&ip.octets()),
            RData::Ns(name) | RData::Cname(name) | RData::Ptr(name) => {
                wire::write_name(buf, name, compressor)?;
            }
            RData::Mx {
                preference,
                exchange,
            } => {
                wire::put_u16(buf, *preference);
                wire::write_name(buf, exchange, compressor)?;
            }
            RData::Txt(strings) => {
                for s in strings {
                    let bytes = s.as_bytes();
                    let len = bytes.len().min(255);
                    buf.push(len as u8);
                    buf.extend_from_slice(&bytes[..len]);
                }
                if strings.is_empty() {
                    buf.push(0);
                }
            }
            RData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                wire::write_name(buf, mname, compressor.as_deref_mut())?;
                wire::write_name(buf, rname, compressor)?;
                wire::put_u32(buf, *serial);
                wire::put_u32(buf, *refresh);
                wire::put_u32(buf, *retry);
                wire::put_u32(buf, *expire);
                wire::put_u32(buf, *minimum);
            }
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                wire::put_u16(buf, *priority);
                wire::put_u16(buf, *weight);
                wire::put_u16(buf, *port);
                // SRV targets are not in the RFC 1035 set: never compressed
                wire::write_name(buf, target, None)?;
            }
            RData::Opt(data) | RData::Raw(data) => buf.extend_from_slice(data),
        }
        Ok(())
    }

    /// Upper bound on the encoded size; compression can only shrink it.
    pub fn max_len(&self) -> usize {
        match self {
            RData::A(_) => 4,
            RData::Aaaa(_) => 16,
            RData::Ns(name) | RData::Cname(name) | RData::Ptr(name) => name.max_encoded_len(),
            RData::Mx { exchange, .. } => 2 + exchange.max_encoded_len(),
            RData::Txt(strings) => {
                let body: usize = strings.iter().map(|s| 1 + s.len().min(255)).sum();
                body.max(1)
            }
            RData::Soa { mname, rname, .. } => {
                mname.max_encoded_len() + rname.max_encoded_len() + 20
            }
            RData::Srv { target, .. } => 6 + target.max_encoded_len(),
            RData::Opt(data) | RData::Raw(data) => data.len(),
        }
    }

    /// Whether embedded names may use compression pointers when encoding.
    pub fn compressible(&self) -> bool {
        matches!(
            self,
            RData::Ns(_) | RData::Cname(_) | RData::Ptr(_) | RData::Mx { .. } | RData::Soa { .. }
        )
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(ip) => write!(f, "{}", ip),
            RData::Aaaa(ip) => write!(f, "{}", ip),
            RData::Ns(name) | RData::Cname(name) | RData::Ptr(name) => write!(f, "{}", name),
            RData::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RData::Txt(strings) => write!(f, "\"{}\"", strings.concat()),
            RData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{} {} {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            RData::Opt(data) => write!(f, "(opt {} bytes)", data.len()),
            RData::Raw(data) => write!(f, "(binary {} bytes)", data.len()),
        }
    }
}

fn expect_len(rtype: RecordType, got: usize, want: usize) -> Result<(), WireError> {
    if got != want {
        return Err(WireError::RdataLength {
            rtype: rtype_label(rtype),
            parsed: got,
            expected: want,
        });
    }
    Ok(())
}

fn check_consumed(rtype: RecordType, consumed: usize, rdlength: usize) -> Result<(), WireError> {
    if consumed != rdlength {
        return Err(WireError::RdataLength {
            rtype: rtype_label(rtype),
            parsed: consumed,
            expected: rdlength,
        });
    }
    Ok(())
}

fn rtype_label(rtype: RecordType) -> &'static str {
    match rtype {
        RecordType::A => "A",
        RecordType::AAAA => "AAAA",
        RecordType::NS => "NS",
        RecordType::CNAME => "CNAME",
        RecordType::PTR => "PTR",
        RecordType::MX => "MX",
        RecordType::TXT => "TXT",
        RecordType::SOA => "SOA",
        RecordType::SRV => "SRV",
        RecordType::OPT => "OPT",
        _ => "rdata",
    }
}
