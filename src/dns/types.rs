/// DNS record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT, // EDNS
    IXFR,
    AXFR,
    ANY,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(v: u16) -> Self {
        match v {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            41 => RecordType::OPT,
            251 => RecordType::IXFR,
            252 => RecordType::AXFR,
            255 => RecordType::ANY,
            other => RecordType::Unknown(other),
        }
    }
}

impl RecordType {
    pub fn to_u16(&self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::OPT => 41,
            RecordType::IXFR => 251,
            RecordType::AXFR => 252,
            RecordType::ANY => 255,
            RecordType::Unknown(v) => *v,
        }
    }

    pub fn name(&self) -> String {
        match self {
            RecordType::A => "A".into(),
            RecordType::NS => "NS".into(),
            RecordType::CNAME => "CNAME".into(),
            RecordType::SOA => "SOA".into(),
            RecordType::PTR => "PTR".into(),
            RecordType::MX => "MX".into(),
            RecordType::TXT => "TXT".into(),
            RecordType::AAAA => "AAAA".into(),
            RecordType::SRV => "SRV".into(),
            RecordType::OPT => "OPT".into(),
            RecordType::IXFR => "IXFR".into(),
            RecordType::AXFR => "AXFR".into(),
            RecordType::ANY => "ANY".into(),
            RecordType::Unknown(v) => format!("TYPE{}", v),
        }
    }

    /// Zone-transfer queries stream multiple messages over one TCP connection.
    pub fn is_zone_transfer(&self) -> bool {
        matches!(self, RecordType::AXFR | RecordType::IXFR)
    }

    /// Parse a presentation-form type name ("A", "AAAA", "TYPE123").
    pub fn from_name(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "A" => Some(RecordType::A),
            "NS" => Some(RecordType::NS),
            "CNAME" => Some(RecordType::CNAME),
            "SOA" => Some(RecordType::SOA),
            "PTR" => Some(RecordType::PTR),
            "MX" => Some(RecordType::MX),
            "TXT" => Some(RecordType::TXT),
            "AAAA" => Some(RecordType::AAAA),
            "SRV" => Some(RecordType::SRV),
            "IXFR" => Some(RecordType::IXFR),
            "AXFR" => Some(RecordType::AXFR),
            "ANY" => Some(RecordType::ANY),
            _ => upper
                .strip_prefix("TYPE")
                .and_then(|n| n.parse::<u16>().ok())
                .map(RecordType::from),
        }
    }
}

/// DNS class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    IN,
    CH,
    HS,
    ANY,
    Unknown(u16),
}

impl From<u16> for RecordClass {
    fn from(v: u16) -> Self {
        match v {
            1 => RecordClass::IN,
            3 => RecordClass::CH,
            4 => RecordClass::HS,
            255 => RecordClass::ANY,
            other => RecordClass::Unknown(other),
        }
    }
}

impl RecordClass {
    pub fn to_u16(&self) -> u16 {
        match self {
            RecordClass::IN => 1,
            RecordClass::CH => 3,
            RecordClass::HS => 4,
            RecordClass::ANY => 255,
            RecordClass::Unknown(v) => *v,
        }
    }

    pub fn name(&self) -> String {
        match self {
            RecordClass::IN => "IN".into(),
            RecordClass::CH => "CH".into(),
            RecordClass::HS => "HS".into(),
            RecordClass::ANY => "ANY".into(),
            RecordClass::Unknown(v) => format!("CLASS{}", v),
        }
    }
}

/// Header OPCODE field (bits 14-11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpCode {
    #[default]
    Query,
    IQuery,
    Status,
    Notify,
    Update,
    Unknown(u8),
}

impl From<u8> for OpCode {
    fn from(v: u8) -> Self {
        match v {
            0 => OpCode::Query,
            1 => OpCode::IQuery,
            2 => OpCode::Status,
            4 => OpCode::Notify,
            5 => OpCode::Update,
            other => OpCode::Unknown(other & 0xF),
        }
    }
}

impl OpCode {
    pub fn to_u8(&self) -> u8 {
        match self {
            OpCode::Query => 0,
            OpCode::IQuery => 1,
            OpCode::Status => 2,
            OpCode::Notify => 4,
            OpCode::Update => 5,
            OpCode::Unknown(v) => *v,
        }
    }
}

/// DNS response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rcode {
    #[default]
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    Unknown(u8),
}

impl From<u8> for Rcode {
    fn from(v: u8) -> Self {
        match v {
            0 => Rcode::NoError,
            1 => Rcode::FormErr,
            2 => Rcode::ServFail,
            3 => Rcode::NxDomain,
            4 => Rcode::NotImp,
            5 => Rcode::Refused,
            other => Rcode::Unknown(other & 0xF),
        }
    }
}

impl Rcode {
    pub fn to_u8(&self) -> u8 {
        match self {
            Rcode::NoError => 0,
            Rcode::FormErr => 1,
            Rcode::ServFail => 2,
            Rcode::NxDomain => 3,
            Rcode::NotImp => 4,
            Rcode::Refused => 5,
            Rcode::Unknown(v) => *v,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Rcode::NoError => "NOERROR".into(),
            Rcode::FormErr => "FORMERR".into(),
            Rcode::ServFail => "SERVFAIL".into(),
            Rcode::NxDomain => "NXDOMAIN".into(),
            Rcode::NotImp => "NOTIMP".into(),
            Rcode::Refused => "REFUSED".into(),
            Rcode::Unknown(v) => format!("RCODE{}", v),
        }
    }
}
