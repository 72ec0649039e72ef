use thiserror::Error;

/// Errors raised while decoding or encoding the DNS wire format.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("message truncated at offset {0}")]
    Truncated(usize),
    #[error("invalid name label at offset {0}")]
    InvalidLabel(usize),
    #[error("label too long: {0} bytes (max 63)")]
    LabelTooLong(usize),
    #[error("name exceeds 255 encoded octets")]
    NameTooLong,
    #[error("name has too many labels (max 127)")]
    TooManyLabels,
    #[error("compression pointer at offset {at} does not point backwards (target {target})")]
    BadPointer { at: usize, target: usize },
    #[error("unsupported extended label type 0x{0:02x}")]
    UnsupportedLabel(u8),
    #[error("rdata for {rtype} did not consume its RDLENGTH ({parsed} of {expected} bytes)")]
    RdataLength {
        rtype: &'static str,
        parsed: usize,
        expected: usize,
    },
    #[error("message too short: {0} bytes (minimum 12)")]
    TooShort(usize),
}

/// Errors surfaced by the client and the resolution engine.
///
/// DNS-level RCODEs (NXDOMAIN, SERVFAIL, ...) are not errors - they are
/// delivered in the parsed [`Message`](crate::dns::message::Message) for the
/// caller to interpret.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Format(#[from] WireError),
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// Internal signal: UDP response arrived with TC=1 and TCP is available.
    /// The engine catches this and retries the same server over TCP.
    #[error("response truncated")]
    Truncated,
    #[error("query timed out")]
    Timeout,
    #[error("query cancelled")]
    Cancelled,
    #[error("no response from any server")]
    NoResponse {
        #[source]
        last: Option<Box<ClientError>>,
    },
}

impl ClientError {
    /// Whether this error aborts the whole query instead of falling through
    /// to the next server.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Cancelled | ClientError::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
