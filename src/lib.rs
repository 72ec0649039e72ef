//! koneko-dns - async DNS client library.
//!
//! Hand-parsed RFC 1035 wire codec plus a transport engine that walks an
//! ordered resolver list over UDP and TCP, honoring a total time budget and
//! external cancellation.
//!
//! ```no_run
//! use koneko_dns::{DnsClient, RecordClass, RecordType};
//!
//! # async fn demo() -> Result<(), koneko_dns::ClientError> {
//! let client = DnsClient::new(&["1.1.1.1"], 5000)?;
//! let response = client
//!     .resolve("example.com", RecordType::A, RecordClass::IN, None)
//!     .await?;
//! for answer in &response.answers {
//!     println!("{}", answer);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod resolver;
pub mod transport;

pub use client::{DnsClient, QueryOptions};
pub use config::ClientConfig;
pub use dns::message::{Flags, Message, Question, ResourceRecord};
pub use dns::name::Name;
pub use dns::rdata::RData;
pub use dns::types::{OpCode, Rcode, RecordClass, RecordType};
pub use error::{ClientError, WireError};

// Callers hand this to the *_with_cancel entry points
pub use tokio_util::sync::CancellationToken;
