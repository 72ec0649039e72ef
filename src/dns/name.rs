use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::ClientError;

/// Maximum number of labels a single name may carry. Bounds every decode
/// loop in the wire codec.
pub const MAX_LABELS: usize = 127;

/// Maximum encoded length of a name (length octets + label octets + root).
pub const MAX_NAME_LEN: usize = 255;

/// A domain name as an ordered label sequence. The empty sequence is the
/// root. Labels keep their original case; comparison and hashing are
/// ASCII-case-insensitive per DNS rules.
#[derive(Debug, Clone, Default)]
pub struct Name {
    labels: Vec<String>,
}

impl Name {
    /// The root name (zero labels).
    pub fn root() -> Self {
        Name { labels: Vec::new() }
    }

    /// Build a name from already-decoded wire labels. Skips presentation-form
    /// validation: decoded binary-EDNS labels render longer than 63 chars.
    pub(crate) fn from_wire_labels(labels: Vec<String>) -> Self {
        Name { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Drop the first label. Returns None for the root.
    pub fn parent(&self) -> Option<Name> {
        if self.labels.is_empty() {
            return None;
        }
        Some(Name {
            labels: self.labels[1..].to_vec(),
        })
    }

    /// Labels of `self` followed by the labels of `other`.
    pub fn concat(&self, other: &Name) -> Name {
        let mut labels = self.labels.clone();
        labels.extend(other.labels.iter().cloned());
        Name { labels }
    }

    /// Canonical lowercase form, used for canonical wire encoding and as the
    /// compression-table key.
    pub fn to_lowercase(&self) -> Name {
        Name {
            labels: self.labels.iter().map(|l| l.to_lowercase()).collect(),
        }
    }

    /// Upper bound on the encoded size: one length octet per label plus the
    /// label bytes, plus the terminating root octet. Compression only ever
    /// shrinks this.
    pub fn max_encoded_len(&self) -> usize {
        self.labels.iter().map(|l| 1 + l.len()).sum::<usize>() + 1
    }

    /// Lowercased dotted form used as a map key (case-insensitive lookups).
    pub(crate) fn canonical_key(&self) -> String {
        let mut key = String::with_capacity(64);
        for label in &self.labels {
            for c in label.chars() {
                key.extend(c.to_lowercase());
            }
            key.push('.');
        }
        key
    }
}

impl FromStr for Name {
    type Err = ClientError;

    /// Parse a presentation-form name. A trailing dot is accepted, `.` is the
    /// root, and the empty string is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ClientError::InvalidArgument("empty domain name".into()));
        }
        if s == "." {
            return Ok(Name::root());
        }

        let trimmed = s.strip_suffix('.').unwrap_or(s);
        let mut labels = Vec::new();
        let mut encoded_len = 1; // terminating root octet

        for label in trimmed.split('.') {
            if label.is_empty() {
                return Err(ClientError::InvalidArgument(format!(
                    "empty label in domain name '{}'",
                    s
                )));
            }
            if label.len() > 63 {
                return Err(ClientError::InvalidArgument(format!(
                    "label '{}' exceeds 63 octets",
                    label
                )));
            }
            encoded_len += 1 + label.len();
            labels.push(label.to_string());
        }

        if encoded_len > MAX_NAME_LEN {
            return Err(ClientError::InvalidArgument(format!(
                "domain name '{}' exceeds {} encoded octets",
                s, MAX_NAME_LEN
            )));
        }
        if labels.len() > MAX_LABELS {
            return Err(ClientError::InvalidArgument(format!(
                "domain name '{}' has too many labels",
                s
            )));
        }

        Ok(Name { labels })
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in &self.labels {
            for b in label.as_bytes() {
                state.write_u8(b.to_ascii_lowercase());
            }
            state.write_u8(0);
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, "{}.", label)?;
        }
        Ok(())
    }
}
