//! Firmware description table acquisition and validation.
//!
//! - [`source`]: where raw table bytes come from (sysfs, override files,
//!   acpidump text, a spawned dump tool).
//! - [`header`]: the fixed header prefix shared by every table and its checksum.
//! - [`registry`]: per-session cache of validated instances keyed by signature.
//! - [`rules`]: the closed set of per-signature semantic rules.

pub mod dump;
pub mod header;
pub mod registry;
pub mod rules;
pub mod source;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use header::{checksum_ok, TableHeader, FACS_MIN_LEN, HEADER_SIZE};
pub use registry::{TableInstance, TableRegistry, TableSet};
pub use rules::TableRule;
pub use source::{ByteSource, Origin, RawTable};

/// Four printable ASCII characters identifying a table type, e.g. `RSDT`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature([u8; 4]);

impl Signature {
    pub fn new(bytes: [u8; 4]) -> Result<Self, TableError> {
        if bytes.iter().all(|b| b.is_ascii_graphic()) {
            Ok(Self(bytes))
        } else {
            Err(TableError::InvalidSignature(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees printable ASCII.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl FromStr for Signature {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| TableError::InvalidSignature(s.to_string()))?;
        Self::new(bytes)
    }
}

impl TryFrom<String> for Signature {
    type Error = TableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.as_str().to_string()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.as_str())
    }
}

/// Errors from table acquisition and validation.
///
/// A bad checksum is deliberately absent: it is reported as a
/// `<SIG>BadChecksum` finding and inspection continues.
#[derive(Debug, Clone, Error)]
pub enum TableError {
    #[error("Invalid table signature '{0}'; expected 4 printable ASCII characters")]
    InvalidSignature(String),

    /// No instance of the signature exists. Callers decide whether that matters.
    #[error("Table {0} not found")]
    NotFound(Signature),

    /// Structurally invalid bytes; the instance is never handed to a rule.
    #[error("Table {signature} is malformed: {reason}")]
    Malformed { signature: Signature, reason: String },

    /// I/O or device failure distinct from absence.
    #[error("Failed to acquire table {signature} from {}: {reason}", .path.display())]
    Acquisition { signature: Signature, path: PathBuf, reason: String },

    #[error("Failed to list tables in {}: {reason}", .path.display())]
    Listing { path: PathBuf, reason: String },

    /// A rule refused an instance shorter than its layout requires.
    #[error("Table {signature} is {actual} bytes; rule requires at least {required}")]
    RuleLengthMismatch { signature: Signature, required: usize, actual: usize },
}

pub type TableResult<T> = Result<T, TableError>;
