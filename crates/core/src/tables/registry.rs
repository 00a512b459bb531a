//! Per-session cache of validated table instances keyed by signature.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::findings::{Finding, Location, Severity};
use crate::tables::header::{byte_sum, has_standard_header, TableHeader, HEADER_SIZE};
use crate::tables::source::{ByteSource, Origin, RawTable};
use crate::tables::{Signature, TableError, TableResult};

/// One located occurrence of a table, read-only once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInstance {
    signature: Signature,
    index: usize,
    #[serde(skip)]
    bytes: Vec<u8>,
    header: TableHeader,
    origin: Origin,
    checksum_ok: bool,
}

impl TableInstance {
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Position in discovery order for this signature; 0 is "the" instance when only one exists.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Exactly the declared `length` bytes, header included.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn checksum_ok(&self) -> bool {
        self.checksum_ok
    }

    /// Bytes following the header.
    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }

    /// Refuse to interpret an instance shorter than `required` bytes.
    pub fn require_len(&self, required: usize) -> TableResult<()> {
        if self.len() < required {
            return Err(TableError::RuleLengthMismatch {
                signature: self.signature,
                required,
                actual: self.len(),
            });
        }
        Ok(())
    }

    pub fn location(&self) -> Location {
        Location::Table { signature: self.signature, instance: self.index, entry: None }
    }

    pub fn entry_location(&self, entry: usize) -> Location {
        Location::Table { signature: self.signature, instance: self.index, entry: Some(entry) }
    }

    /// Hex SHA-256 of the instance bytes.
    pub fn sha256(&self) -> String {
        format!("{:x}", Sha256::digest(&self.bytes))
    }
}

/// An instance rejected before it could be inspected.
#[derive(Debug, Clone)]
pub struct RejectedInstance {
    pub index: usize,
    pub origin: Origin,
    pub error: TableError,
}

/// Everything discovered for one signature, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    instances: Vec<TableInstance>,
    rejected: Vec<RejectedInstance>,
    findings: Vec<Finding>,
}

impl TableSet {
    /// Instances that passed structural validation and may be handed to rules.
    pub fn instances(&self) -> &[TableInstance] {
        &self.instances
    }

    pub fn rejected(&self) -> &[RejectedInstance] {
        &self.rejected
    }

    /// Findings produced while validating headers (e.g. bad checksums).
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn first(&self) -> Option<&TableInstance> {
        self.instances.first()
    }
}

/// Structurally validate one raw buffer.
///
/// Returns the instance plus a `<SIG>BadChecksum` finding when the byte sum is
/// non-zero; a bad checksum never prevents further inspection. The FACS has no
/// checksum and is never summed.
pub fn validate(
    signature: Signature,
    index: usize,
    raw: RawTable,
) -> TableResult<(TableInstance, Option<Finding>)> {
    let malformed = |reason: String| TableError::Malformed { signature, reason };
    let RawTable { mut bytes, origin } = raw;

    let standard = has_standard_header(signature);
    let parsed = if standard { TableHeader::parse(&bytes) } else { TableHeader::parse_facs(&bytes) };
    let header = parsed.ok_or_else(|| {
        malformed(format!("{} bytes is shorter than the {HEADER_SIZE}-byte header", bytes.len()))
    })?;
    if &header.signature != signature.as_bytes() {
        return Err(malformed(format!(
            "header signature '{}' does not match",
            String::from_utf8_lossy(&header.signature)
        )));
    }

    let length = header.length();
    if length < HEADER_SIZE {
        return Err(malformed(format!("declared length {length} is smaller than the header")));
    }
    if length > bytes.len() {
        return Err(malformed(format!(
            "declared length {length} exceeds the {} bytes available",
            bytes.len()
        )));
    }
    if origin.is_override() && length != bytes.len() {
        return Err(malformed(format!(
            "declared length {length} disagrees with override file size {}",
            bytes.len()
        )));
    }
    bytes.truncate(length);

    let sum = if standard { byte_sum(&bytes) } else { 0 };
    let finding = (sum != 0).then(|| {
        warn!(%signature, index, sum, "table checksum mismatch");
        let expected = header.checksum.wrapping_sub(sum);
        Finding::failure(
            Location::Table { signature, instance: index, entry: None },
            Severity::High,
            format!("{signature}BadChecksum"),
            format!(
                "{signature} checksum is {:#04x}, should be {expected:#04x} (byte sum {sum:#04x})",
                header.checksum
            ),
        )
        .with_advice(
            "The table bytes do not sum to zero. The firmware may have modified the table \
             without recomputing the checksum; the kernel may ignore or distrust it.",
        )
    });

    let instance =
        TableInstance { signature, index, bytes, header, origin, checksum_ok: finding.is_none() };
    Ok((instance, finding))
}

type CacheEntry = Result<Arc<TableSet>, TableError>;

/// Mapping from signature to its validated instances for the lifetime of a session.
///
/// The first lookup of a signature acquires and validates under the cache lock,
/// so each signature is acquired at most once; later lookups return the same set.
pub struct TableRegistry {
    source: Box<dyn ByteSource>,
    cache: Mutex<HashMap<Signature, CacheEntry>>,
}

impl TableRegistry {
    pub fn new(source: impl ByteSource + 'static) -> Self {
        Self { source: Box::new(source), cache: Mutex::new(HashMap::new()) }
    }

    pub fn source(&self) -> &dyn ByteSource {
        self.source.as_ref()
    }

    /// All instances of `signature`, memoized per signature.
    pub fn get(&self, signature: Signature) -> TableResult<Arc<TableSet>> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = cache.get(&signature) {
            return entry.clone();
        }
        let entry = self.acquire(signature);
        cache.insert(signature, entry.clone());
        entry
    }

    /// Signatures the underlying source can provide.
    pub fn available(&self) -> TableResult<Vec<Signature>> {
        self.source.available()
    }

    /// Number of signatures looked up so far.
    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    /// Drop every cached instance.
    pub fn clear(&self) {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
    }

    fn acquire(&self, signature: Signature) -> CacheEntry {
        let raws = self.source.load(signature)?;
        let mut set = TableSet::default();
        for (index, raw) in raws.into_iter().enumerate() {
            let origin = raw.origin.clone();
            match validate(signature, index, raw) {
                Ok((instance, finding)) => {
                    set.findings.extend(finding);
                    set.instances.push(instance);
                }
                Err(error) => {
                    warn!(%signature, index, %error, "rejected table instance");
                    set.rejected.push(RejectedInstance { index, origin, error });
                }
            }
        }
        debug!(
            %signature,
            valid = set.instances.len(),
            rejected = set.rejected.len(),
            "validated table instances"
        );
        Ok(Arc::new(set))
    }
}
