use serde::{Deserialize, Serialize};

use crate::tables::Signature;

/// Size in bytes of the header shared by every description table.
pub const HEADER_SIZE: usize = 36;

/// The firmware control structure carries only signature, length and version:
/// no checksum, OEM or creator fields.
pub const FACS_SIGNATURE: &[u8; 4] = b"FACS";
/// Size of the FACS fixed layout.
pub const FACS_MIN_LEN: usize = 64;
const FACS_VERSION_OFFSET: usize = 32;

/// Fixed-layout prefix common to all description tables.
///
/// Fields are recorded verbatim; nothing beyond the header is interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableHeader {
    pub signature: [u8; 4],
    /// Total table length in bytes, header included.
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oem_id: String,
    pub oem_table_id: String,
    pub oem_revision: u32,
    pub creator_id: String,
    pub creator_revision: u32,
}

impl TableHeader {
    /// Decode the header from the start of `bytes`.
    ///
    /// Returns `None` when fewer than [`HEADER_SIZE`] bytes are available.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let raw = bytes.get(..HEADER_SIZE)?;
        Some(Self {
            signature: [raw[0], raw[1], raw[2], raw[3]],
            length: read_u32(raw, 4),
            revision: raw[8],
            checksum: raw[9],
            oem_id: ascii_field(&raw[10..16]),
            oem_table_id: ascii_field(&raw[16..24]),
            oem_revision: read_u32(raw, 24),
            creator_id: ascii_field(&raw[28..32]),
            creator_revision: read_u32(raw, 32),
        })
    }

    /// Decode the FACS prefix: signature, length and version only.
    ///
    /// The version lands in `revision`; every other field stays empty.
    pub fn parse_facs(bytes: &[u8]) -> Option<Self> {
        let raw = bytes.get(..HEADER_SIZE)?;
        Some(Self {
            signature: [raw[0], raw[1], raw[2], raw[3]],
            length: read_u32(raw, 4),
            revision: raw[FACS_VERSION_OFFSET],
            checksum: 0,
            oem_id: String::new(),
            oem_table_id: String::new(),
            oem_revision: 0,
            creator_id: String::new(),
            creator_revision: 0,
        })
    }

    pub fn length(&self) -> usize {
        self.length as usize
    }
}

/// False for tables whose layout has no standard header or checksum.
pub fn has_standard_header(signature: Signature) -> bool {
    signature.as_bytes() != FACS_SIGNATURE
}

/// Unsigned byte-wise sum of `bytes` modulo 256.
pub fn byte_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// True when the bytes, checksum byte included, sum to zero modulo 256.
pub fn checksum_ok(bytes: &[u8]) -> bool {
    byte_sum(bytes) == 0
}

/// Little-endian u32 at `offset`. Callers guarantee `offset + 4 <= bytes.len()`.
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// Little-endian u64 at `offset`. Callers guarantee `offset + 8 <= bytes.len()`.
pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn ascii_field(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|b| **b != 0)
        .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' })
        .collect::<String>()
        .trim_end()
        .to_string()
}
