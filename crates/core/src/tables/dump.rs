//! Parser for acpidump-style hex dump text.
//!
//! ```text
//! RSDT @ 0x00000000BFFE1E2E
//!     0000: 52 53 44 54 34 00 00 00 01 9E 42 4F 43 48 53 20  RSDT4.....BOCHS
//!     0010: ...
//! ```

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("acpidump text line {line}: {reason}")]
pub struct DumpError {
    pub line: usize,
    pub reason: String,
}

/// One table block recovered from dump text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedTable {
    /// Heading name, normally the table signature.
    pub name: String,
    pub address: Option<u64>,
    pub bytes: Vec<u8>,
}

pub fn parse_dump(text: &str) -> Result<Vec<DumpedTable>, DumpError> {
    let mut tables: Vec<DumpedTable> = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let data = line
            .split_once(':')
            .filter(|(offset, _)| !offset.is_empty() && offset.chars().all(|c| c.is_ascii_hexdigit()));
        let Some((offset, rest)) = data else {
            let Some((name, addr)) = line.split_once(" @ ") else {
                return Err(DumpError { line: line_no, reason: format!("unrecognised line '{line}'") });
            };
            let address = u64::from_str_radix(addr.trim().trim_start_matches("0x"), 16).ok();
            tables.push(DumpedTable { name: name.trim().to_string(), address, bytes: Vec::new() });
            continue;
        };
        let offset = usize::from_str_radix(offset, 16).map_err(|_| DumpError {
            line: line_no,
            reason: format!("bad offset '{offset}'"),
        })?;
        let Some(current) = tables.last_mut() else {
            return Err(DumpError {
                line: line_no,
                reason: "hex data before any table heading".to_string(),
            });
        };
        if offset != current.bytes.len() {
            return Err(DumpError {
                line: line_no,
                reason: format!(
                    "offset {offset:#x} does not continue {} at {:#x}",
                    current.name,
                    current.bytes.len()
                ),
            });
        }

        // Hex bytes end at the two-space gap before the ASCII column.
        let hex = rest.trim_start().split("  ").next().unwrap_or("");
        for token in hex.split_whitespace() {
            let byte = u8::from_str_radix(token, 16).map_err(|_| DumpError {
                line: line_no,
                reason: format!("bad hex byte '{token}'"),
            })?;
            current.bytes.push(byte);
        }
    }

    Ok(tables)
}
