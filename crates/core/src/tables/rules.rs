//! Closed set of per-signature semantic rules.
//!
//! Each variant interprets already-validated bytes and emits findings. Rules
//! are selected by signature when a check is registered, never by inspecting
//! the instance at runtime.

use crate::findings::{Finding, FindingSink, Severity};
use crate::tables::header::{read_u32, read_u64, FACS_MIN_LEN, HEADER_SIZE};
use crate::tables::{Signature, TableInstance, TableResult};

/// FADT revision 1 length; every later revision is a superset.
const FADT_MIN_LEN: usize = 116;
/// Offset of the 32-bit DSDT address in the FADT.
const FADT_DSDT_OFFSET: usize = 40;
/// Offset of the 64-bit X_DSDT address, present when the table reaches 148 bytes.
const FADT_X_DSDT_OFFSET: usize = 140;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRule {
    /// Root table with 32-bit entry addresses.
    Rsdt,
    /// Extended root table with 64-bit entry addresses.
    Xsdt,
    /// Fixed description table (`FACP`).
    Fadt,
    /// Firmware control structure; headerless, so only its length is checked.
    Facs,
    /// Any other signature: only header-level advice.
    HeaderOnly(Signature),
}

impl TableRule {
    pub fn for_signature(signature: Signature) -> Self {
        match signature.as_bytes() {
            b"RSDT" => TableRule::Rsdt,
            b"XSDT" => TableRule::Xsdt,
            b"FACP" => TableRule::Fadt,
            b"FACS" => TableRule::Facs,
            _ => TableRule::HeaderOnly(signature),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableRule::Rsdt => "rsdt",
            TableRule::Xsdt => "xsdt",
            TableRule::Fadt => "fadt",
            TableRule::Facs => "facs",
            TableRule::HeaderOnly(_) => "header",
        }
    }

    /// Smallest instance this rule will interpret.
    pub fn min_len(&self) -> usize {
        match self {
            TableRule::Fadt => FADT_MIN_LEN,
            TableRule::Facs => FACS_MIN_LEN,
            _ => HEADER_SIZE,
        }
    }

    /// Apply the rule to one instance.
    ///
    /// Fails with `RuleLengthMismatch` before touching any field beyond the instance.
    pub fn check(&self, instance: &TableInstance, sink: &mut dyn FindingSink) -> TableResult<()> {
        instance.require_len(self.min_len())?;
        match self {
            TableRule::Rsdt => check_entry_array(instance, 4, sink),
            TableRule::Xsdt => check_entry_array(instance, 8, sink),
            TableRule::Fadt => check_fadt(instance, sink),
            TableRule::Facs => {
                sink.passed(instance.location(), "FACS covers its fixed layout")
            }
            TableRule::HeaderOnly(_) => check_header(instance, sink),
        }
        Ok(())
    }
}

fn check_entry_array(instance: &TableInstance, width: usize, sink: &mut dyn FindingSink) {
    let sig = instance.signature();
    let body = instance.body();

    if body.len() % width != 0 {
        sink.record(Finding::failure(
            instance.location(),
            Severity::Medium,
            format!("{sig}BadEntryArrayLength"),
            format!(
                "{sig} entry array is {} bytes, not a multiple of the {width}-byte entry size",
                body.len()
            ),
        ));
    }

    let mut nulls = 0;
    for (entry, chunk) in body.chunks_exact(width).enumerate() {
        let addr = if width == 4 { u64::from(read_u32(chunk, 0)) } else { read_u64(chunk, 0) };
        if addr == 0 {
            nulls += 1;
            sink.record(
                Finding::failure(
                    instance.entry_location(entry),
                    Severity::High,
                    format!("{sig}EntryNull"),
                    format!("{sig} entry {entry} is a null table address"),
                )
                .with_advice(
                    "The kernel skips null entries, but a null pointer usually means the \
                     firmware failed to fill in a table it meant to publish.",
                ),
            );
        }
    }
    if nulls == 0 {
        sink.passed(instance.location(), "all table entries are non-null");
    }
}

fn check_fadt(instance: &TableInstance, sink: &mut dyn FindingSink) {
    let bytes = instance.bytes();
    let dsdt = u64::from(read_u32(bytes, FADT_DSDT_OFFSET));
    let x_dsdt =
        if bytes.len() >= FADT_X_DSDT_OFFSET + 8 { read_u64(bytes, FADT_X_DSDT_OFFSET) } else { 0 };

    match (dsdt, x_dsdt) {
        (0, 0) => sink.record(Finding::failure(
            instance.location(),
            Severity::Critical,
            "FADTNoDSDT",
            "FADT provides neither a 32-bit nor a 64-bit DSDT address",
        )),
        (d, x) if d != 0 && x != 0 && d != x => sink.record(
            Finding::failure(
                instance.location(),
                Severity::Medium,
                "FADTDSDTMismatch",
                format!("FADT DSDT {d:#x} and X_DSDT {x:#x} point to different tables"),
            )
            .with_advice("The kernel prefers X_DSDT; the 32-bit DSDT address will be ignored."),
        ),
        _ => sink.passed(instance.location(), "FADT DSDT address is consistent"),
    }
}

fn check_header(instance: &TableInstance, sink: &mut dyn FindingSink) {
    let sig = instance.signature();
    let header = instance.header();
    if header.revision == 0 {
        sink.record(Finding::advice(
            instance.location(),
            format!("{sig}RevisionZero"),
            format!("{sig} declares revision 0"),
        ));
    }
    if header.oem_id.is_empty() {
        sink.record(Finding::failure(
            instance.location(),
            Severity::Low,
            format!("{sig}OEMIdEmpty"),
            format!("{sig} has an empty OEM ID"),
        ));
    }
    sink.passed(instance.location(), "header fields present");
}
