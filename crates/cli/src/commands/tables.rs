use anyhow::{Context, Result};
use serde::Serialize;

use fwcheck_core::session::Session;
use fwcheck_core::tables::TableError;

use crate::commands::util::{build_config, SourceArgs};

/// One row of the table listing.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    pub signature: String,
    pub index: usize,
    pub length: usize,
    pub revision: u8,
    pub oem_id: String,
    pub oem_table_id: String,
    pub creator_id: String,
    pub checksum_ok: bool,
    pub sha256: String,
}

/// List every table instance the configured source provides, with header fields.
pub fn list_tables_command(args: &SourceArgs, json: bool) -> Result<()> {
    let session = Session::from_config(build_config(args)?);
    let sigs = session.registry().available().context("Failed to list tables")?;

    let mut entries = Vec::new();
    let mut rejected = Vec::new();
    for sig in sigs {
        let set = match session.registry().get(sig) {
            Ok(set) => set,
            Err(TableError::NotFound(_)) => continue,
            Err(e) => {
                rejected.push(e.to_string());
                continue;
            }
        };
        for r in set.rejected() {
            rejected.push(format!("{sig}[{}]: {}", r.index, r.error));
        }
        for instance in set.instances() {
            let header = instance.header();
            entries.push(TableInfo {
                signature: sig.to_string(),
                index: instance.index(),
                length: instance.len(),
                revision: header.revision,
                oem_id: header.oem_id.clone(),
                oem_table_id: header.oem_table_id.clone(),
                creator_id: header.creator_id.clone(),
                checksum_ok: instance.checksum_ok(),
                sha256: instance.sha256(),
            });
        }
    }
    session.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Tables ({}):", entries.len());
    if entries.is_empty() {
        println!("  (none)");
    }
    for e in &entries {
        println!(
            "  - {}[{}] len={} rev={} oem={} table={} creator={} checksum={} sha256={}",
            e.signature,
            e.index,
            e.length,
            e.revision,
            e.oem_id,
            e.oem_table_id,
            e.creator_id,
            if e.checksum_ok { "ok" } else { "BAD" },
            e.sha256
        );
    }
    for r in &rejected {
        println!("  ! {r}");
    }
    Ok(())
}
