use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use fwcheck_core::config::CheckConfig;
use fwcheck_core::tables::Signature;

/// Options selecting where tables and the kernel log come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// YAML or JSON config file. Flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Firmware table directory (default: /sys/firmware/acpi/tables).
    #[arg(long)]
    pub tables_dir: Option<PathBuf>,

    /// Read tables from an acpidump-format text file.
    #[arg(long)]
    pub dump_file: Option<PathBuf>,

    /// Spawn this dump tool and read tables from its output.
    #[arg(long)]
    pub acpidump: Option<PathBuf>,

    /// Replace a table with a binary file, as SIG=PATH. Repeatable.
    #[arg(long = "override", value_name = "SIG=PATH")]
    pub overrides: Vec<String>,

    /// Signature whose absence is reported as a finding. Repeatable.
    #[arg(long = "require", value_name = "SIG")]
    pub mandatory: Vec<String>,

    /// Kernel log capture file; omit to read the live log.
    #[arg(long)]
    pub klog: Option<PathBuf>,

    /// Helper used to read the live kernel log.
    #[arg(long)]
    pub dmesg: Option<PathBuf>,
}

/// Parse a `SIG=PATH` override.
pub fn parse_override(raw: &str) -> Result<(Signature, PathBuf)> {
    let (sig, path) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid override '{raw}'. Expected SIG=PATH"))?;
    let sig: Signature = sig.parse()?;
    if path.is_empty() {
        return Err(anyhow!("Invalid override '{raw}'. Path is empty"));
    }
    Ok((sig, PathBuf::from(path)))
}

/// Load the config file (if any) and apply command-line overrides on top.
pub fn build_config(args: &SourceArgs) -> Result<CheckConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let base = path.parent().unwrap_or(Path::new("."));
            CheckConfig::load(path)?.resolve_relative_to(base)
        }
        None => CheckConfig::default(),
    };

    if let Some(dir) = &args.tables_dir {
        // An explicit tables dir replaces any dump source the config selected.
        config.tables_dir = dir.clone();
        config.dump_file = None;
        config.acpidump = None;
    }
    if let Some(dump) = &args.dump_file {
        config.dump_file = Some(dump.clone());
    }
    if let Some(tool) = &args.acpidump {
        config.acpidump = Some(tool.clone());
    }
    for raw in &args.overrides {
        let (sig, path) = parse_override(raw)?;
        config.table_overrides.insert(sig, path);
    }
    for sig in &args.mandatory {
        let sig: Signature =
            sig.parse().with_context(|| format!("Invalid --require value '{sig}'"))?;
        if !config.mandatory_tables.contains(&sig) {
            config.mandatory_tables.push(sig);
        }
    }
    if let Some(klog) = &args.klog {
        config.klog = Some(klog.clone());
    }
    if let Some(dmesg) = &args.dmesg {
        config.dmesg = dmesg.clone();
    }
    Ok(config)
}
