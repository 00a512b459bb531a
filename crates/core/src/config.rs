use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::klog::PatternRule;
use crate::tables::source::SYSFS_TABLES_DIR;
use crate::tables::Signature;

/// Serializable run configuration, read from YAML or JSON.
///
/// Every field is optional in the file; CLI flags override loaded values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Directory of the kernel's firmware table interface.
    pub tables_dir: PathBuf,
    /// Signature -> file whose contents replace every firmware instance.
    pub table_overrides: BTreeMap<Signature, PathBuf>,
    /// acpidump-format text file used instead of `tables_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_file: Option<PathBuf>,
    /// Dump tool to spawn instead of reading `tables_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acpidump: Option<PathBuf>,
    /// Signatures whose absence is itself a finding.
    pub mandatory_tables: Vec<Signature>,
    /// Captured kernel log; absent means read the live log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub klog: Option<PathBuf>,
    /// Helper used to snapshot the live kernel log.
    pub dmesg: PathBuf,
    /// Extra common-error rules appended to the built-in catalog.
    pub patterns: Vec<PatternRule>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            tables_dir: PathBuf::from(SYSFS_TABLES_DIR),
            table_overrides: BTreeMap::new(),
            dump_file: None,
            acpidump: None,
            mandatory_tables: Vec::new(),
            klog: None,
            dmesg: PathBuf::from("dmesg"),
            patterns: Vec::new(),
        }
    }
}

impl CheckConfig {
    /// Load from `path`, choosing YAML or JSON by extension (YAML when unknown).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let config = if is_json {
            serde_json::from_str(&body).context("Failed to parse config JSON")?
        } else {
            serde_yaml::from_str(&body).context("Failed to parse config YAML")?
        };
        Ok(config)
    }

    /// Resolve relative paths against `base` (normally the config file's directory).
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.tables_dir);
        for path in self.table_overrides.values_mut() {
            join(path);
        }
        if let Some(p) = self.dump_file.as_mut() {
            join(p);
        }
        if let Some(p) = self.klog.as_mut() {
            join(p);
        }
        self
    }

    pub fn is_mandatory(&self, signature: Signature) -> bool {
        self.mandatory_tables.contains(&signature)
    }
}
