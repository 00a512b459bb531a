//! Sources of raw table bytes.
//!
//! A [`ByteSource`] returns every instance of a signature in discovery order,
//! or [`TableError::NotFound`] when there are none. I/O failures other than
//! absence are always [`TableError::Acquisition`].

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::exec::capture_stdout;
use crate::tables::dump::{parse_dump, DumpedTable};
use crate::tables::{Signature, TableError, TableResult};

/// Default location of the kernel's firmware table interface.
pub const SYSFS_TABLES_DIR: &str = "/sys/firmware/acpi/tables";

/// Where an instance's bytes came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Origin {
    /// Read from the firmware table interface.
    Firmware(PathBuf),
    /// User-supplied override file.
    Override(PathBuf),
    /// Recovered from acpidump text (a file, or a spawned tool's stdout).
    Dump(PathBuf),
    /// Supplied in-process.
    Memory,
}

impl Origin {
    pub fn is_override(&self) -> bool {
        matches!(self, Origin::Override(_))
    }
}

/// Raw bytes for one instance, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub bytes: Vec<u8>,
    pub origin: Origin,
}

/// Abstracts "a table's raw bytes" independent of where they live.
pub trait ByteSource: Send + Sync {
    fn load(&self, signature: Signature) -> TableResult<Vec<RawTable>>;

    /// Every distinct signature this source can provide, sorted.
    fn available(&self) -> TableResult<Vec<Signature>>;

    /// Human-readable description for logs and reports.
    fn describe(&self) -> String;
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn load(&self, signature: Signature) -> TableResult<Vec<RawTable>> {
        (**self).load(signature)
    }

    fn available(&self) -> TableResult<Vec<Signature>> {
        (**self).available()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

fn acquisition(signature: Signature, path: &Path, reason: impl ToString) -> TableError {
    TableError::Acquisition { signature, path: path.to_path_buf(), reason: reason.to_string() }
}

/// Tables exposed by the kernel as files named `SIG`, `SIG1`, `SIG2`, ...
#[derive(Debug, Clone)]
pub struct SysfsTables {
    pub dir: PathBuf,
}

impl SysfsTables {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for SysfsTables {
    fn default() -> Self {
        Self::new(SYSFS_TABLES_DIR)
    }
}

/// Ordering key for `SIG`/`SIGn` file names; `None` when the name is another table.
fn instance_suffix(file_name: &str, signature: Signature) -> Option<u32> {
    let suffix = file_name.strip_prefix(signature.as_str())?;
    if suffix.is_empty() {
        Some(0)
    } else if suffix.chars().all(|c| c.is_ascii_digit()) {
        suffix.parse().ok()
    } else {
        None
    }
}

impl ByteSource for SysfsTables {
    fn load(&self, signature: Signature) -> TableResult<Vec<RawTable>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "firmware table directory missing");
                return Err(TableError::NotFound(signature));
            }
            Err(e) => return Err(acquisition(signature, &self.dir, e)),
        };

        let mut found: Vec<(u32, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| acquisition(signature, &self.dir, e))?;
            let name = entry.file_name();
            let Some(order) = name.to_str().and_then(|n| instance_suffix(n, signature)) else {
                continue;
            };
            if entry.path().is_file() {
                found.push((order, entry.path()));
            }
        }
        if found.is_empty() {
            return Err(TableError::NotFound(signature));
        }
        found.sort();

        let mut tables = Vec::with_capacity(found.len());
        for (_, path) in found {
            let bytes = fs::read(&path).map_err(|e| acquisition(signature, &path, e))?;
            tables.push(RawTable { bytes, origin: Origin::Firmware(path) });
        }
        info!(%signature, count = tables.len(), dir = %self.dir.display(), "loaded firmware tables");
        Ok(tables)
    }

    fn available(&self) -> TableResult<Vec<Signature>> {
        let listing = |e: std::io::Error| TableError::Listing {
            path: self.dir.clone(),
            reason: e.to_string(),
        };
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(listing(e)),
        };
        let mut sigs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(listing)?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(sig) = name.get(..4).and_then(|s| s.parse::<Signature>().ok()) else {
                continue;
            };
            if instance_suffix(name, sig).is_some() {
                sigs.push(sig);
            }
        }
        sigs.sort();
        sigs.dedup();
        Ok(sigs)
    }

    fn describe(&self) -> String {
        format!("firmware tables in {}", self.dir.display())
    }
}

/// Wraps another source; a configured override file is the sole instance of its signature.
pub struct WithOverrides<S> {
    overrides: BTreeMap<Signature, PathBuf>,
    inner: S,
}

impl<S: ByteSource> WithOverrides<S> {
    pub fn new(inner: S, overrides: BTreeMap<Signature, PathBuf>) -> Self {
        Self { overrides, inner }
    }
}

impl<S: ByteSource> ByteSource for WithOverrides<S> {
    fn load(&self, signature: Signature) -> TableResult<Vec<RawTable>> {
        let Some(path) = self.overrides.get(&signature) else {
            return self.inner.load(signature);
        };
        // A configured override that cannot be read is a failure, never absence.
        let bytes = fs::read(path).map_err(|e| acquisition(signature, path, e))?;
        info!(%signature, path = %path.display(), bytes = bytes.len(), "loaded override table");
        Ok(vec![RawTable { bytes, origin: Origin::Override(path.clone()) }])
    }

    fn available(&self) -> TableResult<Vec<Signature>> {
        let mut sigs = self.inner.available()?;
        sigs.extend(self.overrides.keys().copied());
        sigs.sort();
        sigs.dedup();
        Ok(sigs)
    }

    fn describe(&self) -> String {
        if self.overrides.is_empty() {
            return self.inner.describe();
        }
        let sigs: Vec<String> = self.overrides.keys().map(|s| s.to_string()).collect();
        format!("{} (overrides: {})", self.inner.describe(), sigs.join(", "))
    }
}

#[derive(Debug, Clone)]
enum DumpOrigin {
    File(PathBuf),
    Tool { program: PathBuf, args: Vec<String> },
}

impl DumpOrigin {
    fn path(&self) -> &Path {
        match self {
            DumpOrigin::File(path) => path,
            DumpOrigin::Tool { program, .. } => program,
        }
    }
}

/// Tables recovered from acpidump text, read once and reused for every signature.
#[derive(Debug)]
pub struct DumpSource {
    origin: DumpOrigin,
    parsed: OnceLock<Result<Vec<DumpedTable>, String>>,
}

impl DumpSource {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self { origin: DumpOrigin::File(path.into()), parsed: OnceLock::new() }
    }

    /// Spawn `program` (e.g. `acpidump`) and parse its stdout.
    pub fn from_tool(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { origin: DumpOrigin::Tool { program: program.into(), args }, parsed: OnceLock::new() }
    }

    fn tables(&self) -> &Result<Vec<DumpedTable>, String> {
        self.parsed.get_or_init(|| {
            let text = match &self.origin {
                DumpOrigin::File(path) => fs::read(path)
                    .map(|raw| String::from_utf8_lossy(&raw).into_owned())
                    .map_err(|e| e.to_string())?,
                DumpOrigin::Tool { program, args } => {
                    capture_stdout(program, args).map_err(|e| e.to_string())?
                }
            };
            let tables = parse_dump(&text).map_err(|e| e.to_string())?;
            info!(source = %self.origin.path().display(), count = tables.len(), "parsed table dump");
            Ok(tables)
        })
    }
}

impl ByteSource for DumpSource {
    fn load(&self, signature: Signature) -> TableResult<Vec<RawTable>> {
        let path = self.origin.path();
        let tables = self.tables().as_ref().map_err(|reason| acquisition(signature, path, reason))?;
        let found: Vec<RawTable> = tables
            .iter()
            .filter(|t| t.name == signature.as_str())
            .map(|t| RawTable { bytes: t.bytes.clone(), origin: Origin::Dump(path.to_path_buf()) })
            .collect();
        if found.is_empty() {
            Err(TableError::NotFound(signature))
        } else {
            Ok(found)
        }
    }

    fn available(&self) -> TableResult<Vec<Signature>> {
        let tables = self.tables().as_ref().map_err(|reason| TableError::Listing {
            path: self.origin.path().to_path_buf(),
            reason: reason.clone(),
        })?;
        let mut sigs: Vec<Signature> =
            tables.iter().filter_map(|t| t.name.parse::<Signature>().ok()).collect();
        sigs.sort();
        sigs.dedup();
        Ok(sigs)
    }

    fn describe(&self) -> String {
        match &self.origin {
            DumpOrigin::File(path) => format!("acpidump text {}", path.display()),
            DumpOrigin::Tool { program, .. } => format!("output of {}", program.display()),
        }
    }
}

/// In-process tables, mainly for tests and for embedding callers.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Vec<(Signature, Vec<u8>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, signature: Signature, bytes: impl Into<Vec<u8>>) -> Self {
        self.tables.push((signature, bytes.into()));
        self
    }
}

impl ByteSource for MemorySource {
    fn load(&self, signature: Signature) -> TableResult<Vec<RawTable>> {
        let found: Vec<RawTable> = self
            .tables
            .iter()
            .filter(|(sig, _)| *sig == signature)
            .map(|(_, bytes)| RawTable { bytes: bytes.clone(), origin: Origin::Memory })
            .collect();
        if found.is_empty() {
            Err(TableError::NotFound(signature))
        } else {
            Ok(found)
        }
    }

    fn available(&self) -> TableResult<Vec<Signature>> {
        let mut sigs: Vec<Signature> = self.tables.iter().map(|(sig, _)| *sig).collect();
        sigs.sort();
        sigs.dedup();
        Ok(sigs)
    }

    fn describe(&self) -> String {
        format!("{} in-memory tables", self.tables.len())
    }
}
