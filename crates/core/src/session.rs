//! Explicit per-run state owned by the caller of the checks.

use tracing::info;

use crate::config::CheckConfig;
use crate::klog::{CaptureFile, LiveLog, LogSource};
use crate::tables::source::{DumpSource, SysfsTables, WithOverrides};
use crate::tables::{ByteSource, TableRegistry};

/// Owns the table cache and log source for one run.
///
/// Checks borrow the session; nothing is process-global. Call [`Session::finish`]
/// to tear it down.
pub struct Session {
    config: CheckConfig,
    registry: TableRegistry,
    log_source: Box<dyn LogSource>,
}

/// What a session did before it was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub signatures_loaded: usize,
}

impl Session {
    /// Build sources from configuration.
    ///
    /// Tables come from `dump_file`, else a spawned `acpidump`, else `tables_dir`;
    /// overrides are layered on top. The log comes from `klog`, else the live log.
    pub fn from_config(config: CheckConfig) -> Self {
        let base: Box<dyn ByteSource> = if let Some(dump) = &config.dump_file {
            Box::new(DumpSource::from_file(dump))
        } else if let Some(tool) = &config.acpidump {
            Box::new(DumpSource::from_tool(tool, Vec::new()))
        } else {
            Box::new(SysfsTables::new(&config.tables_dir))
        };
        let bytes = WithOverrides::new(base, config.table_overrides.clone());

        let log_source: Box<dyn LogSource> = match &config.klog {
            Some(path) => Box::new(CaptureFile::new(path)),
            None => Box::new(LiveLog::new(&config.dmesg)),
        };
        Self::with_sources(config, bytes, log_source)
    }

    pub fn with_sources(
        config: CheckConfig,
        bytes: impl ByteSource + 'static,
        log_source: impl LogSource + 'static,
    ) -> Self {
        info!(tables = %bytes.describe(), klog = %log_source.describe(), "session opened");
        Self { config, registry: TableRegistry::new(bytes), log_source: Box::new(log_source) }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn log_source(&self) -> &dyn LogSource {
        self.log_source.as_ref()
    }

    /// Release every cached table.
    pub fn finish(self) -> SessionStats {
        let stats = SessionStats { signatures_loaded: self.registry.cached() };
        self.registry.clear();
        info!(signatures = stats.signatures_loaded, "session closed");
        stats
    }
}
