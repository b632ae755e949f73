//! Five-phase syscfg ingestion (definitions, overrides, package
//! restrictions, task-priority derivation, validation) plus the flash-owner
//! cross-check, ambiguity detection, and `syscfg.h`/`logcfg.h` emission.

mod emit;
mod error;
mod ingest;
mod restriction;
mod snapshot;

pub use emit::{emit, header_text, logcfg_text};
pub use error::{Error, Result};
pub use ingest::{ingest, LogConfig, PackageInput, Syscfg};
pub use snapshot::SettingsSnapshot;
