//! Shared data model for packages, settings, and diagnostics, used by every
//! other `anvil-*` crate so they all speak the same vocabulary for
//! packages, priority classes, and setting history.

pub mod diagnostic;
pub mod package;
pub mod priority;
pub mod setting;

pub use diagnostic::{Diagnostic, DiagnosticList, Severity};
pub use package::{BuildCommands, Package, PackageName, PackageType};
pub use priority::{PriorityClass, INGESTION_ORDER};
pub use setting::{CfgPoint, Interval, Restriction, Setting, SettingState, SettingType};
