use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The kind of a local package, in priority-class order lib→bsp→unittest→app→target
/// is the order definitions and overrides are applied (see [`crate::priority::PriorityClass`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Lib,
    Bsp,
    App,
    Unittest,
    Target,
    Sdk,
    Compiler,
}

/// A package's full name, e.g. `@apache-mynewt-core/kernel/os`. Kept as an
/// owned string rather than a borrowed slice because packages flow through
/// owned maps everywhere (the resolver, syscfg's defining-package field,
/// diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageName(pub String);

impl PackageName {
    pub fn new(name: impl Into<String>) -> Self {
        PackageName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        PackageName::new(s)
    }
}

/// An optional build command, one of pre-build/post-build/pre-link/post-link,
/// as declared in `pkg.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCommands {
    pub pre_build: Vec<String>,
    pub post_build: Vec<String>,
    pub pre_link: Vec<String>,
    pub post_link: Vec<String>,
}

/// A local package as discovered on disk: its identity, raw declarations,
/// and the two YAML views the rest of the system reads through.
///
/// `pkg_yml` and `syscfg_yml` are kept as opaque [`serde_yaml::Value`] trees
/// here; callers wrap them in an `anvil_ycfg::Ycfg` to query them against
/// the current settings.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: PackageName,
    pub kind: PackageType,
    pub base_path: PathBuf,
    pub injected: BTreeMap<String, String>,
    pub pkg_yml: serde_yaml::Value,
    pub syscfg_yml: serde_yaml::Value,
    pub deps: Vec<String>,
    pub provided_apis: Vec<String>,
    pub required_apis: Vec<String>,
    pub commands: BuildCommands,
}

impl Package {
    pub fn new(name: impl Into<PackageName>, kind: PackageType, base_path: PathBuf) -> Self {
        Package {
            name: name.into(),
            kind,
            base_path,
            injected: BTreeMap::new(),
            pkg_yml: serde_yaml::Value::Null,
            syscfg_yml: serde_yaml::Value::Null,
            deps: Vec::new(),
            provided_apis: Vec::new(),
            required_apis: Vec::new(),
            commands: BuildCommands::default(),
        }
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        PackageName(s)
    }
}
