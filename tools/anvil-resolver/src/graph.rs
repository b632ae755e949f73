use std::collections::{HashMap, HashSet};

use anvil_model::Package;
use anvil_ycfg::Ycfg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Hard,
    ApiDriven,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepEdge {
    pub target: anvil_model::PackageName,
    pub kind: DepKind,
    pub enabling: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiState {
    Unsatisfied,
    Satisfied(anvil_model::PackageName),
}

/// A package as tracked by the resolver: the package data itself, a view
/// over its `pkg.yml` for conditional key lookups, the dependency edges
/// seen in the most recent inner-loop scan, required-API satisfaction
/// state, the two stability flags, and a reference count.
pub struct ResolvedPackage {
    pub package: Package,
    pub pkg_ycfg: Ycfg,
    /// Outgoing edges keyed by `(dependency name, enabling expression
    /// text)`, so the same name reached two different ways (e.g. once
    /// unconditionally and once behind a condition) tracks separately.
    pub edges: HashMap<(String, Option<String>), DepEdge>,
    pub required_apis: HashMap<String, ApiState>,
    pub deps_resolved: bool,
    pub apis_satisfied: bool,
    pub ref_count: u32,
}

impl ResolvedPackage {
    pub fn new(package: Package, pkg_ycfg: Ycfg, ref_count: u32) -> Self {
        ResolvedPackage {
            package,
            pkg_ycfg,
            edges: HashMap::new(),
            required_apis: HashMap::new(),
            deps_resolved: false,
            apis_satisfied: false,
            ref_count,
        }
    }
}

pub type EdgeKey = (String, Option<String>);

/// Flatten a package's `pkg.deps` entries (as returned by a `ycfg` lookup)
/// into `(dependency name, enabling expression text)` pairs. `e.source` is
/// `None` for the package's own unconditional `deps` value and `Some(expr)`
/// for a conditional child — that doubles as the edge's enabling
/// expression.
pub fn collect_dep_names(entries: &[anvil_ycfg::Entry]) -> Vec<EdgeKey> {
    let mut out = Vec::new();
    for entry in entries {
        if let serde_yaml::Value::Sequence(list) = &entry.value {
            for item in list {
                if let Some(name) = item.as_str() {
                    out.push((name.to_string(), entry.source.clone()));
                }
            }
        }
    }
    out
}

pub fn edge_set(edges: &[EdgeKey]) -> HashSet<EdgeKey> {
    edges.iter().cloned().collect()
}
