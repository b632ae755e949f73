//! Dependency graph resolution: the inner dependency-closure loop, the
//! outer syscfg fixed-point loop, API binding, and loader/app split
//! resolution.

mod error;
mod graph;
mod oracle;
mod resolve;

pub use error::{Error, Result};
pub use graph::{collect_dep_names, edge_set, ApiState, DepEdge, DepKind, EdgeKey, ResolvedPackage};
pub use oracle::DependencyOracle;
pub use resolve::{resolve_split, Resolution, Resolver};
