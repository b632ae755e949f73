use anvil_model::Package;

/// The project's package database, injected so the resolver itself never
/// touches the filesystem. A dependency name as it appears in
/// `pkg.deps` resolves to the full package it names, or `None` if nothing
/// provides it.
pub trait DependencyOracle {
    fn lookup(&self, name: &str) -> Option<Package>;
}
