use std::collections::{BTreeMap, HashSet, VecDeque};

use anvil_flashmap::FlashMap;
use anvil_model::diagnostic::{Diagnostic, DiagnosticList};
use anvil_model::package::{Package, PackageName, PackageType};
use anvil_model::priority::{PriorityClass, INGESTION_ORDER};
use anvil_syscfg::{ingest, PackageInput, SettingsSnapshot, Syscfg};
use anvil_ycfg::Ycfg;
use serde_yaml::Value;
use snafu::OptionExt;

use crate::error::{Result, UnknownSeedSnafu, UnresolvedDependencySnafu};
use crate::graph::{collect_dep_names, edge_set, ApiState, DepEdge, DepKind, EdgeKey, ResolvedPackage};
use crate::oracle::DependencyOracle;

/// Build a `ycfg` view over a package's `pkg.yml` mapping: every top-level
/// key (already dotted where conditional, e.g. `deps.BLE_DEVICE`) is merged
/// in as its own path.
fn build_ycfg(pkg_yml: &Value) -> Ycfg {
    let mut ycfg = Ycfg::new();
    if let Some(map) = pkg_yml.as_mapping() {
        for (k, v) in map {
            if let Some(key) = k.as_str() {
                let _ = ycfg.merge(key, v.clone());
            }
        }
    }
    ycfg
}

/// The outcome of one resolver run: the surviving package set and the
/// syscfg result that fixed-pointed against it, plus every diagnostic
/// collected along the way.
pub struct Resolution {
    pub packages: BTreeMap<PackageName, ResolvedPackage>,
    pub syscfg: Syscfg,
    pub diagnostics: DiagnosticList,
}

/// Drives the inner dependency-closure loop, the outer syscfg fixed-point
/// loop, and the final API binding pass over a seed package set.
/// Never touches the filesystem itself — package data comes entirely from
/// the [`DependencyOracle`].
pub struct Resolver<'a> {
    oracle: &'a dyn DependencyOracle,
    packages: BTreeMap<PackageName, ResolvedPackage>,
    diagnostics: DiagnosticList,
}

impl<'a> Resolver<'a> {
    pub fn new(oracle: &'a dyn DependencyOracle) -> Self {
        Resolver {
            oracle,
            packages: BTreeMap::new(),
            diagnostics: DiagnosticList::new(),
        }
    }

    fn bump_or_insert(&mut self, package: Package, delta: u32) -> PackageName {
        let name = package.name.clone();
        if let Some(existing) = self.packages.get_mut(&name) {
            existing.ref_count += delta;
        } else {
            let ycfg = build_ycfg(&package.pkg_yml);
            self.packages
                .insert(name.clone(), ResolvedPackage::new(package, ycfg, delta));
        }
        name
    }

    /// Remove `name` and cascade: every package it alone was keeping alive
    /// loses its reference too, recursively. Mirrors the pruning half of
    /// the inner loop.
    fn remove_package(&mut self, name: &PackageName) {
        let mut queue = VecDeque::new();
        queue.push_back(name.clone());
        while let Some(victim) = queue.pop_front() {
            let Some(removed) = self.packages.remove(&victim) else {
                continue;
            };
            for edge in removed.edges.values() {
                if let Some(target) = self.packages.get_mut(&edge.target) {
                    target.ref_count = target.ref_count.saturating_sub(1);
                    if target.ref_count == 0 {
                        queue.push_back(edge.target.clone());
                    }
                }
            }
        }
    }

    /// Scan every surviving package's `deps` key against the current
    /// settings, pull in packages newly reachable and prune ones that just
    /// lost their last referencing edge, to a fixed point.
    fn inner_loop(&mut self, settings: &dyn anvil_expr::SettingsView) -> Result<()> {
        loop {
            let mut changed = false;
            let names: Vec<PackageName> = self.packages.keys().cloned().collect();
            for name in names {
                if !self.packages.contains_key(&name) {
                    continue;
                }
                let (new_keys, old_keys): (HashSet<EdgeKey>, HashSet<EdgeKey>) = {
                    let entry = &self.packages[&name];
                    let (entries, _warnings) = entry.pkg_ycfg.get("deps", settings);
                    let keys = collect_dep_names(&entries);
                    (edge_set(&keys), entry.edges.keys().cloned().collect())
                };

                for key in new_keys.difference(&old_keys) {
                    let (dep_name, enabling) = key.clone();
                    let target =
                        self.oracle
                            .lookup(&dep_name)
                            .context(UnresolvedDependencySnafu {
                                requirer: name.to_string(),
                                name: dep_name.clone(),
                            })?;
                    let target_name = self.bump_or_insert(target, 1);
                    self.packages.get_mut(&name).unwrap().edges.insert(
                        key.clone(),
                        DepEdge {
                            target: target_name,
                            kind: DepKind::Hard,
                            enabling,
                        },
                    );
                    changed = true;
                }

                for key in old_keys.difference(&new_keys) {
                    let removed = self.packages.get_mut(&name).unwrap().edges.remove(key);
                    if let Some(edge) = removed {
                        if let Some(target) = self.packages.get_mut(&edge.target) {
                            target.ref_count = target.ref_count.saturating_sub(1);
                            if target.ref_count == 0 {
                                self.remove_package(&edge.target);
                            }
                        }
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        Ok(())
    }

    /// The current package set as `syscfg::PackageInput`s, in the
    /// lib→bsp→unittest→app→target ingestion order, ties broken by name.
    fn syscfg_inputs(&self, has_app: bool) -> Vec<PackageInput<'_>> {
        let mut entries: Vec<&ResolvedPackage> = self.packages.values().collect();
        entries.sort_by_key(|p| {
            let order = INGESTION_ORDER
                .iter()
                .position(|k| *k == p.package.kind)
                .unwrap_or(INGESTION_ORDER.len());
            (order, p.package.name.clone())
        });
        entries
            .into_iter()
            .map(|p| PackageInput {
                name: p.package.name.clone(),
                kind: p.package.kind,
                priority: PriorityClass::of(p.package.kind, has_app),
                syscfg_yml: &p.package.syscfg_yml,
            })
            .collect()
    }

    /// Outer loop: ingest syscfg, feed the resulting settings back
    /// into the inner loop (a changed value can flip a conditional `deps`
    /// key), and repeat until a pass changes neither the package set nor
    /// any setting's history.
    fn fixed_point(
        &mut self,
        injected: &BTreeMap<String, String>,
        flashmap: Option<&FlashMap>,
        has_app: bool,
    ) -> Result<Syscfg> {
        let mut syscfg = Syscfg::default();
        loop {
            {
                let snapshot = SettingsSnapshot(&syscfg.settings);
                self.inner_loop(&snapshot)?;
            }

            let inputs = self.syscfg_inputs(has_app);
            let next = ingest(&inputs, injected, flashmap);

            let settled = history_lengths(&syscfg) == history_lengths(&next)
                && syscfg.settings.keys().collect::<HashSet<_>>()
                    == next.settings.keys().collect::<HashSet<_>>();
            syscfg = next;
            if settled {
                return Ok(syscfg);
            }
        }
    }

    /// Group provided/required APIs across the surviving set, record
    /// `ApiConflict`/`UnsatisfiedApi` diagnostics, and add an api-driven
    /// edge from each requirer to its (deterministically first, by name)
    /// provider.
    fn bind_apis(&mut self) {
        let mut providers: BTreeMap<String, Vec<PackageName>> = BTreeMap::new();
        for p in self.packages.values() {
            for api in &p.package.provided_apis {
                providers.entry(api.clone()).or_default().push(p.package.name.clone());
            }
        }
        for providers in providers.values_mut() {
            providers.sort();
        }
        for (api, names) in &providers {
            if names.len() > 1 {
                self.diagnostics.push(Diagnostic::ApiConflict {
                    api: api.clone(),
                    providers: names.clone(),
                });
            }
        }

        let requirers: Vec<(PackageName, Vec<String>)> = self
            .packages
            .values()
            .map(|p| (p.package.name.clone(), p.package.required_apis.clone()))
            .collect();

        for (requirer, apis) in requirers {
            for api in apis {
                match providers.get(&api).and_then(|v| v.first()) {
                    None => self.diagnostics.push(Diagnostic::UnsatisfiedApi {
                        api: api.clone(),
                        requirer: requirer.clone(),
                    }),
                    Some(provider) => {
                        let provider = provider.clone();
                        if let Some(entry) = self.packages.get_mut(&requirer) {
                            entry
                                .edges
                                .entry((format!("api:{api}"), None))
                                .or_insert_with(|| DepEdge {
                                    target: provider.clone(),
                                    kind: DepKind::ApiDriven,
                                    enabling: None,
                                });
                            entry
                                .required_apis
                                .insert(api.clone(), ApiState::Satisfied(provider));
                        }
                    }
                }
            }
        }
        for p in self.packages.values_mut() {
            p.deps_resolved = true;
            p.apis_satisfied = true;
        }
    }

    /// Seed with `names`, run both fixed-point loops, bind APIs, and
    /// consume `self` into the final [`Resolution`].
    pub fn resolve(
        mut self,
        seed_names: &[String],
        injected: &BTreeMap<String, String>,
        flashmap: Option<&FlashMap>,
        has_app: bool,
    ) -> Result<Resolution> {
        for name in seed_names {
            let package = self
                .oracle
                .lookup(name)
                .context(UnknownSeedSnafu { name: name.clone() })?;
            self.bump_or_insert(package, 1);
        }

        let syscfg = self.fixed_point(injected, flashmap, has_app)?;
        self.bind_apis();

        Ok(Resolution {
            packages: self.packages,
            syscfg,
            diagnostics: self.diagnostics,
        })
    }
}

fn history_lengths(syscfg: &Syscfg) -> BTreeMap<&str, usize> {
    syscfg
        .settings
        .iter()
        .map(|(k, v)| (k.as_str(), v.history.len()))
        .collect()
}

/// Resolve a target whose image is split between a loader and an app:
/// the loader resolves first; the app's seed list is then widened
/// with every non-application package the loader pulled in, so packages
/// shared between the two stages land in both resolutions, before the app
/// resolves on its own.
pub fn resolve_split(
    oracle: &dyn DependencyOracle,
    loader_seeds: &[String],
    app_seeds: &[String],
    injected: &BTreeMap<String, String>,
    flashmap: Option<&FlashMap>,
) -> Result<(Resolution, Resolution)> {
    let loader = Resolver::new(oracle).resolve(loader_seeds, injected, flashmap, false)?;

    let mut combined_app_seeds: Vec<String> = app_seeds.to_vec();
    for p in loader.packages.values() {
        if p.package.kind != PackageType::App {
            combined_app_seeds.push(p.package.name.to_string());
        }
    }

    let app = Resolver::new(oracle).resolve(&combined_app_seeds, injected, flashmap, true)?;
    Ok((loader, app))
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap as Map;
    use std::path::PathBuf;

    use anvil_model::package::{BuildCommands, PackageName, PackageType};

    use super::*;

    struct FakeOracle {
        packages: Map<String, Package>,
    }

    impl DependencyOracle for FakeOracle {
        fn lookup(&self, name: &str) -> Option<Package> {
            self.packages.get(name).cloned()
        }
    }

    fn pkg(name: &str, kind: PackageType, deps_yaml: &str, syscfg_yaml: &str) -> Package {
        Package {
            name: PackageName::new(name),
            kind,
            base_path: PathBuf::from(name),
            injected: Map::new(),
            pkg_yml: serde_yaml::from_str(deps_yaml).unwrap(),
            syscfg_yml: serde_yaml::from_str(syscfg_yaml).unwrap(),
            deps: Vec::new(),
            provided_apis: Vec::new(),
            required_apis: Vec::new(),
            commands: BuildCommands::default(),
        }
    }

    #[test]
    fn pulls_in_transitive_hard_dependency() {
        let mut packages = Map::new();
        packages.insert(
            "lib/a".to_string(),
            pkg("lib/a", PackageType::Lib, "deps: [lib/b]", "{}"),
        );
        packages.insert("lib/b".to_string(), pkg("lib/b", PackageType::Lib, "{}", "{}"));
        let oracle = FakeOracle { packages };

        let resolution = Resolver::new(&oracle)
            .resolve(&["lib/a".to_string()], &Map::new(), None, false)
            .unwrap();

        assert!(resolution.packages.contains_key(&PackageName::new("lib/a")));
        assert!(resolution.packages.contains_key(&PackageName::new("lib/b")));
    }

    #[test]
    fn unresolved_dependency_is_an_error() {
        let mut packages = Map::new();
        packages.insert(
            "lib/a".to_string(),
            pkg("lib/a", PackageType::Lib, "deps: [lib/missing]", "{}"),
        );
        let oracle = FakeOracle { packages };

        let err = Resolver::new(&oracle)
            .resolve(&["lib/a".to_string()], &Map::new(), None, false)
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::UnresolvedDependency { .. }));
    }

    #[test]
    fn conditional_dependency_pulled_in_once_setting_resolves_true() {
        let mut packages = Map::new();
        packages.insert(
            "lib/a".to_string(),
            pkg(
                "lib/a",
                PackageType::Lib,
                "deps.USE_BLE: [lib/ble]",
                "defs:\n  USE_BLE:\n    value: 1\n",
            ),
        );
        packages.insert("lib/ble".to_string(), pkg("lib/ble", PackageType::Lib, "{}", "{}"));
        let oracle = FakeOracle { packages };

        let resolution = Resolver::new(&oracle)
            .resolve(&["lib/a".to_string()], &Map::new(), None, false)
            .unwrap();

        assert!(resolution.packages.contains_key(&PackageName::new("lib/ble")));
    }

    #[test]
    fn conflicting_api_providers_flagged() {
        let mut a = pkg("lib/a", PackageType::Lib, "{}", "{}");
        a.provided_apis.push("uart".to_string());
        let mut b = pkg("lib/b", PackageType::Lib, "deps: [lib/a]", "{}");
        b.provided_apis.push("uart".to_string());
        let mut packages = Map::new();
        packages.insert("lib/a".to_string(), a);
        packages.insert("lib/b".to_string(), b);
        let oracle = FakeOracle { packages };

        let resolution = Resolver::new(&oracle)
            .resolve(&["lib/b".to_string()], &Map::new(), None, false)
            .unwrap();

        assert!(resolution
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::ApiConflict { api, .. } if api == "uart")));
    }

    #[test]
    fn unsatisfied_required_api_is_flagged() {
        let mut a = pkg("lib/a", PackageType::Lib, "{}", "{}");
        a.required_apis.push("console".to_string());
        let mut packages = Map::new();
        packages.insert("lib/a".to_string(), a);
        let oracle = FakeOracle { packages };

        let resolution = Resolver::new(&oracle)
            .resolve(&["lib/a".to_string()], &Map::new(), None, false)
            .unwrap();

        assert!(resolution
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnsatisfiedApi { api, .. } if api == "console")));
    }
}
