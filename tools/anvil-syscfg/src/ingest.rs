use std::collections::{BTreeMap, HashMap, HashSet};

use anvil_expr::parse_integer;
use anvil_flashmap::FlashMap;
use anvil_model::diagnostic::{Diagnostic, DiagnosticList};
use anvil_model::package::{PackageName, PackageType};
use anvil_model::priority::PriorityClass;
use anvil_model::setting::{CfgPoint, Setting, SettingType};
use serde_yaml::Value;

use crate::restriction::{check as check_restriction, parse_restrictions};
use crate::snapshot::SettingsSnapshot;

/// One participating package's syscfg-relevant inputs, already resolved to
/// the package-type ingestion order and priority class the caller (the
/// resolver) computed for this build.
pub struct PackageInput<'a> {
    pub name: PackageName,
    pub kind: PackageType,
    pub priority: PriorityClass,
    /// The package's `syscfg` top-level mapping: `{defs, vals, restrictions}`.
    pub syscfg_yml: &'a Value,
}

/// One `syscfg.logs.<NAME>` entry: the C identifier passed as a log's
/// module argument and its compile-time severity threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub module: String,
    pub level: String,
}

/// The result of a full five-phase ingestion pass plus the diagnostics it
/// collected. Never short-circuits on a recoverable condition.
#[derive(Debug, Default)]
pub struct Syscfg {
    pub settings: BTreeMap<String, Setting>,
    pub defining: BTreeMap<String, PackageName>,
    pub redefines: BTreeMap<String, Vec<PackageName>>,
    pub package_restrictions: Vec<(PackageName, String)>,
    pub logs: BTreeMap<String, LogConfig>,
    pub diagnostics: DiagnosticList,
}

fn setting_type_of(def: &Value) -> SettingType {
    match def
        .as_mapping()
        .and_then(|m| m.get(Value::from("type")))
        .and_then(Value::as_str)
    {
        Some("task_priority") => SettingType::TaskPriority,
        Some("flash_owner") => SettingType::FlashOwner,
        _ => SettingType::Raw,
    }
}

fn def_value_text(def: &Value) -> String {
    def.as_mapping()
        .and_then(|m| m.get(Value::from("value")))
        .and_then(scalar_text)
        .unwrap_or_default()
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn description_of(def: &Value) -> Option<String> {
    def.as_mapping()
        .and_then(|m| m.get(Value::from("description")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Run all five ingestion phases (plus the flash-owner check) over
/// `packages`, which must already be in the priority-class ingestion order
/// (lib→bsp→unittest→app→target), ties broken however the resolver likes
/// as long as it's deterministic.
pub fn ingest(
    packages: &[PackageInput<'_>],
    injected: &BTreeMap<String, String>,
    flashmap: Option<&FlashMap>,
) -> Syscfg {
    let mut out = Syscfg::default();
    let priorities: HashMap<&str, PriorityClass> = packages
        .iter()
        .map(|p| (p.name.as_str(), p.priority))
        .collect();

    for (name, value) in injected {
        out.settings.insert(
            name.clone(),
            Setting::new(name.clone(), SettingType::Raw, CfgPoint::injected(value.clone())),
        );
    }

    // Phase 1: definitions.
    for pkg in packages {
        let Some(defs) = pkg
            .syscfg_yml
            .as_mapping()
            .and_then(|m| m.get(Value::from("defs")))
            .and_then(Value::as_mapping)
        else {
            continue;
        };
        for (key, def) in defs {
            let Some(name) = key.as_str() else { continue };
            let setting_type = setting_type_of(def);
            let value_text = def_value_text(def);
            let description = description_of(def);
            let restrictions = match parse_restrictions(name, def) {
                Ok(r) => r,
                Err(_) => Vec::new(),
            };

            match out.settings.get_mut(name) {
                None => {
                    let mut s = Setting::new(
                        name.to_string(),
                        setting_type,
                        CfgPoint::from_package(pkg.name.clone(), value_text),
                    );
                    s.restrictions = restrictions;
                    s.description = description;
                    out.settings.insert(name.to_string(), s);
                    out.defining.insert(name.to_string(), pkg.name.clone());
                }
                Some(existing) => {
                    if !out.defining.contains_key(name) {
                        // Pure injected entry: this package becomes the
                        // defining package without disturbing history.
                        out.defining.insert(name.to_string(), pkg.name.clone());
                        existing.setting_type = setting_type;
                        existing.restrictions = restrictions;
                        existing.description = description;
                    } else {
                        let definer = out.defining[name].clone();
                        out.redefines
                            .entry(name.to_string())
                            .or_default()
                            .push(pkg.name.clone());
                        out.diagnostics.push(Diagnostic::Redefine {
                            setting: name.to_string(),
                            packages: vec![definer, pkg.name.clone()],
                        });
                    }
                }
            }
        }
    }

    // Phase 2: overrides.
    for pkg in packages {
        let Some(vals) = pkg
            .syscfg_yml
            .as_mapping()
            .and_then(|m| m.get(Value::from("vals")))
            .and_then(Value::as_mapping)
        else {
            continue;
        };
        for (key, value) in vals {
            let Some(name) = key.as_str() else { continue };
            let Some(text) = scalar_text(value) else { continue };

            match out.settings.get_mut(name) {
                None => {
                    out.diagnostics.push(Diagnostic::Orphan {
                        setting: name.to_string(),
                        source: pkg.name.clone(),
                    });
                }
                Some(setting) => {
                    let legal = match out.defining.get(name) {
                        None => true,
                        Some(definer) if *definer == pkg.name => true,
                        Some(definer) => {
                            let definer_priority =
                                priorities.get(definer.as_str()).copied().unwrap_or(PriorityClass::Other);
                            pkg.priority >= definer_priority
                        }
                    };
                    if legal {
                        setting.push(CfgPoint::from_package(pkg.name.clone(), text));
                    } else {
                        out.diagnostics.push(Diagnostic::PriorityViolation {
                            setting: name.to_string(),
                            definer: out.defining[name].clone(),
                            source: pkg.name.clone(),
                        });
                    }
                }
            }
        }
    }

    // Phase 3: package restrictions.
    for pkg in packages {
        if let Some(list) = pkg
            .syscfg_yml
            .as_mapping()
            .and_then(|m| m.get(Value::from("restrictions")))
            .and_then(Value::as_sequence)
        {
            for entry in list {
                if let Some(text) = entry.as_str() {
                    out.package_restrictions.push((pkg.name.clone(), text.to_string()));
                }
            }
        }
    }

    // Phase 3b: log declarations. Unlike settings, a log name has no
    // override mechanism; the first package to declare a given name wins
    // and later declarations are reported as redefines.
    for pkg in packages {
        let Some(logs) = pkg
            .syscfg_yml
            .as_mapping()
            .and_then(|m| m.get(Value::from("logs")))
            .and_then(Value::as_mapping)
        else {
            continue;
        };
        for (key, def) in logs {
            let Some(name) = key.as_str() else { continue };
            let module = def
                .as_mapping()
                .and_then(|m| m.get(Value::from("module")))
                .and_then(Value::as_str)
                .unwrap_or(name)
                .to_string();
            let level = def
                .as_mapping()
                .and_then(|m| m.get(Value::from("level")))
                .and_then(scalar_text)
                .unwrap_or_else(|| "DEBUG".to_string());

            if out.logs.contains_key(name) {
                out.diagnostics.push(Diagnostic::Redefine {
                    setting: name.to_string(),
                    packages: vec![pkg.name.clone()],
                });
                continue;
            }
            out.logs.insert(name.to_string(), LogConfig { module, level });
        }
    }

    // Phase 4: task_priority derivation.
    derive_task_priorities(&mut out);

    // Phase 5: restriction validation.
    let names: Vec<String> = out.settings.keys().cloned().collect();
    for name in &names {
        let (current_value, restrictions) = {
            let s = &out.settings[name];
            (s.current_value().to_string(), s.restrictions.clone())
        };
        let snapshot = SettingsSnapshot(&out.settings);
        for restriction in &restrictions {
            if !check_restriction(restriction, &current_value, &snapshot) {
                out.diagnostics.push(Diagnostic::RestrictionViolation {
                    setting: name.clone(),
                    restriction: format!("{restriction:?}"),
                });
            }
        }
    }

    // Phase 6: flash owner check.
    if let Some(flashmap) = flashmap {
        check_flash_owners(&mut out, flashmap);
    }

    // Ambiguity detection over the finished history.
    detect_ambiguity(&mut out, &priorities);

    out
}

fn derive_task_priorities(out: &mut Syscfg) {
    let mut used: HashSet<i64> = HashSet::new();
    let mut any_settings: Vec<String> = Vec::new();

    for (name, setting) in out.settings.iter() {
        if setting.setting_type != SettingType::TaskPriority {
            continue;
        }
        if setting.current_value() == "any" {
            any_settings.push(name.clone());
        } else if let Some(v) = parse_integer(setting.current_value()) {
            if !used.insert(v) {
                out.diagnostics.push(Diagnostic::Duplicate {
                    detail: format!("task_priority '{name}' duplicates value {v}"),
                });
            }
        }
    }

    any_settings.sort();
    for name in any_settings {
        let mut candidate = 0i64;
        while used.contains(&candidate) && candidate <= 239 {
            candidate += 1;
        }
        used.insert(candidate);
        if let Some(point) = out.settings.get_mut(&name).and_then(|s| s.history.last_mut()) {
            point.value = candidate.to_string();
        }
    }
}

fn check_flash_owners(out: &mut Syscfg, flashmap: &FlashMap) {
    let mut by_area: HashMap<String, Vec<String>> = HashMap::new();
    for (name, setting) in out.settings.iter() {
        if setting.setting_type != SettingType::FlashOwner {
            continue;
        }
        let value = setting.current_value();
        if value.is_empty() {
            continue;
        }
        if flashmap.by_name(value).is_none() {
            out.diagnostics.push(Diagnostic::FlashConflict {
                detail: format!("flash_owner '{name}' names unknown area '{value}'"),
            });
            continue;
        }
        by_area.entry(value.to_string()).or_default().push(name.clone());
    }
    for (area, owners) in by_area {
        if owners.len() > 1 {
            out.diagnostics.push(Diagnostic::FlashConflict {
                detail: format!("flash area '{area}' claimed by multiple flash_owner settings: {}", owners.join(", ")),
            });
        }
    }
}

fn detect_ambiguity(out: &mut Syscfg, priorities: &HashMap<&str, PriorityClass>) {
    let class_of = |pkg: &PackageName| priorities.get(pkg.as_str()).copied().unwrap_or(PriorityClass::Other);

    for (name, setting) in out.settings.clone().iter() {
        let history = &setting.history;
        if history.len() < 2 {
            continue;
        }
        // Only override points (index >= 1) participate; the defining
        // entry at index 0 is never part of an ambiguity set even when it
        // shares a priority class with the overrides that follow.
        let last_idx = history.len() - 1;
        let Some(last_source) = history[last_idx].source.as_ref() else {
            continue;
        };
        let last_class = class_of(last_source);
        let mut group = vec![last_idx];
        let mut idx = last_idx;
        while idx > 1 {
            let prev = idx - 1;
            let Some(prev_source) = history[prev].source.as_ref() else {
                break;
            };
            if class_of(prev_source) == last_class {
                group.push(prev);
                idx = prev;
            } else {
                break;
            }
        }
        if group.len() < 2 {
            continue;
        }
        let values: HashSet<&str> = group.iter().map(|&i| history[i].value.as_str()).collect();
        if values.len() > 1 {
            let mut packages: Vec<PackageName> = group
                .iter()
                .rev()
                .filter_map(|&i| history[i].source.clone())
                .collect();
            packages.sort();
            packages.dedup();
            out.diagnostics.push(Diagnostic::Ambiguity {
                setting: name.clone(),
                packages,
            });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pkg<'a>(name: &str, kind: PackageType, priority: PriorityClass, yaml: &'a Value) -> PackageInput<'a> {
        PackageInput {
            name: PackageName::new(name),
            kind,
            priority,
            syscfg_yml: yaml,
        }
    }

    fn defs_yaml(entries: &str) -> Value {
        serde_yaml::from_str(&format!("defs:\n{entries}\n")).unwrap()
    }

    fn vals_yaml(entries: &str) -> Value {
        serde_yaml::from_str(&format!("vals:\n{entries}\n")).unwrap()
    }

    #[test]
    fn scenario_minimal() {
        let y1 = defs_yaml("  A: {value: 1}\n");
        let y2 = vals_yaml("  A: 2\n");
        let packages = vec![
            pkg("lib/p1", PackageType::Lib, PriorityClass::Other, &y1),
            pkg("target/t", PackageType::Target, PriorityClass::Target, &y2),
        ];
        let result = ingest(&packages, &BTreeMap::new(), None);
        assert_eq!(result.settings["A"].current_value(), "2");
        assert_eq!(result.settings["A"].history.len(), 2);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn scenario_ambiguity() {
        let y1 = defs_yaml("  A: {value: 1}\n");
        let y2 = vals_yaml("  A: 2\n");
        let y3 = vals_yaml("  A: 3\n");
        let packages = vec![
            pkg("lib/p1", PackageType::Lib, PriorityClass::Other, &y1),
            pkg("lib/p2", PackageType::Lib, PriorityClass::Other, &y2),
            pkg("lib/p3", PackageType::Lib, PriorityClass::Other, &y3),
        ];
        let result = ingest(&packages, &BTreeMap::new(), None);
        assert_eq!(result.settings["A"].current_value(), "3");
        let ambiguities: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::Ambiguity { .. }))
            .collect();
        assert_eq!(ambiguities.len(), 1);
        if let Diagnostic::Ambiguity { packages, .. } = ambiguities[0] {
            let mut names: Vec<&str> = packages.iter().map(PackageName::as_str).collect();
            names.sort();
            assert_eq!(names, vec!["lib/p2", "lib/p3"]);
        }
    }

    #[test]
    fn scenario_priority_violation() {
        let y_t = defs_yaml("  A: {value: 1}\n");
        let y_p1 = vals_yaml("  A: 2\n");
        let packages = vec![
            pkg("target/t", PackageType::Target, PriorityClass::Target, &y_t),
            pkg("lib/p1", PackageType::Lib, PriorityClass::Other, &y_p1),
        ];
        let result = ingest(&packages, &BTreeMap::new(), None);
        assert_eq!(result.settings["A"].current_value(), "1");
        let violations: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::PriorityViolation { .. }))
            .collect();
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn scenario_restriction_range() {
        let y1 = defs_yaml("  A: {value: 5, range: [\"1..4\", \"7\"]}\n");
        let packages = vec![pkg("lib/p1", PackageType::Lib, PriorityClass::Other, &y1)];
        let result = ingest(&packages, &BTreeMap::new(), None);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::RestrictionViolation { .. })));

        let y2 = defs_yaml("  A: {value: 7, range: [\"1..4\", \"7\"]}\n");
        let packages = vec![pkg("lib/p1", PackageType::Lib, PriorityClass::Other, &y2)];
        let result = ingest(&packages, &BTreeMap::new(), None);
        assert!(!result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::RestrictionViolation { .. })));
    }

    #[test]
    fn injected_setting_takes_precedence_and_package_becomes_definer() {
        let mut injected = BTreeMap::new();
        injected.insert("A".to_string(), "99".to_string());
        let y1 = defs_yaml("  A: {value: 1}\n");
        let packages = vec![pkg("lib/p1", PackageType::Lib, PriorityClass::Other, &y1)];
        let result = ingest(&packages, &injected, None);
        assert_eq!(result.settings["A"].current_value(), "99");
        assert_eq!(result.defining["A"], PackageName::new("lib/p1"));
        assert!(result.settings["A"].history[0].is_injected());
    }

    #[test]
    fn task_priority_any_gets_smallest_unused_slot() {
        let y1 = defs_yaml(
            "  A: {value: 0, type: task_priority}\n  B: {value: any, type: task_priority}\n",
        );
        let packages = vec![pkg("lib/p1", PackageType::Lib, PriorityClass::Other, &y1)];
        let result = ingest(&packages, &BTreeMap::new(), None);
        assert_eq!(result.settings["B"].current_value(), "1");
    }

    #[test]
    fn logs_are_ingested_from_each_package() {
        let y1: Value = serde_yaml::from_str(
            "logs:\n  APP_LOG: {module: APP_LOG_MODULE, level: WARN}\n",
        )
        .unwrap();
        let packages = vec![pkg("app/main", PackageType::App, PriorityClass::App, &y1)];
        let result = ingest(&packages, &BTreeMap::new(), None);
        let log = &result.logs["APP_LOG"];
        assert_eq!(log.module, "APP_LOG_MODULE");
        assert_eq!(log.level, "WARN");
    }

    #[test]
    fn duplicate_log_name_across_packages_is_a_redefine() {
        let y1: Value = serde_yaml::from_str(
            "logs:\n  SHARED: {module: A_MODULE, level: INFO}\n",
        )
        .unwrap();
        let y2: Value = serde_yaml::from_str(
            "logs:\n  SHARED: {module: B_MODULE, level: DEBUG}\n",
        )
        .unwrap();
        let packages = vec![
            pkg("lib/a", PackageType::Lib, PriorityClass::Other, &y1),
            pkg("lib/b", PackageType::Lib, PriorityClass::Other, &y2),
        ];
        let result = ingest(&packages, &BTreeMap::new(), None);
        assert_eq!(result.logs["SHARED"].module, "A_MODULE");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Redefine { setting, .. } if setting == "SHARED")));
    }

    #[test]
    fn redefine_is_recorded_without_changing_current_value() {
        let y1 = defs_yaml("  A: {value: 1}\n");
        let y2 = defs_yaml("  A: {value: 2}\n");
        let packages = vec![
            pkg("lib/p1", PackageType::Lib, PriorityClass::Other, &y1),
            pkg("lib/p2", PackageType::Lib, PriorityClass::Other, &y2),
        ];
        let result = ingest(&packages, &BTreeMap::new(), None);
        assert_eq!(result.settings["A"].current_value(), "1");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Redefine { .. })));
    }
}
