use anvil_expr::SettingsView;
use serde_yaml::Value;

use crate::error::{Error, Result, Warning};

pub(crate) type NodeId = usize;

/// One node in the tree. `children` is an insertion-ordered list rather than
/// a hash map: ordering doesn't affect semantics (combination is
/// commutative unless `overwrite` is set), but traversal and diagnostics
/// still want a stable, predictable order.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub value: Value,
    pub children: Vec<(String, NodeId)>,
    pub overwrite: bool,
    pub parent: Option<NodeId>,
}

impl Node {
    fn leaf(parent: Option<NodeId>) -> Self {
        Node {
            value: Value::Null,
            children: Vec::new(),
            overwrite: false,
            parent,
        }
    }
}

/// One applicable entry returned from [`Ycfg::get`]: either the parent
/// node's own value (`source: None`) or a child whose name-expression
/// evaluated true.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub source: Option<String>,
    pub value: Value,
}

/// A tree of named nodes over conditional YAML keys. Children are
/// addressed by index rather than by owned pointer, and a node's parent
/// link is a plain index used only to reconstruct `full_name` for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct Ycfg {
    pub(crate) arena: Vec<Node>,
    pub(crate) root: NodeId,
}

impl Default for Ycfg {
    fn default() -> Self {
        Ycfg::new()
    }
}

impl Ycfg {
    pub fn new() -> Self {
        Ycfg {
            arena: vec![Node::leaf(None)],
            root: 0,
        }
    }

    /// Parse `.`-separated path segments, stripping a trailing `OVERWRITE`
    /// segment (the literal `.OVERWRITE` suffix, not a child named
    /// "OVERWRITE").
    fn split_path(key: &str) -> (Vec<&str>, bool) {
        let mut parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
        let overwrite = parts.last() == Some(&"OVERWRITE");
        if overwrite {
            parts.pop();
        }
        (parts, overwrite)
    }

    fn find_child(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.arena[node]
            .children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    fn navigate(&self, key: &str) -> Option<NodeId> {
        let (parts, _) = Self::split_path(key);
        let mut cur = self.root;
        for part in parts {
            cur = self.find_child(cur, part)?;
        }
        Some(cur)
    }

    fn navigate_or_create(&mut self, parts: &[&str]) -> NodeId {
        let mut cur = self.root;
        for part in parts {
            cur = match self.find_child(cur, part) {
                Some(id) => id,
                None => {
                    let id = self.arena.len();
                    self.arena.push(Node::leaf(Some(cur)));
                    self.arena[cur].children.push((part.to_string(), id));
                    id
                }
            };
        }
        cur
    }

    /// Set or overwrite the value at `key`, creating any intermediate nodes
    /// needed. A trailing `.OVERWRITE` segment sets that node's overwrite
    /// flag rather than creating a value.
    pub fn replace(&mut self, key: &str, value: Value) {
        let (parts, overwrite) = Self::split_path(key);
        let id = self.navigate_or_create(&parts);
        self.arena[id].value = value;
        if overwrite {
            self.arena[id].overwrite = true;
        }
    }

    /// Deep-merge into a map, append onto a list, or fail with
    /// [`Error::TypeMismatch`] against any other existing value.
    pub fn merge(&mut self, key: &str, value: Value) -> Result<()> {
        let (parts, overwrite) = Self::split_path(key);
        let id = self.navigate_or_create(&parts);
        if overwrite {
            self.arena[id].overwrite = true;
        }
        merge_value(&mut self.arena[id].value, value, key)
    }

    /// The set of entries applicable under `settings`: the node's own value
    /// (if any) plus one entry per child whose name-expression evaluates
    /// true, unless an overwrite child applies, in which case only that one
    /// entry is returned. Unparseable child names are reported as warnings
    /// and skipped, never fail the lookup.
    pub fn get(&self, key: &str, settings: &dyn SettingsView) -> (Vec<Entry>, Vec<Warning>) {
        let mut warnings = Vec::new();
        let Some(id) = self.navigate(key) else {
            return (Vec::new(), warnings);
        };
        let node = &self.arena[id];

        for (name, child_id) in &node.children {
            let expr = match anvil_expr::parse(name) {
                Ok(e) => e,
                Err(e) => {
                    warnings.push(Warning {
                        path: key.to_string(),
                        text: name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let applies = match anvil_expr::eval_bool(&expr, settings) {
                Ok(b) => b,
                Err(e) => {
                    warnings.push(Warning {
                        path: key.to_string(),
                        text: name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !applies {
                continue;
            }
            let child = &self.arena[*child_id];
            if child.overwrite {
                return (
                    vec![Entry {
                        source: Some(name.clone()),
                        value: child.value.clone(),
                    }],
                    warnings,
                );
            }
        }

        let mut entries = Vec::new();
        if !matches!(node.value, Value::Null) {
            entries.push(Entry {
                source: None,
                value: node.value.clone(),
            });
        }
        for (name, child_id) in &node.children {
            let Ok(expr) = anvil_expr::parse(name) else {
                continue;
            };
            if matches!(anvil_expr::eval_bool(&expr, settings), Ok(true)) {
                let child = &self.arena[*child_id];
                entries.push(Entry {
                    source: Some(name.clone()),
                    value: child.value.clone(),
                });
            }
        }
        (entries, warnings)
    }

    pub fn get_string(&self, key: &str, settings: &dyn SettingsView, default: &str) -> String {
        let (entries, _) = self.get(key, settings);
        entries
            .first()
            .and_then(|e| scalar_to_string(&e.value))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str, settings: &dyn SettingsView, default: i64) -> i64 {
        let (entries, _) = self.get(key, settings);
        entries
            .first()
            .and_then(|e| scalar_to_string(&e.value))
            .and_then(|s| anvil_expr::parse_integer(&s))
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, settings: &dyn SettingsView, default: bool) -> bool {
        let (entries, _) = self.get(key, settings);
        match entries.first().and_then(|e| scalar_to_string(&e.value)) {
            Some(s) => !s.is_empty() && s != "0" && s.to_lowercase() != "false",
            None => default,
        }
    }

    /// Every applicable entry flattened to strings, in entry order.
    pub fn get_strings(&self, key: &str, settings: &dyn SettingsView) -> Vec<String> {
        let (entries, _) = self.get(key, settings);
        entries
            .into_iter()
            .flat_map(|e| match e.value {
                Value::Sequence(seq) => seq.iter().filter_map(scalar_to_string).collect(),
                other => scalar_to_string(&other).into_iter().collect(),
            })
            .collect()
    }

    /// Every applicable map entry deep-merged together, matching the
    /// commutative-combination rule.
    pub fn get_map(
        &self,
        key: &str,
        settings: &dyn SettingsView,
    ) -> std::collections::BTreeMap<String, String> {
        let (entries, _) = self.get(key, settings);
        let mut out = std::collections::BTreeMap::new();
        for e in entries {
            if let Value::Mapping(m) = e.value {
                for (k, v) in m {
                    if let (Some(k), Some(v)) = (scalar_to_string(&k), scalar_to_string(&v)) {
                        out.insert(k, v);
                    }
                }
            }
        }
        out
    }

    /// In-order traversal, yielding `(full_name, node_value, depth)`.
    pub fn traverse<F: FnMut(&str, &Value, usize)>(&self, mut f: F) {
        self.traverse_from(self.root, String::new(), 0, &mut f);
    }

    fn traverse_from<F: FnMut(&str, &Value, usize)>(
        &self,
        id: NodeId,
        name: String,
        depth: usize,
        f: &mut F,
    ) {
        let node = &self.arena[id];
        f(&name, &node.value, depth);
        for (child_name, child_id) in &node.children {
            let full = if name.is_empty() {
                child_name.clone()
            } else {
                format!("{name}.{child_name}")
            };
            self.traverse_from(*child_id, full, depth + 1, f);
        }
    }

    /// A flat map from dotted path to the textual form of every node's own
    /// value (nodes with no value of their own are omitted).
    pub fn all_settings(&self) -> std::collections::BTreeMap<String, String> {
        let mut out = std::collections::BTreeMap::new();
        self.traverse(|path, value, _depth| {
            if let Some(text) = scalar_to_string(value) {
                if !path.is_empty() {
                    out.insert(path.to_string(), text);
                }
            }
        });
        out
    }

    /// The full dotted name of a node reached by `key`, reconstructed by
    /// walking parent links — used only for diagnostics.
    pub fn full_name(&self, key: &str) -> Option<String> {
        let id = self.navigate(key)?;
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(id) = cur {
            if id == self.root {
                break;
            }
            let parent = self.arena[id].parent.expect("non-root node has a parent");
            let name = self.arena[parent]
                .children
                .iter()
                .find(|(_, cid)| *cid == id)
                .map(|(n, _)| n.clone())
                .expect("node is registered as its parent's child");
            parts.push(name);
            cur = Some(parent);
        }
        parts.reverse();
        Some(parts.join("."))
    }
}

fn merge_value(existing: &mut Value, new: Value, path: &str) -> Result<()> {
    match existing {
        Value::Null => {
            *existing = new;
            Ok(())
        }
        Value::Mapping(m) => match new {
            Value::Mapping(nm) => {
                for (k, v) in nm {
                    match m.get_mut(&k) {
                        Some(existing_v) => merge_value(existing_v, v, path)?,
                        None => {
                            m.insert(k, v);
                        }
                    }
                }
                Ok(())
            }
            _ => Err(Error::TypeMismatch {
                path: path.to_string(),
            }),
        },
        Value::Sequence(seq) => match new {
            Value::Sequence(mut ns) => {
                seq.append(&mut ns);
                Ok(())
            }
            _ => Err(Error::TypeMismatch {
                path: path.to_string(),
            }),
        },
        _ => Err(Error::TypeMismatch {
            path: path.to_string(),
        }),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn view(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn conditional_child_applies_when_true() {
        let mut y = Ycfg::new();
        y.replace("OS_MAIN_STACK_SIZE", Value::from(1024));
        y.replace("OS_MAIN_STACK_SIZE.BLE_DEVICE", Value::from(2048));

        let settings = view(&[("BLE_DEVICE", "1")]);
        let (entries, warnings) = y.get("OS_MAIN_STACK_SIZE", &settings);
        assert!(warnings.is_empty());
        assert_eq!(entries.len(), 2);

        let settings_off = view(&[("BLE_DEVICE", "0")]);
        let (entries, _) = y.get("OS_MAIN_STACK_SIZE", &settings_off);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, Value::from(1024));
    }

    #[test]
    fn overwrite_child_replaces_all_other_entries() {
        let mut y = Ycfg::new();
        y.replace("FOO", Value::from(1));
        y.replace("FOO.BAR.OVERWRITE", Value::from(99));

        let settings = view(&[("BAR", "1")]);
        let (entries, _) = y.get("FOO", &settings);
        assert_eq!(entries, vec![Entry { source: Some("BAR".into()), value: Value::from(99) }]);
    }

    #[test]
    fn unparseable_child_name_is_a_warning_not_a_failure() {
        let mut y = Ycfg::new();
        y.replace("FOO", Value::from(1));
        y.replace("FOO.(((", Value::from(2));

        let settings = view(&[]);
        let (entries, warnings) = y.get("FOO", &settings);
        assert_eq!(entries.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn merge_deep_merges_maps() {
        let mut y = Ycfg::new();
        let mut m1 = serde_yaml::Mapping::new();
        m1.insert(Value::from("a"), Value::from(1));
        y.replace("MAP", Value::Mapping(m1));

        let mut m2 = serde_yaml::Mapping::new();
        m2.insert(Value::from("b"), Value::from(2));
        y.merge("MAP", Value::Mapping(m2)).unwrap();

        let settings = view(&[]);
        let merged = y.get_map("MAP", &settings);
        assert_eq!(merged.get("a"), Some(&"1".to_string()));
        assert_eq!(merged.get("b"), Some(&"2".to_string()));
    }

    #[test]
    fn merge_rejects_scalar_type_mismatch() {
        let mut y = Ycfg::new();
        y.replace("X", Value::from(1));
        assert!(y.merge("X", Value::from(2)).is_err());
    }

    #[test]
    fn all_settings_flattens_dotted_paths() {
        let mut y = Ycfg::new();
        y.replace("A", Value::from(1));
        y.replace("A.B", Value::from(2));
        let flat = y.all_settings();
        assert_eq!(flat.get("A"), Some(&"1".to_string()));
        assert_eq!(flat.get("A.B"), Some(&"2".to_string()));
    }
}
