use serde::{Deserialize, Serialize};

use crate::package::PackageName;

/// A setting's declared type. `Raw` is the default for an ordinary
/// `syscfg.defs` entry; `TaskPriority` settings participate in `any`
/// derivation; `FlashOwner` settings are cross-checked against the flash
/// map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    Raw,
    TaskPriority,
    FlashOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingState {
    Good,
    Deprecated,
    Defunct,
}

impl Default for SettingState {
    fn default() -> Self {
        SettingState::Good
    }
}

/// A single (package, textual value) pair in a setting's history. A point
/// whose `source` is `None` is an *injected* setting: supplied externally
/// rather than by any package, always at history position zero, and takes
/// precedence over a package's own default definition value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgPoint {
    pub source: Option<PackageName>,
    pub value: String,
}

impl CfgPoint {
    pub fn injected(value: impl Into<String>) -> Self {
        CfgPoint {
            source: None,
            value: value.into(),
        }
    }

    pub fn from_package(source: PackageName, value: impl Into<String>) -> Self {
        CfgPoint {
            source: Some(source),
            value: value.into(),
        }
    }

    pub fn is_injected(&self) -> bool {
        self.source.is_none()
    }
}

/// A single numeric interval `a..b` (inclusive) or a bare value `a` (where
/// `lo == hi`), as used by the `range` restriction grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub lo: i64,
    pub hi: i64,
}

impl Interval {
    pub fn single(v: i64) -> Self {
        Interval { lo: v, hi: v }
    }

    pub fn contains(&self, v: i64) -> bool {
        v >= self.lo && v <= self.hi
    }
}

/// A restriction attached to a setting, or (when `base` is `None`) a
/// package-wide gating condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    NotNull,
    Expr(anvil_expr::Expr),
    Choice(Vec<String>),
    Range(Vec<Interval>),
}

/// A syscfg entry. Every setting in the master map carries a non-empty
/// history whose first entry is the defining package (or an injected
/// point); the current value is always `history.last()`.
#[derive(Debug, Clone)]
pub struct Setting {
    pub name: String,
    pub setting_type: SettingType,
    pub history: Vec<CfgPoint>,
    pub restrictions: Vec<Restriction>,
    pub state: SettingState,
    pub description: Option<String>,
}

impl Setting {
    /// A setting must always be constructed with its first history entry;
    /// there is no "empty" setting.
    pub fn new(name: impl Into<String>, setting_type: SettingType, first: CfgPoint) -> Self {
        Setting {
            name: name.into(),
            setting_type,
            history: vec![first],
            restrictions: Vec::new(),
            state: SettingState::Good,
            description: None,
        }
    }

    /// The defining package: the source of `history[0]`, unless that point
    /// is injected, in which case there may be no defining package at all
    /// until a package definition is appended.
    pub fn defining_package(&self) -> Option<&PackageName> {
        self.history.first().and_then(|p| p.source.as_ref())
    }

    pub fn current_value(&self) -> &str {
        &self
            .history
            .last()
            .expect("a setting's history is never empty")
            .value
    }

    pub fn push(&mut self, point: CfgPoint) {
        self.history.push(point);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn current_value_is_last_history_entry() {
        let mut s = Setting::new(
            "FOO",
            SettingType::Raw,
            CfgPoint::from_package(PackageName::new("lib/a"), "1"),
        );
        assert_eq!(s.current_value(), "1");
        s.push(CfgPoint::from_package(PackageName::new("app/b"), "2"));
        assert_eq!(s.current_value(), "2");
    }

    #[test]
    fn interval_contains_bounds_inclusive() {
        let iv = Interval { lo: 1, hi: 3 };
        assert!(iv.contains(1));
        assert!(iv.contains(3));
        assert!(!iv.contains(4));
    }
}
